// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the chat relay.
//!
//! The gateway owns session state and admission control. It resolves a
//! session from the `session_id` cookie, admits chat requests against the
//! per-client quota, and relays each message to the upstream through
//! [`SessionGateway`].

pub mod admission;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod store;

pub use admission::{AdmissionState, ClientIdentity};
pub use error::{ApiError, ApiErrorKind, ErrorResponse};
pub use server::{GatewayState, build_router, serve, start_server};
pub use session::{ChatDefaults, ChatInput, ChatOutcome, SessionGateway};
pub use store::MemorySessionStore;
