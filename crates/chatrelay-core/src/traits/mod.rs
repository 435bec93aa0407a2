// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the chat pipeline.
//!
//! Both traits use `#[async_trait]` so implementations can be held as
//! `Arc<dyn ...>` by the gateway and swapped for mocks in tests.

pub mod session_store;
pub mod upstream;

pub use session_store::SessionStore;
pub use upstream::ChatUpstream;
