// SPDX-FileCopyrightText: 2026 Chatrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatrelay serve` command implementation.
//!
//! Wires the upstream client, the admission controller, and the in-memory
//! session store into the HTTP gateway, then serves until SIGINT/SIGTERM.
//! A background sweeper drops idle rate-limit windows and idle sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use chatrelay_admission::AdmissionController;
use chatrelay_config::RelayConfig;
use chatrelay_core::{ChatUpstream, RelayError};
use chatrelay_gateway::{
    AdmissionState, ChatDefaults, GatewayState, MemorySessionStore, SessionGateway, build_router,
    start_server,
};
use chatrelay_upstream::UpstreamClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shutdown;

/// A fully wired relay, ready to serve.
pub struct Relay {
    pub router: Router,
    pub upstream: Arc<UpstreamClient>,
    pub limiter: Arc<AdmissionController>,
    pub store: Arc<MemorySessionStore>,
}

/// Builds the relay components from configuration.
///
/// Fails when the upstream client cannot be constructed, most commonly
/// because no API token is configured.
pub fn build_relay(config: &RelayConfig) -> Result<Relay, RelayError> {
    let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);
    let limiter = Arc::new(AdmissionController::from_config(&config.rate_limit));
    let store = Arc::new(MemorySessionStore::new());

    let sessions = SessionGateway::new(
        upstream.clone(),
        store.clone(),
        ChatDefaults::from(&config.chat),
        config.upstream.deadline(),
    );
    let state = GatewayState::new(Arc::new(sessions), &config.session.cookie_name);
    let admission = AdmissionState {
        limiter: limiter.clone(),
        trust_forwarded_for: config.server.trust_forwarded_for,
    };

    Ok(Relay {
        router: build_router(state, admission),
        upstream,
        limiter,
        store,
    })
}

/// Runs the `chatrelay serve` command.
pub async fn run_serve(config: RelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.server.log_level);

    info!(
        upstream = config.upstream.url.as_str(),
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "starting chatrelay serve"
    );

    let relay = build_relay(&config)?;
    let cancel = shutdown::install_signal_handler();

    tokio::spawn(run_sweeper(
        relay.limiter.clone(),
        relay.store.clone(),
        config.rate_limit.sweep_interval(),
        config.session.idle_ttl(),
        cancel.clone(),
    ));

    let result = start_server(&config.server, relay.router.clone(), cancel.clone()).await;

    // Stops the sweeper when the server exits on its own.
    cancel.cancel();
    relay.shutdown().await;

    info!("chatrelay serve shutdown complete");
    result
}

impl Relay {
    /// Releases the upstream client.
    pub async fn shutdown(&self) {
        if let Err(e) = self.upstream.shutdown().await {
            warn!(error = %e, "upstream shutdown failed");
        }
    }
}

/// Periodically evicts idle admission windows and, when `session_ttl` is
/// set, idle sessions. Returns when `cancel` fires.
pub async fn run_sweeper(
    limiter: Arc<AdmissionController>,
    store: Arc<MemorySessionStore>,
    every: Duration,
    session_ttl: Option<Duration>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let windows = limiter.evict_idle(Instant::now());
                let sessions = session_ttl.map_or(0, |ttl| store.evict_idle(ttl));
                debug!(windows, sessions, "sweep complete");
            }
            _ = cancel.cancelled() => {
                debug!("sweeper shutting down");
                break;
            }
        }
    }
}

/// Initializes the tracing subscriber with an env-filter.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
