//! Structured event sink for the relay.
//!
//! Token provider, sessions and forwarding loops report what happened
//! through [`RelayObserver`]; what is done with the events (logs, metrics,
//! test recording) is decided by whoever builds the observer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::observability::metrics::Metrics;
use crate::relay::session::SessionOutcome;
use crate::relay::Direction;

pub trait RelayObserver: Send + Sync {
    fn token_refreshed(&self, _source: &str, _exp_unix_ts: Option<u64>, _elapsed: Duration) {}

    fn token_refresh_failed(&self, _error: &AuthError, _elapsed: Duration) {}

    fn session_started(&self, _session_id: u64, _peer: Option<SocketAddr>) {}

    fn session_ended(&self, _session_id: u64, _outcome: &SessionOutcome) {}

    fn message_forwarded(&self, _session_id: u64, _direction: Direction) {}

    fn message_dropped(&self, _session_id: u64, _direction: Direction, _reason: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn token_refreshed(&self, source: &str, exp_unix_ts: Option<u64>, elapsed: Duration) {
        info!(
            source,
            exp_unix_ts = ?exp_unix_ts,
            elapsed_ms = elapsed.as_millis() as u64,
            "access token refreshed"
        );
    }

    fn token_refresh_failed(&self, error: &AuthError, elapsed: Duration) {
        warn!(
            error = %error,
            elapsed_ms = elapsed.as_millis() as u64,
            "access token refresh failed"
        );
    }

    fn session_started(&self, session_id: u64, peer: Option<SocketAddr>) {
        info!(session_id, peer = ?peer, "session started");
    }

    fn session_ended(&self, session_id: u64, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Failed(reason) => warn!(session_id, reason = %reason, "session failed"),
            other => info!(session_id, outcome = %other, "session ended"),
        }
    }

    fn message_forwarded(&self, session_id: u64, direction: Direction) {
        debug!(session_id, direction = %direction, "message forwarded");
    }

    fn message_dropped(&self, session_id: u64, direction: Direction, reason: &str) {
        warn!(session_id, direction = %direction, reason, "dropping malformed message");
    }
}

pub struct MetricsObserver {
    metrics: Arc<Metrics>,
}

impl MetricsObserver {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl RelayObserver for MetricsObserver {
    fn token_refreshed(&self, source: &str, exp_unix_ts: Option<u64>, elapsed: Duration) {
        self.metrics.token_refresh_total.with_label_values(&[source, "success"]).inc();
        self.metrics.token_refresh_duration.with_label_values(&["success"]).observe(elapsed.as_secs_f64());
        self.metrics.token_expiry_unix.set(exp_unix_ts.map(|e| e as i64).unwrap_or(0));
    }

    fn token_refresh_failed(&self, _error: &AuthError, elapsed: Duration) {
        self.metrics.token_refresh_total.with_label_values(&["chain", "failure"]).inc();
        self.metrics.token_refresh_duration.with_label_values(&["failure"]).observe(elapsed.as_secs_f64());
    }

    fn session_started(&self, _session_id: u64, _peer: Option<SocketAddr>) {
        self.metrics.sessions_active.inc();
    }

    fn session_ended(&self, _session_id: u64, outcome: &SessionOutcome) {
        self.metrics.sessions_active.dec();
        self.metrics.sessions_total.with_label_values(&[outcome.label()]).inc();
    }

    fn message_forwarded(&self, _session_id: u64, direction: Direction) {
        self.metrics.messages_forwarded_total.with_label_values(&[direction.as_str()]).inc();
    }

    fn message_dropped(&self, _session_id: u64, direction: Direction, _reason: &str) {
        self.metrics.messages_dropped_total.with_label_values(&[direction.as_str()]).inc();
    }
}

/// Fan-out to several observers, in order
#[derive(Default, Clone)]
pub struct Observers(Vec<Arc<dyn RelayObserver>>);

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.0.push(observer);
        self
    }
}

impl RelayObserver for Observers {
    fn token_refreshed(&self, source: &str, exp_unix_ts: Option<u64>, elapsed: Duration) {
        self.0.iter().for_each(|o| o.token_refreshed(source, exp_unix_ts, elapsed));
    }

    fn token_refresh_failed(&self, error: &AuthError, elapsed: Duration) {
        self.0.iter().for_each(|o| o.token_refresh_failed(error, elapsed));
    }

    fn session_started(&self, session_id: u64, peer: Option<SocketAddr>) {
        self.0.iter().for_each(|o| o.session_started(session_id, peer));
    }

    fn session_ended(&self, session_id: u64, outcome: &SessionOutcome) {
        self.0.iter().for_each(|o| o.session_ended(session_id, outcome));
    }

    fn message_forwarded(&self, session_id: u64, direction: Direction) {
        self.0.iter().for_each(|o| o.message_forwarded(session_id, direction));
    }

    fn message_dropped(&self, session_id: u64, direction: Direction, reason: &str) {
        self.0.iter().for_each(|o| o.message_dropped(session_id, direction, reason));
    }
}
