use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

/// Relay metrics. One instance per process, injected where it is needed.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token metrics
    pub token_refresh_total: IntCounterVec,
    pub token_refresh_duration: HistogramVec,
    pub token_expiry_unix: IntGauge,

    // Session metrics
    pub sessions_total: IntCounterVec,
    pub sessions_active: IntGauge,

    // Forwarding metrics
    pub messages_forwarded_total: IntCounterVec,
    pub messages_dropped_total: IntCounterVec,

    pub up: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("bidirelay".into()), None)?;

        let metrics = Self {
            // Token
            token_refresh_total: IntCounterVec::new(Opts::new("token_refresh_total", "Token refresh exchanges by outcome"), &["source", "outcome"])?,
            token_refresh_duration: HistogramVec::new(HistogramOpts::new("token_refresh_duration_seconds", "Token refresh duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["outcome"])?,
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the cached token")?,

            // Session
            sessions_total: IntCounterVec::new(Opts::new("sessions_total", "Finished relay sessions by outcome"), &["outcome"])?,
            sessions_active: IntGauge::new("sessions_active", "Relay sessions currently open")?,

            // Forwarding
            messages_forwarded_total: IntCounterVec::new(Opts::new("messages_forwarded_total", "Messages forwarded by direction"), &["direction"])?,
            messages_dropped_total: IntCounterVec::new(Opts::new("messages_dropped_total", "Malformed messages dropped by direction"), &["direction"])?,

            up: IntGauge::new("up", "1 if the relay listener is accepting")?,

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refresh_total.clone()))?;
        reg.register(Box::new(metrics.token_refresh_duration.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.sessions_total.clone()))?;
        reg.register(Box::new(metrics.sessions_active.clone()))?;
        reg.register(Box::new(metrics.messages_forwarded_total.clone()))?;
        reg.register(Box::new(metrics.messages_dropped_total.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}
