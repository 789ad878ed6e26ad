use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{extract::State, response::IntoResponse, Router};
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};

use crate::config::settings::MetricsConfig;
use crate::observability::metrics::Metrics;

#[derive(Clone)]
pub struct MetricsState {
    pub metrics: Arc<Metrics>,
}

impl MetricsState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    pub fn router(&self, metrics_config: &MetricsConfig) -> Router {
        Router::new()
            .route(metrics_config.path.as_str(), get(get_metrics))
            .with_state(self.clone())
    }
}

/// Serve the metrics endpoint until the process stops; no-op when disabled
pub async fn serve_metrics(metrics_config: MetricsConfig, metrics: Arc<Metrics>) -> Result<()> {
    if !metrics_config.is_enabled {
        info!("metrics endpoint disabled");
        return Ok(());
    }

    let app = MetricsState::new(metrics).router(&metrics_config);
    let address = format!("{}:{}", metrics_config.host, metrics_config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding metrics endpoint {}", address))?;
    info!("metrics endpoint listening on http://{}{}", address, metrics_config.path);
    axum::serve(listener, app).await.context("metrics endpoint stopped")
}

async fn get_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = String::new();

    if let Err(e) = encoder.encode_utf8(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain")],
            String::new(),
        );
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
}
