use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bidi_relay::observability::events::{MetricsObserver, Observers, RelayObserver, TracingObserver};
use bidi_relay::observability::metrics::Metrics;
use bidi_relay::observability::routes::serve_metrics;
use bidi_relay::utils::config_loader;
use bidi_relay::utils::constants::DEFAULT_HTTP_TIMEOUT_MS;
use bidi_relay::utils::logging;
use bidi_relay::utils::logging::LogLevel;
use bidi_relay::{ConnectionServer, RelayContext, TokenProvider};
use clap::Parser;
use reqwest::Client;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "bidi-relay.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Prepare observers
    //
    // logs + prometheus metrics
    // -------------------------------

    let metrics = Arc::new(Metrics::new()?);
    let observer: Arc<dyn RelayObserver> = Arc::new(
        Observers::new()
            .with(Arc::new(TracingObserver))
            .with(Arc::new(MetricsObserver::new(metrics.clone()))),
    );

    // -------------------------------
    // 3. Load credentials, build token provider
    //
    // fails before any listener starts
    // -------------------------------

    let client = Client::builder()
        .timeout(Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS))
        .build()?;
    let provider = TokenProvider::from_config(&service_config, &client, observer.clone())?;

    // -------------------------------
    // 4. Start relay listener
    // -------------------------------

    let settings = &service_config.settings;
    let context = RelayContext {
        provider: Arc::new(provider),
        upstream_url: settings.upstream.url.to_owned(),
        observer,
    };
    let server = ConnectionServer::bind(&settings.server.address(), context).await?;
    metrics.up.set(1);

    // -------------------------------
    // 5. Start metrics endpoint
    // -------------------------------

    if settings.metrics.is_enabled {
        let metrics_config = settings.metrics.to_owned();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(metrics_config, metrics).await {
                error!("metrics endpoint failed: {:#}", e);
            }
        });
    }

    info!("Service starting...");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    server.run_until(shutdown).await?;
    metrics.up.set(0);

    Ok(())
}
