use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use apsim_api::{HttpApi, ManagerApiAdapter};
use apsim_core::config::{ENV_LOG_FORMAT, ENV_LOG_LEVEL};
use apsim_core::{InstanceManager, ManagerConfig, aggregate_message};
use apsim_observe::{LoggerConfig, LoggerFormat, LoggerLevel, init_logger};
use apsim_prometheus::PrometheusMetrics;

mod metrics;
mod signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config
    let cfg = ManagerConfig::from_env().context("invalid configuration")?;

    // 2) Logger
    let logger = LoggerConfig {
        format: cfg
            .log_format
            .parse::<LoggerFormat>()
            .with_context(|| format!("invalid {ENV_LOG_FORMAT}"))?,
        level: LoggerLevel::new(cfg.log_level.as_str())
            .with_context(|| format!("invalid {ENV_LOG_LEVEL}"))?,
        ..Default::default()
    };
    init_logger(&logger).context("failed to install logger")?;
    info!(
        data_dir = %cfg.data_dir.display(),
        backend = %cfg.backend.program,
        listen = %cfg.listen,
        "configuration loaded"
    );

    // 3) Manager
    let metrics = Arc::new(PrometheusMetrics::new().context("failed to register metrics")?);
    let manager = Arc::new(InstanceManager::from_config(&cfg).with_metrics(metrics.clone()));

    // 4) Resume whatever was running before the last restart
    match manager.resume().await {
        Ok(Some(input)) => info!(%input, "resumed previous backend"),
        Ok(None) => info!("no backend to resume"),
        Err(e) => error!(error = %aggregate_message(&e), "failed to resume previous backend"),
    }

    // 5) HTTP
    let adapter = Arc::new(ManagerApiAdapter::new(Arc::clone(&manager)));
    let app = HttpApi::new(adapter)
        .with_body_limit(cfg.max_upload_bytes)
        .router()
        .merge(metrics::router(metrics));

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!(addr = %cfg.listen, "listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(signal::cancel_on_signal(shutdown.clone()));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;

    // 6) Stop the backend but keep its input so the next start can resume it
    manager.shutdown().await;
    info!("shut down");

    served.context("http server failed")
}
