//! HTML to PDF Conversion Server
//!
//! Serves `POST <CONVERT_PATH>` and renders each request with wkhtmltopdf,
//! one conversion at a time.
//!
//! ## Configuration
//!
//! Flags or environment variables:
//! - `LISTEN_ADDR`: HTTP bind address (default: 0.0.0.0:8080)
//! - `CONVERT_PATH`: conversion endpoint path (default: /convert)
//! - `WKHTMLTOPDF_PATH`: wkhtmltopdf executable (default: wkhtmltopdf)
//! - `QUEUE_CAPACITY`: pending requests before callers wait (default: 64)
//! - `RENDER_TIMEOUT_SECS`: per-conversion limit, 0 disables (default: 120)
//! - `SHUTDOWN_TIMEOUT_SECS`: worker wind-down limit (default: 10)
//! - `LOG_FORMAT`: text or json (default: text)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint (optional)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use html2pdf_server::{
    config::{CliArgs, ServiceConfig},
    gateway,
    service::ConversionService,
    telemetry,
    wkhtmltopdf::WkHtmlToPdf,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = ServiceConfig::try_from(args)?;

    telemetry::init_logging(config.log_format);

    if let Some(endpoint) = &config.otlp_endpoint {
        if let Err(e) = telemetry::init_telemetry(endpoint) {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    info!(
        "Configuration: listen_addr={}, convert_path={}, queue_capacity={}, render_timeout={:?}",
        config.listen_addr,
        config.convert_path,
        config.worker.queue_capacity,
        config.worker.render_timeout
    );

    let engine = WkHtmlToPdf::new(&config.wkhtmltopdf_path);
    let (service, worker) = ConversionService::start(engine, config.worker.clone())
        .await
        .context("Failed to start convert loop")?;

    let app = gateway::router(service.clone(), &config.convert_path);
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    info!("Listening on {}", config.listen_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    // In-flight HTTP requests have drained; let the loop finish and release
    // the engine.
    service.stop();
    match tokio::time::timeout(config.shutdown_timeout, worker).await {
        Ok(Ok(())) => info!("Convert loop stopped"),
        Ok(Err(e)) => error!("Convert loop panicked: {}", e),
        Err(_) => warn!(
            "Convert loop did not stop within {:?}",
            config.shutdown_timeout
        ),
    }

    telemetry::shutdown_telemetry();
    info!("Server shutdown complete");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
