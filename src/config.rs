//! Command-line and environment configuration.

use crate::service::WorkerConfig;
use anyhow::bail;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the `html2pdf-server` binary.
///
/// Every setting can be given as a flag or through the environment variable
/// named next to it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "html2pdf-server",
    version,
    about = "Converts HTML to PDF over HTTP through a single wkhtmltopdf worker"
)]
pub struct CliArgs {
    /// Address the HTTP server binds to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Path of the conversion endpoint.
    #[arg(long, env = "CONVERT_PATH", default_value = "/convert")]
    pub convert_path: String,

    /// wkhtmltopdf executable, looked up on PATH when not absolute.
    #[arg(long, env = "WKHTMLTOPDF_PATH", default_value = "wkhtmltopdf")]
    pub wkhtmltopdf_path: PathBuf,

    /// Conversion requests allowed to wait for the worker before submitters
    /// are held back.
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 64)]
    pub queue_capacity: usize,

    /// Maximum duration of a single rendering run, in seconds. `0` disables
    /// the limit.
    #[arg(long, env = "RENDER_TIMEOUT_SECS", default_value_t = 120)]
    pub render_timeout_secs: u64,

    /// How long to wait for the worker to wind down on shutdown, in seconds.
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint. Tracing export is disabled when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub convert_path: String,
    pub wkhtmltopdf_path: PathBuf,
    pub worker: WorkerConfig,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl TryFrom<CliArgs> for ServiceConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }

        if !args.convert_path.starts_with('/') {
            bail!(
                "CONVERT_PATH must start with '/' (got {:?})",
                args.convert_path
            );
        }

        if args.listen_addr.trim().is_empty() {
            bail!("LISTEN_ADDR must not be empty");
        }

        let render_timeout =
            (args.render_timeout_secs > 0).then(|| Duration::from_secs(args.render_timeout_secs));

        Ok(Self {
            listen_addr: args.listen_addr,
            convert_path: args.convert_path,
            wkhtmltopdf_path: args.wkhtmltopdf_path,
            worker: WorkerConfig {
                queue_capacity: args.queue_capacity,
                render_timeout,
            },
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            log_format: args.log_format,
            otlp_endpoint: args.otlp_endpoint.filter(|e| !e.trim().is_empty()),
        })
    }
}
