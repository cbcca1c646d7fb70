//! Telemetry and structured logging for the conversion service.

use crate::config::LogFormat;
use crate::job::{ConversionJob, JobStatus};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TRACER_NAME: &str = "html2pdf-server";

/// Conversions slower than this are logged as warnings.
const SLOW_CONVERSION_MS: i64 = 5000;

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Records telemetry for a completed or failed conversion job.
///
/// Emits one `conversion_job` span carrying the job id, location, status,
/// queue wait, engine duration, output size and error, plus matching
/// structured log events.
pub fn record_job_telemetry(job: &ConversionJob) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("conversion_job");

    span.set_attribute(KeyValue::new("job_id", job.job_id.clone()));
    span.set_attribute(KeyValue::new("location", job.location().to_string()));
    span.set_attribute(KeyValue::new("status", job.status.to_string()));
    span.set_attribute(KeyValue::new("output_bytes", job.output_bytes as i64));

    if let Some(wait_ms) = job.queue_wait_ms() {
        span.set_attribute(KeyValue::new("queue_wait_ms", wait_ms));
    }

    if let Some(duration_ms) = job.processing_duration_ms() {
        span.set_attribute(KeyValue::new("duration_ms", duration_ms));

        info!(
            job_id = %job.job_id,
            location = %job.location(),
            duration_ms = duration_ms,
            bytes = job.output_bytes,
            status = %job.status,
            "Conversion job finished"
        );

        if duration_ms > SLOW_CONVERSION_MS {
            warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                "Conversion exceeded performance threshold ({SLOW_CONVERSION_MS}ms)"
            );
        }
    }

    if job.status == JobStatus::Failed {
        if let Some(ref error) = job.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
        }
    }

    span.end();
}

/// Records a heartbeat from the worker loop.
pub fn record_worker_heartbeat(processed: u64, queue_length: usize) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("worker_heartbeat");

    span.set_attribute(KeyValue::new("processed", processed as i64));
    span.set_attribute(KeyValue::new("queue_length", queue_length as i64));
    span.end();

    info!(processed, queue_length, "Worker heartbeat");
}

/// Initializes OpenTelemetry with an OTLP exporter pointed at `endpoint`.
///
/// Must be called from within the tokio runtime. The service name comes from
/// `OTEL_SERVICE_NAME` and defaults to `html2pdf-server`.
pub fn init_telemetry(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| TRACER_NAME.to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!(endpoint, "Telemetry initialized");
    Ok(())
}

/// Flushes and shuts down the global tracer provider.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
