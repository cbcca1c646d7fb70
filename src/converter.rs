//! Rendering engine interface and the single conversion cycle.
//!
//! The engine is a process-wide native resource: it is initialized once,
//! hands out per-document objects and per-run converters, and is destroyed
//! once. None of it is safe to use from two callers at the same time, which
//! is why only the worker loop ever holds an engine.

use crate::error::EngineError;
use crate::options::{ConversionRequest, ConverterOpts, ObjectOpts};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An HTML→PDF rendering engine.
#[async_trait]
pub trait RenderEngine: Send + 'static {
    /// A document source prepared for conversion.
    type Object: Send;
    /// A single conversion run.
    type Converter: Converter<Object = Self::Object>;

    /// Brings the engine up. Called once before any conversion.
    async fn init(&mut self) -> Result<(), EngineError>;

    /// Tears the engine down. Called once after the last conversion.
    fn destroy(&mut self);

    fn new_object(&self, opts: &ObjectOpts) -> Result<Self::Object, EngineError>;

    fn new_converter(&self, opts: &ConverterOpts) -> Result<Self::Converter, EngineError>;
}

/// One conversion run over the objects added to it.
#[async_trait]
pub trait Converter: Send {
    type Object: Send;

    fn add(&mut self, object: Self::Object);

    /// Renders every added object into `output`.
    async fn run(&mut self, output: &mut Vec<u8>) -> Result<(), EngineError>;

    /// Releases run-scoped resources.
    fn destroy(self);
}

/// Converts one request into PDF bytes.
///
/// The converter is destroyed whether or not the run succeeds. An engine that
/// reports success but writes nothing is treated as a render failure, so
/// callers never see an empty document.
pub async fn convert<E: RenderEngine>(
    engine: &mut E,
    request: &ConversionRequest,
    render_timeout: Option<Duration>,
) -> Result<Vec<u8>, EngineError> {
    let location = request.location();

    let object = engine.new_object(&request.object_opts).inspect_err(|e| {
        warn!(location, error = %e, "Could not create object");
    })?;
    debug!(location, "Object created");

    let mut converter = engine
        .new_converter(&request.converter_opts)
        .inspect_err(|e| {
            warn!(location, error = %e, "Could not create converter");
        })?;
    converter.add(object);

    let mut output = Vec::new();
    let result = match render_timeout {
        Some(limit) => tokio::time::timeout(limit, converter.run(&mut output))
            .await
            .unwrap_or(Err(EngineError::Timeout(limit))),
        None => converter.run(&mut output).await,
    };
    converter.destroy();

    if let Err(e) = result {
        warn!(location, error = %e, "Could not convert object to PDF");
        return Err(e);
    }
    if output.is_empty() {
        warn!(location, "Rendering engine produced no output");
        return Err(EngineError::Render("engine produced an empty document".to_string()));
    }

    info!(location, bytes = output.len(), "PDF rendered");
    Ok(output)
}
