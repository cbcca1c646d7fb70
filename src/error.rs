//! Error types shared by the gateway, the worker loop and the engine adapter.

use std::time::Duration;
use thiserror::Error;

/// Input errors, detected before a request reaches the worker loop.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("objectOpts.location is required")]
    MissingLocation,
}

/// Failures raised by the rendering engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to initialize rendering engine: {0}")]
    Init(String),

    #[error("could not create {kind}: {reason}")]
    Creation { kind: &'static str, reason: String },

    #[error("could not render document: {0}")]
    Render(String),

    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn object(reason: impl Into<String>) -> Self {
        Self::Creation {
            kind: "object",
            reason: reason.into(),
        }
    }

    pub(crate) fn converter(reason: impl Into<String>) -> Self {
        Self::Creation {
            kind: "converter",
            reason: reason.into(),
        }
    }
}

/// Errors returned to callers of the conversion service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The loop has been told to stop or has already exited.
    #[error("conversion service is not running")]
    NotRunning,

    #[error("conversion failed: {0}")]
    Conversion(#[from] EngineError),
}
