//! HTTP gateway in front of the conversion service.
//!
//! | outcome                        | status | body                          |
//! |--------------------------------|--------|-------------------------------|
//! | PDF rendered                   | 200    | PDF bytes (`application/pdf`) |
//! | undecodable or invalid payload | 400    | the payload, unmodified       |
//! | method other than POST         | 405    | short text                    |
//! | engine failure                 | 500    | short text                    |
//! | service stopped                | 503    | short text                    |

use crate::error::ServiceError;
use crate::options::ConversionRequest;
use crate::service::ConversionService;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{info, warn};

/// Builds the router serving conversions at `convert_path`.
pub fn router(service: ConversionService, convert_path: &str) -> Router {
    Router::new()
        .route(convert_path, post(convert).fallback(method_not_allowed))
        .with_state(service)
}

/// Converts the HTML named in the JSON payload into a PDF.
async fn convert(State(service): State<ConversionService>, body: Bytes) -> Response {
    let request = match ConversionRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Rejecting conversion request");
            return respond_with_text(StatusCode::BAD_REQUEST, body);
        }
    };

    let location = request.location().to_string();
    info!(location = %location, "Requesting conversion");

    match service.convert(request).await {
        Ok(pdf) => {
            info!(location = %location, bytes = pdf.len(), "Responding with PDF");
            respond_with_pdf(pdf)
        }
        Err(ServiceError::Conversion(e)) => {
            warn!(location = %location, error = %e, "Conversion failed");
            respond_with_text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to convert file")
        }
        Err(ServiceError::NotRunning) => {
            warn!(location = %location, "Conversion service is not running");
            respond_with_text(
                StatusCode::SERVICE_UNAVAILABLE,
                "Conversion service is not running",
            )
        }
    }
}

async fn method_not_allowed() -> Response {
    respond_with_text(StatusCode::METHOD_NOT_ALLOWED, "Invalid request method")
}

fn respond_with_text(status: StatusCode, payload: impl Into<Body>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        payload.into(),
    )
        .into_response()
}

fn respond_with_pdf(pdf: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/pdf")],
        pdf,
    )
        .into_response()
}
