//! html2pdf-server library
//!
//! An HTTP service that converts HTML into PDF with wkhtmltopdf. The engine
//! cannot be used concurrently, so every request is funneled through a single
//! worker loop that owns it.
//!
//! ## Module Overview
//!
//! - `options`: conversion request models and their defaults
//! - `converter`: rendering engine interface and the single conversion cycle
//! - `wkhtmltopdf`: engine implementation driving the `wkhtmltopdf` binary
//! - `job`: conversion jobs and their reply slots
//! - `queue`: FIFO intake between callers and the worker loop
//! - `service`: the worker loop and its [`ConversionService`] handle
//! - `gateway`: axum router exposing the conversion endpoint
//! - `config`: command-line and environment configuration
//! - `telemetry`: logging setup and OpenTelemetry spans
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use html2pdf_server::{
//!     options::ConversionRequest,
//!     service::{ConversionService, WorkerConfig},
//!     wkhtmltopdf::WkHtmlToPdf,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = WkHtmlToPdf::new("wkhtmltopdf");
//!     let (service, worker) = ConversionService::start(engine, WorkerConfig::default()).await?;
//!
//!     let pdf = service
//!         .convert(ConversionRequest::for_location("https://example.com"))
//!         .await?;
//!     assert!(!pdf.is_empty());
//!
//!     service.stop();
//!     worker.await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod gateway;
pub mod job;
pub mod options;
pub mod queue;
pub mod service;
pub mod telemetry;
pub mod wkhtmltopdf;

pub use service::ConversionService;
