//! In-memory rendering engine shared by the integration tests.
//!
//! Locations drive its behavior:
//! - `bad://...` fails object creation
//! - `file:///does-not-exist` and `fail://...` fail the run
//! - `slow://...` sleeps for a second before rendering
//! - `panic://...` panics inside the run
//! - anything else renders `%PDF-fake:<location>`

#![allow(dead_code)]

use async_trait::async_trait;
use html2pdf_server::converter::{Converter, RenderEngine};
use html2pdf_server::error::EngineError;
use html2pdf_server::options::{ConverterOpts, ObjectOpts};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PDF_PREFIX: &[u8] = b"%PDF-fake:";

#[derive(Debug, Default)]
pub struct EngineStats {
    pub inits: AtomicUsize,
    pub destroys: AtomicUsize,
    pub runs: AtomicUsize,
    pub converters_destroyed: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub order: Mutex<Vec<String>>,
}

impl EngineStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

pub struct FakeEngine {
    pub stats: Arc<EngineStats>,
    pub run_delay: Duration,
    pub fail_init: bool,
}

impl FakeEngine {
    pub fn new() -> (Self, Arc<EngineStats>) {
        let stats = Arc::new(EngineStats::default());
        (
            Self {
                stats: stats.clone(),
                run_delay: Duration::from_millis(5),
                fail_init: false,
            },
            stats,
        )
    }
}

pub struct FakeConverter {
    stats: Arc<EngineStats>,
    run_delay: Duration,
    objects: Vec<String>,
}

#[async_trait]
impl RenderEngine for FakeEngine {
    type Object = String;
    type Converter = FakeConverter;

    async fn init(&mut self) -> Result<(), EngineError> {
        if self.fail_init {
            return Err(EngineError::Init("fake engine refused to start".to_string()));
        }
        self.stats.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&mut self) {
        self.stats.destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn new_object(&self, opts: &ObjectOpts) -> Result<String, EngineError> {
        if opts.location.starts_with("bad://") {
            return Err(EngineError::Creation {
                kind: "object",
                reason: "unsupported scheme".to_string(),
            });
        }
        Ok(opts.location.clone())
    }

    fn new_converter(&self, _opts: &ConverterOpts) -> Result<FakeConverter, EngineError> {
        Ok(FakeConverter {
            stats: self.stats.clone(),
            run_delay: self.run_delay,
            objects: Vec::new(),
        })
    }
}

#[async_trait]
impl Converter for FakeConverter {
    type Object = String;

    fn add(&mut self, object: String) {
        self.objects.push(object);
    }

    async fn run(&mut self, output: &mut Vec<u8>) -> Result<(), EngineError> {
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.stats.runs.fetch_add(1, Ordering::SeqCst);

        let result = self.render(output).await;

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn destroy(self) {
        self.stats.converters_destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeConverter {
    async fn render(&self, output: &mut Vec<u8>) -> Result<(), EngineError> {
        for location in &self.objects {
            self.stats.order.lock().unwrap().push(location.clone());

            if location.starts_with("panic://") {
                panic!("fake engine crashed while rendering {location}");
            }

            if location.starts_with("slow://") {
                tokio::time::sleep(Duration::from_secs(1)).await;
            } else {
                tokio::time::sleep(self.run_delay).await;
            }

            if location == "file:///does-not-exist" || location.starts_with("fail://") {
                return Err(EngineError::Render(
                    "Exit with code 1 due to network error: ContentNotFoundError".to_string(),
                ));
            }

            output.extend_from_slice(PDF_PREFIX);
            output.extend_from_slice(location.as_bytes());
        }
        Ok(())
    }
}
