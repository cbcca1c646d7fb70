//! Conversion job models and state management.

use crate::error::EngineError;
use crate::options::ConversionRequest;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Outcome of one conversion: PDF bytes, or the reason there are none.
pub type ConversionResult = Result<Vec<u8>, EngineError>;

/// A submitted conversion request bundled with the private reply slot of the
/// caller that submitted it.
#[derive(Debug)]
pub struct ConversionJob {
    pub job_id: String,
    pub request: ConversionRequest,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub output_bytes: usize,
    pub error: Option<String>,
    reply: Option<oneshot::Sender<ConversionResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl ConversionJob {
    /// Creates a queued job and the receiver its submitter waits on.
    pub fn new(request: ConversionRequest) -> (Self, oneshot::Receiver<ConversionResult>) {
        let (tx, rx) = oneshot::channel();
        let now = Utc::now();
        let job = Self {
            job_id: Uuid::new_v4().to_string(),
            request,
            status: JobStatus::Queued,
            created_at: now,
            started_at: None,
            updated_at: now,
            output_bytes: 0,
            error: None,
            reply: Some(tx),
        };
        (job, rx)
    }

    pub fn location(&self) -> &str {
        self.request.location()
    }

    pub fn start_processing(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Records the outcome and hands it to the submitter.
    ///
    /// Returns `false` when the submitter stopped waiting; the result is
    /// discarded in that case.
    pub fn complete(&mut self, result: ConversionResult) -> bool {
        self.updated_at = Utc::now();
        match &result {
            Ok(pdf) => {
                self.status = JobStatus::Complete;
                self.output_bytes = pdf.len();
                self.error = None;
            }
            Err(e) => {
                self.status = JobStatus::Failed;
                self.output_bytes = 0;
                self.error = Some(e.to_string());
            }
        }

        match self.reply.take() {
            Some(reply) => reply.send(result).is_ok(),
            None => false,
        }
    }

    /// Whether the submitter has gone away before the job finished.
    pub fn is_abandoned(&self) -> bool {
        self.reply.as_ref().map_or(true, |reply| reply.is_closed())
    }

    /// Time spent waiting in the queue, once processing has started.
    pub fn queue_wait_ms(&self) -> Option<i64> {
        self.started_at
            .map(|started| started.signed_duration_since(self.created_at).num_milliseconds())
    }

    /// Time spent in the engine, once the job has finished.
    pub fn processing_duration_ms(&self) -> Option<i64> {
        match (self.status, self.started_at) {
            (JobStatus::Complete | JobStatus::Failed, Some(started)) => {
                Some(self.updated_at.signed_duration_since(started).num_milliseconds())
            }
            _ => None,
        }
    }
}
