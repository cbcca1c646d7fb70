//! In-process FIFO intake between the gateway and the worker loop.

use crate::error::ServiceError;
use crate::job::{ConversionJob, ConversionResult};
use crate::options::ConversionRequest;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Creates a bounded job queue.
///
/// Submitters wait while the queue is full, so no job is ever dropped for lack
/// of space.
pub fn channel(capacity: usize) -> (JobQueue, JobIntake) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobQueue { tx }, JobIntake { rx })
}

/// Submitting side of the queue. Cheap to clone, one per caller.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ConversionJob>,
}

impl JobQueue {
    /// Enqueues a conversion and returns the receiver its result arrives on.
    ///
    /// Fails with [`ServiceError::NotRunning`] once the worker loop has
    /// released its end of the queue.
    pub async fn enqueue(
        &self,
        request: ConversionRequest,
    ) -> Result<oneshot::Receiver<ConversionResult>, ServiceError> {
        let (job, reply) = ConversionJob::new(request);
        debug!(job_id = %job.job_id, location = %job.location(), "Enqueueing conversion job");

        self.tx
            .send(job)
            .await
            .map_err(|_| ServiceError::NotRunning)?;
        Ok(reply)
    }

    /// Number of jobs waiting to be picked up.
    pub fn queue_length(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the queue, owned by the worker loop.
#[derive(Debug)]
pub struct JobIntake {
    rx: mpsc::Receiver<ConversionJob>,
}

impl JobIntake {
    /// Waits for the next job. `None` once every submitter is gone.
    pub async fn dequeue(&mut self) -> Option<ConversionJob> {
        self.rx.recv().await
    }

    /// Jobs waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Refuses further jobs and drops those still queued.
    ///
    /// Dropping a job drops its reply slot, which wakes the submitter with
    /// [`ServiceError::NotRunning`]. Returns how many jobs were discarded.
    pub fn close(&mut self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while let Ok(job) = self.rx.try_recv() {
            debug!(job_id = %job.job_id, "Discarding queued job");
            discarded += 1;
        }
        discarded
    }
}
