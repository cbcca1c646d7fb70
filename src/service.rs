//! The conversion worker loop and the handle callers use to reach it.
//!
//! Exactly one loop task owns the rendering engine. Callers submit jobs
//! through a FIFO [`JobQueue`]; each job carries its own one-shot reply slot,
//! so concurrent callers always get their own result back. The loop is
//! stopped through a [`CancellationToken`].

use crate::converter::{self, RenderEngine};
use crate::error::{EngineError, ServiceError};
use crate::job::ConversionJob;
use crate::options::ConversionRequest;
use crate::queue::{self, JobIntake, JobQueue};
use crate::telemetry;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of processed jobs between two worker heartbeats.
const HEARTBEAT_EVERY: u64 = 10;

/// Tuning for the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How many jobs may wait in the intake queue before submitters block.
    pub queue_capacity: usize,
    /// Upper bound on a single engine run. `None` waits indefinitely.
    pub render_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            render_timeout: Some(Duration::from_secs(120)),
        }
    }
}

/// Cloneable handle to the conversion worker loop.
#[derive(Debug, Clone)]
pub struct ConversionService {
    queue: JobQueue,
    shutdown_token: CancellationToken,
}

impl ConversionService {
    /// Initializes `engine` and spawns the worker loop that owns it.
    ///
    /// The returned [`JoinHandle`] resolves once the loop has exited and the
    /// engine has been destroyed.
    ///
    /// # Errors
    ///
    /// Returns the engine's init error; no loop is started in that case.
    pub async fn start<E: RenderEngine>(
        mut engine: E,
        config: WorkerConfig,
    ) -> Result<(Self, JoinHandle<()>), EngineError> {
        info!("Starting convert loop");
        engine.init().await?;

        let (queue, intake) = queue::channel(config.queue_capacity.max(1));
        let shutdown_token = CancellationToken::new();

        let handle = tokio::spawn(worker_loop(
            engine,
            intake,
            shutdown_token.clone(),
            config.render_timeout,
        ));

        Ok((
            Self {
                queue,
                shutdown_token,
            },
            handle,
        ))
    }

    /// Submits `request` and waits for its result.
    ///
    /// Only the calling task is suspended; other callers keep submitting.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotRunning`] if the loop is stopping or gone.
    /// - [`ServiceError::Conversion`] if the engine failed on this request.
    pub async fn convert(&self, request: ConversionRequest) -> Result<Vec<u8>, ServiceError> {
        if self.shutdown_token.is_cancelled() {
            return Err(ServiceError::NotRunning);
        }

        let reply = self.queue.enqueue(request).await?;
        match reply.await {
            Ok(result) => result.map_err(ServiceError::from),
            // The loop dropped the job without answering: it is shutting down.
            Err(_) => Err(ServiceError::NotRunning),
        }
    }

    /// Signals the loop to exit after the job it is working on, if any.
    ///
    /// Never blocks and may be called any number of times, including after
    /// the loop has exited.
    pub fn stop(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!("Sending stop signal to convert loop");
        }
        self.shutdown_token.cancel();
    }

    /// Whether the loop still accepts work.
    pub fn is_running(&self) -> bool {
        !self.shutdown_token.is_cancelled() && !self.queue.is_closed()
    }

    /// Jobs submitted but not yet picked up.
    pub fn queue_length(&self) -> usize {
        self.queue.queue_length()
    }
}

/// Destroys the engine when the loop exits, however it exits.
struct EngineGuard<E: RenderEngine> {
    engine: E,
}

impl<E: RenderEngine> Drop for EngineGuard<E> {
    fn drop(&mut self) {
        self.engine.destroy();
    }
}

async fn worker_loop<E: RenderEngine>(
    engine: E,
    mut intake: JobIntake,
    shutdown_token: CancellationToken,
    render_timeout: Option<Duration>,
) {
    let mut guard = EngineGuard { engine };
    let mut processed: u64 = 0;

    loop {
        debug!("Waiting for conversion request");
        let job = tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => {
                info!("Received stop signal");
                break;
            }
            job = intake.dequeue() => match job {
                Some(job) => job,
                None => {
                    debug!("All submitters are gone");
                    break;
                }
            },
        };

        process_job(&mut guard.engine, job, render_timeout).await;

        processed += 1;
        if processed % HEARTBEAT_EVERY == 0 {
            telemetry::record_worker_heartbeat(processed, intake.len());
        }
    }

    shutdown_token.cancel();
    let discarded = intake.close();
    if discarded > 0 {
        warn!(discarded, "Discarded queued conversion requests on shutdown");
    }

    drop(guard);
    info!(processed, "Convert loop is over");
}

/// Runs one job through the engine and delivers the result to its submitter.
async fn process_job<E: RenderEngine>(
    engine: &mut E,
    mut job: ConversionJob,
    render_timeout: Option<Duration>,
) {
    info!(job_id = %job.job_id, location = %job.location(), "Received a conversion request");

    if job.is_abandoned() {
        debug!(job_id = %job.job_id, "Submitter no longer waiting, converting anyway");
    }

    job.start_processing();
    let result = converter::convert(engine, &job.request, render_timeout).await;

    if let Err(e) = &result {
        warn!(job_id = %job.job_id, location = %job.location(), error = %e, "Failed to convert");
    }

    if job.complete(result) {
        debug!(job_id = %job.job_id, "Response delivered");
    } else {
        debug!(job_id = %job.job_id, "Submitter went away, result discarded");
    }

    telemetry::record_job_telemetry(&job);
}
