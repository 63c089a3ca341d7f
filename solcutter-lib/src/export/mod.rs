//! Background export jobs
//!
//! An [`Exporter`] runs at most one [`ExportJob`] at a time on a blocking
//! worker. The job is moved into the worker; the caller keeps an
//! [`ExportHandle`] that yields [`ExportEvent`]s in emission order and can
//! request cancellation. `Finished` is always the last event of a job.

pub mod pipeline;
pub mod progress;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{MediaEngine, VideoCodecs};
use crate::error::{ExportError, Result};
use crate::types::{ExportJob, ExportMode};

pub use pipeline::run_export;

/// What a successful export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub mode: ExportMode,
    /// Length of the exported slice in seconds
    pub duration_secs: f64,
    /// Encoded frame size, for video exports
    pub dimensions: Option<(u32, u32)>,
}

/// Notifications from the export worker to the interactive side
#[derive(Debug)]
pub enum ExportEvent {
    StatusChanged(String),
    /// Whole percentage in `[0, 100]`, never decreasing within a job
    ProgressChanged(u8),
    Finished {
        outcome: std::result::Result<ExportSummary, ExportError>,
    },
}

/// Receiver of export notifications on the interactive side
pub trait ExportObserver {
    fn on_status(&mut self, text: &str);
    fn on_progress(&mut self, percent: u8);
    fn on_finished(&mut self, outcome: &std::result::Result<ExportSummary, ExportError>);
}

/// Shared cancellation flag, checked between steps and between packets
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }
}

/// Clears the exporter's busy flag when the worker ends, even on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs export jobs against a media engine, one at a time
pub struct Exporter<E: MediaEngine> {
    engine: Arc<E>,
    codecs: VideoCodecs,
    busy: Arc<AtomicBool>,
}

impl<E: MediaEngine> Exporter<E> {
    pub fn new(engine: E, codecs: VideoCodecs) -> Self {
        Self {
            engine: Arc::new(engine),
            codecs,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Whether a job is currently running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start `job` on a blocking worker.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// `ExportError::Busy` while another job is running.
    pub fn start_export(&self, job: ExportJob) -> Result<ExportHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(source = ?job.source, "export rejected, another export is running");
            return Err(ExportError::Busy);
        }
        let guard = BusyGuard(Arc::clone(&self.busy));

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let engine = Arc::clone(&self.engine);
        let codecs = self.codecs.clone();
        let worker_cancel = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut notify = |event: ExportEvent| {
                // The receiver may be gone; the job still runs to completion.
                let _ = tx.send(event);
            };
            let outcome = run_export(engine.as_ref(), &job, &codecs, &worker_cancel, &mut notify);
            if let Err(e) = &outcome {
                tracing::error!(source = ?job.source, output = ?job.output, "export failed: {}", e);
                notify(ExportEvent::StatusChanged(pipeline::failure_status(e)));
            }
            drop(guard);
            notify(ExportEvent::Finished { outcome });
        });

        Ok(ExportHandle {
            events: rx,
            cancel,
            task,
        })
    }
}

/// The interactive side's view of a running job
pub struct ExportHandle {
    events: mpsc::UnboundedReceiver<ExportEvent>,
    cancel: CancelToken,
    task: tokio::task::JoinHandle<()>,
}

impl ExportHandle {
    /// Ask the worker to stop at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next event, `None` once the worker has exited and all events were read.
    pub async fn next_event(&mut self) -> Option<ExportEvent> {
        self.events.recv().await
    }

    /// Deliver every event to `observer` until the job finishes.
    pub async fn observe(
        mut self,
        observer: &mut dyn ExportObserver,
    ) -> std::result::Result<ExportSummary, ExportError> {
        while let Some(event) = self.events.recv().await {
            match event {
                ExportEvent::StatusChanged(text) => observer.on_status(&text),
                ExportEvent::ProgressChanged(percent) => observer.on_progress(percent),
                ExportEvent::Finished { outcome } => {
                    observer.on_finished(&outcome);
                    let _ = (&mut self.task).await;
                    return outcome;
                }
            }
        }

        // Channel closed without a Finished event: the worker panicked.
        let reason = match (&mut self.task).await {
            Err(e) => format!("export worker ended unexpectedly: {}", e),
            Ok(()) => "export worker ended without a result".to_string(),
        };
        let outcome = Err(ExportError::Encode(reason));
        observer.on_finished(&outcome);
        outcome
    }
}
