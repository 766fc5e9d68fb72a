//! Fixed-size worker pool running analysis jobs to a terminal state.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::{ArtifactStore, ImageSource, RecordStore, RecordUpdate};
use crate::api::Analyzer;
use crate::error::{AnalysisError, AnalysisResult, ErrorKind};
use crate::pipeline::InferenceResult;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Terminal state of one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        record_id: String,
        result: InferenceResult,
        overlay_locator: String,
    },
    Failed {
        record_id: String,
        /// `None` when the job panicked or was dropped unrun.
        kind: Option<ErrorKind>,
        reason: String,
    },
}

impl JobOutcome {
    pub fn record_id(&self) -> &str {
        match self {
            Self::Completed { record_id, .. } | Self::Failed { record_id, .. } => record_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    fn failed(record_id: &str, kind: Option<ErrorKind>, reason: impl Into<String>) -> Self {
        Self::Failed {
            record_id: record_id.to_string(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Receipt for a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    record_id: String,
    rx: mpsc::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// Block until the job settles.
    pub fn wait(self) -> JobOutcome {
        self.rx.recv().unwrap_or_else(|_| {
            JobOutcome::failed(&self.record_id, None, "job dropped before completion")
        })
    }
}

struct JobContext {
    analyzer: Analyzer,
    source: Arc<dyn ImageSource>,
    artifacts: Arc<dyn ArtifactStore>,
    records: Arc<dyn RecordStore>,
}

impl JobContext {
    fn run(&self, record_id: &str, locator: &str) -> AnalysisResult<(InferenceResult, String)> {
        let bytes = self.source.fetch(locator)?;
        let result = self.analyzer.infer(&bytes)?;
        let tag = overlay_tag(record_id);
        let overlay_locator = self.artifacts.store(&tag, &result.overlay_image)?;
        self.records
            .update(record_id, &RecordUpdate::completed(&result, overlay_locator.clone()))?;
        Ok((result, overlay_locator))
    }

    fn settle(&self, record_id: &str, locator: &str) -> JobOutcome {
        tracing::debug!(record_id, locator, "job started");
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.run(record_id, locator)));
        let (kind, reason) = match attempt {
            Ok(Ok((result, overlay_locator))) => {
                tracing::info!(record_id, diagnosis = %result.diagnosis, "job completed");
                return JobOutcome::Completed {
                    record_id: record_id.to_string(),
                    result,
                    overlay_locator,
                };
            }
            Ok(Err(err)) => (Some(err.kind()), err.to_string()),
            Err(payload) => (None, panic_message(payload.as_ref())),
        };

        tracing::warn!(record_id, ?kind, %reason, "job failed");
        if let Err(err) = self.records.update(record_id, &RecordUpdate::failed(kind)) {
            tracing::error!(record_id, error = %err, "could not mark record as failed");
        }
        JobOutcome::failed(record_id, kind, reason)
    }
}

/// Artifact tag of a record's overlay image.
pub fn overlay_tag(record_id: &str) -> String {
    format!("{record_id}_overlay")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("job panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("job panicked: {s}")
    } else {
        "job panicked".to_string()
    }
}

/// Background analysis queue.
///
/// Jobs share one [`Analyzer`] (and so one registry). Each job runs start to
/// finish on a single worker; a failing job never affects the others.
pub struct JobQueue {
    tx: Option<mpsc::Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    ctx: Arc<JobContext>,
}

impl JobQueue {
    /// Start `analyzer.config().workers` worker threads.
    pub fn start(
        analyzer: Analyzer,
        source: Arc<dyn ImageSource>,
        artifacts: Arc<dyn ArtifactStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let size = analyzer.config().workers.max(1);
        let (tx, rx) = mpsc::channel::<Task>();
        let shared_rx = Arc::new(Mutex::new(rx));

        let workers = (0..size)
            .map(|i| {
                let rx = Arc::clone(&shared_rx);
                thread::Builder::new()
                    .name(format!("retiscan-worker-{i}"))
                    .spawn(move || worker_loop(&rx))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::error!(error = %err, "failed to spawn worker");
                    None
                }
            })
            .collect::<Vec<_>>();
        tracing::info!(workers = workers.len(), "job queue started");

        Self {
            tx: Some(tx),
            workers,
            ctx: Arc::new(JobContext {
                analyzer,
                source,
                artifacts,
                records,
            }),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Mark the record `PENDING` and enqueue its analysis.
    pub fn submit(&self, record_id: impl Into<String>, locator: impl Into<String>) -> JobHandle {
        let record_id = record_id.into();
        let locator = locator.into();
        let (done_tx, done_rx) = mpsc::channel();
        let handle = JobHandle {
            record_id: record_id.clone(),
            rx: done_rx,
        };

        if let Err(err) = self.ctx.records.update(&record_id, &RecordUpdate::pending()) {
            tracing::warn!(record_id = %record_id, error = %err, "could not mark record as pending");
        }

        let ctx = Arc::clone(&self.ctx);
        let id = record_id.clone();
        let task: Task = Box::new(move || {
            let outcome = ctx.settle(&id, &locator);
            // The caller may have dropped its handle.
            let _ = done_tx.send(outcome);
        });

        let sent = match &self.tx {
            Some(tx) => tx.send(task).map_err(|_| ()),
            None => Err(()),
        };
        if sent.is_err() {
            let err = AnalysisError::InvalidConfig("job queue has no running workers".into());
            tracing::warn!(record_id = %record_id, "job rejected");
            if let Err(persist) = self.ctx.records.update(&record_id, &RecordUpdate::from_error(&err)) {
                tracing::error!(record_id = %record_id, error = %persist, "could not mark record as failed");
            }
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(JobOutcome::failed(&record_id, Some(err.kind()), err.to_string()));
            return JobHandle { record_id, rx };
        }
        handle
    }

    /// Stop accepting work, finish queued jobs and join every worker.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // Dropping the sender ends every worker loop once the queue drains.
        self.tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<Task>>) {
    loop {
        let task = {
            let guard = match rx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.recv()
        };
        match task {
            Ok(task) => task(),
            Err(_) => break,
        }
    }
}
