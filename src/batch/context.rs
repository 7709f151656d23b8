//! Completion contexts: where terminal callbacks run.

use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of deferred callback work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution context that terminal callbacks are submitted to.
///
/// By the time `submit` is called the batch has already recorded its outcome,
/// issued any cancellations and left the registry.
pub trait CompletionContext: Send + Sync {
    fn submit(&self, job: Job);
}

impl<F> CompletionContext for F
where
    F: Fn(Job) + Send + Sync,
{
    fn submit(&self, job: Job) {
        self(job)
    }
}

/// Runs callbacks on the thread that observed the final outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl CompletionContext for Inline {
    fn submit(&self, job: Job) {
        job()
    }
}

/// Spawns each callback as a task on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioContext {
    handle: Handle,
}

impl TokioContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn current() -> Result<Self> {
        Handle::try_current().map(Self::new).map_err(|e| {
            Error::runtime_with_context(
                "no tokio runtime available for completion delivery",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("tokio_context"),
            )
        })
    }
}

impl CompletionContext for TokioContext {
    fn submit(&self, job: Job) {
        let mut pending = PendingJob(Some(job));
        self.handle.spawn(async move { pending.run() });
    }
}

/// Runs its job when dropped unpolled, which is what a shut-down runtime
/// does to a freshly spawned task.
struct PendingJob(Option<Job>);

impl PendingJob {
    fn run(&mut self) {
        if let Some(job) = self.0.take() {
            job();
        }
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        if self.0.is_some() {
            tracing::warn!("tokio runtime gone before callback ran; running it inline");
            self.run();
        }
    }
}

/// Delivers callbacks one at a time, in submission order, on a single task.
#[derive(Clone)]
pub struct SerialQueue {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Spawn the draining task on `handle`.
    pub fn spawn(label: impl Into<String>, handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let label: Arc<str> = Arc::from(label.into());
        let task_label = label.clone();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            tracing::debug!(queue = %task_label, "serial queue drained");
        });
        Self { label, tx }
    }

    pub fn current(label: impl Into<String>) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "no tokio runtime available for serial queue",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("serial_queue"),
            )
        })?;
        Ok(Self::spawn(label, &handle))
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl CompletionContext for SerialQueue {
    fn submit(&self, job: Job) {
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            // Queue task is gone (runtime shut down); never lose a callback.
            tracing::warn!(queue = %self.label, "serial queue closed; running callback inline");
            job();
        }
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .finish()
    }
}
