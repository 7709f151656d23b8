//! One-shot completion handle handed to a request when it starts.

use super::{RequestError, RequestId, RequestOutcome};
use tokio::sync::oneshot;

type Notify = Box<dyn FnOnce(RequestOutcome) + Send + 'static>;

/// Reports the terminal outcome of one request, exactly once.
///
/// Every reporting method consumes the handle. Dropping it without
/// reporting delivers [`RequestError::Abandoned`], so whoever waits on the
/// request is never left hanging.
pub struct Completion {
    request_id: RequestId,
    notify: Option<Notify>,
}

impl Completion {
    pub fn new<F>(request_id: RequestId, notify: F) -> Self
    where
        F: FnOnce(RequestOutcome) + Send + 'static,
    {
        Self {
            request_id,
            notify: Some(Box::new(notify)),
        }
    }

    /// A completion whose outcome can be awaited on the returned receiver.
    pub fn channel(request_id: RequestId) -> (Self, oneshot::Receiver<RequestOutcome>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(request_id, move |outcome| {
            // Receiver gone means nobody is interested any more.
            let _ = tx.send(outcome);
        });
        (completion, rx)
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn succeed(self, result: impl Into<serde_json::Value>) {
        self.complete(Ok(result.into()));
    }

    pub fn fail(self, error: RequestError) {
        self.complete(Err(error));
    }

    pub fn complete(mut self, outcome: RequestOutcome) {
        if let Some(notify) = self.notify.take() {
            notify(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(notify) = self.notify.take() {
            tracing::warn!(
                request_id = %self.request_id,
                "completion dropped without an outcome; reporting request as abandoned"
            );
            notify(Err(RequestError::Abandoned));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("request_id", &self.request_id)
            .field("pending", &self.notify.is_some())
            .finish()
    }
}
