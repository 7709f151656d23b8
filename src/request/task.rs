//! Request adapter over an arbitrary future.

use super::{Completion, Request, RequestError, RequestId, RequestOutcome, RequestState};
use crate::accessory::Accessory;
use crate::{Error, ErrorContext, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

type TaskFactory = Box<dyn FnOnce() -> BoxFuture<'static, RequestOutcome> + Send>;

/// Runs a future on a tokio runtime as a batch member.
///
/// The future is created lazily when the request starts. Cancelling races a
/// [`CancellationToken`] against it; whichever resolves first decides the
/// outcome.
pub struct TaskRequest {
    id: RequestId,
    name: String,
    handle: Handle,
    factory: Mutex<Option<TaskFactory>>,
    token: CancellationToken,
    state: Arc<Mutex<RequestState>>,
    accessories: Vec<Arc<dyn Accessory>>,
}

impl TaskRequest {
    /// Build a request on the ambient tokio runtime.
    pub fn new<F, Fut>(make: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = RequestOutcome> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "TaskRequest needs a tokio runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("task_request"),
            )
        })?;
        Ok(Self::with_handle(handle, make))
    }

    pub fn with_handle<F, Fut>(handle: Handle, make: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = RequestOutcome> + Send + 'static,
    {
        Self {
            id: RequestId::new(),
            name: "task".to_string(),
            handle,
            factory: Mutex::new(Some(Box::new(move || make().boxed()))),
            token: CancellationToken::new(),
            state: Arc::new(Mutex::new(RequestState::Idle)),
            accessories: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_accessory(mut self, accessory: Arc<dyn Accessory>) -> Self {
        self.accessories.push(accessory);
        self
    }

    pub fn state(&self) -> RequestState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn set_state(&self, state: RequestState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl Request for TaskRequest {
    fn id(&self) -> RequestId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, completion: Completion) {
        let factory = self
            .factory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(factory) = factory else {
            tracing::warn!(request_id = %self.id, name = %self.name, "task request started twice");
            completion.fail(RequestError::other("task request was already started"));
            return;
        };

        if self.token.is_cancelled() {
            self.set_state(RequestState::Cancelled);
            completion.fail(RequestError::Cancelled);
            return;
        }

        self.set_state(RequestState::Running);
        let token = self.token.clone();
        let state = self.state.clone();
        self.handle.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(RequestError::Cancelled),
                outcome = factory() => outcome,
            };
            *state.lock().unwrap_or_else(PoisonError::into_inner) =
                RequestState::from_outcome(&outcome);
            completion.complete(outcome);
        });
    }

    fn cancel(&self) {
        self.token.cancel();
    }

    fn accessories(&self) -> Vec<Arc<dyn Accessory>> {
        self.accessories.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_task_runs_future() {
        let request = TaskRequest::new(|| async { Ok(json!("a")) }).unwrap();
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        assert_eq!(rx.await.unwrap(), Ok(json!("a")));
        assert_eq!(request.state(), RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let request = TaskRequest::new(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("late"))
        })
        .unwrap();
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        request.cancel();
        assert_eq!(rx.await.unwrap(), Err(RequestError::Cancelled));
        assert_eq!(request.state(), RequestState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_before_start_reports_cancelled() {
        let request = TaskRequest::new(|| async { Ok(json!(1)) }).unwrap();
        request.cancel();
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        assert_eq!(rx.await.unwrap(), Err(RequestError::Cancelled));
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let request = TaskRequest::new(|| async { Ok(json!(1)) }).unwrap();
        let (first, first_rx) = Completion::channel(request.id());
        request.start(first);
        let (second, second_rx) = Completion::channel(request.id());
        request.start(second);
        assert!(first_rx.await.unwrap().is_ok());
        assert!(matches!(
            second_rx.await.unwrap(),
            Err(RequestError::Other { .. })
        ));
    }

    #[test]
    fn test_new_without_runtime_fails() {
        let result = TaskRequest::new(|| async { Ok(json!(1)) });
        assert!(matches!(result, Err(Error::Runtime { .. })));
    }
}
