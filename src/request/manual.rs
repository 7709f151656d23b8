//! Hand-resolved request.

use super::{Completion, Request, RequestError, RequestId, RequestState};
use crate::accessory::Accessory;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ManualState {
    completion: Option<Completion>,
    state: RequestState,
    started: bool,
    cancelled: bool,
    cancel_signals: usize,
}

/// A request resolved by calling [`ManualRequest::succeed`] or
/// [`ManualRequest::fail`].
///
/// By default a cancel signal on a running request reports
/// [`RequestError::Cancelled`] right away, the way a well-behaved transport
/// would. [`ManualRequest::ignoring_cancel`] turns that off so the request
/// keeps running until resolved by hand.
pub struct ManualRequest {
    id: RequestId,
    name: String,
    honor_cancel: bool,
    accessories: Vec<Arc<dyn Accessory>>,
    inner: Mutex<ManualState>,
}

impl ManualRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            name: name.into(),
            honor_cancel: true,
            accessories: Vec::new(),
            inner: Mutex::new(ManualState::default()),
        }
    }

    pub fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }

    pub fn with_accessory(mut self, accessory: Arc<dyn Accessory>) -> Self {
        self.accessories.push(accessory);
        self
    }

    /// Report success. Returns false if the request is not waiting on an outcome.
    pub fn succeed(&self, result: impl Into<serde_json::Value>) -> bool {
        let result = result.into();
        match self.take_completion(RequestState::Succeeded) {
            Some(completion) => {
                completion.succeed(result);
                true
            }
            None => false,
        }
    }

    /// Report failure. Returns false if the request is not waiting on an outcome.
    pub fn fail(&self, error: RequestError) -> bool {
        let state = if error.is_cancellation() {
            RequestState::Cancelled
        } else {
            RequestState::Failed
        };
        match self.take_completion(state) {
            Some(completion) => {
                completion.fail(error);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> RequestState {
        self.lock().state
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// Number of times `cancel` was called.
    pub fn cancel_signals(&self) -> usize {
        self.lock().cancel_signals
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The completion is invoked after the guard is released: reporting can
    // re-enter `cancel` on this same request.
    fn take_completion(&self, state: RequestState) -> Option<Completion> {
        let mut inner = self.lock();
        let completion = inner.completion.take()?;
        inner.state = state;
        Some(completion)
    }
}

impl Request for ManualRequest {
    fn id(&self) -> RequestId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, completion: Completion) {
        let mut inner = self.lock();
        inner.started = true;
        if inner.cancelled {
            inner.state = RequestState::Cancelled;
            drop(inner);
            completion.fail(RequestError::Cancelled);
            return;
        }
        inner.state = RequestState::Running;
        inner.completion = Some(completion);
    }

    fn cancel(&self) {
        let completion = {
            let mut inner = self.lock();
            inner.cancel_signals += 1;
            inner.cancelled = true;
            if !self.honor_cancel || inner.state.is_terminal() {
                None
            } else {
                let completion = inner.completion.take();
                if completion.is_some() {
                    inner.state = RequestState::Cancelled;
                }
                completion
            }
        };
        if let Some(completion) = completion {
            completion.fail(RequestError::Cancelled);
        }
    }

    fn accessories(&self) -> Vec<Arc<dyn Accessory>> {
        self.accessories.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_manual_succeed() {
        let request = ManualRequest::new("r1");
        assert!(!request.succeed("too early"));
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        assert_eq!(request.state(), RequestState::Running);
        assert!(request.succeed("a"));
        assert!(!request.succeed("twice"));
        assert_eq!(rx.await.unwrap(), Ok(json!("a")));
        assert_eq!(request.state(), RequestState::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_reports_cancelled() {
        let request = ManualRequest::new("r1");
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        request.cancel();
        request.cancel();
        assert_eq!(rx.await.unwrap(), Err(RequestError::Cancelled));
        assert_eq!(request.cancel_signals(), 2);
        assert_eq!(request.state(), RequestState::Cancelled);
    }

    #[tokio::test]
    async fn test_ignoring_cancel_keeps_running() {
        let request = ManualRequest::new("r1").ignoring_cancel();
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        request.cancel();
        assert_eq!(request.state(), RequestState::Running);
        assert!(request.fail(RequestError::transport("reset")));
        assert_eq!(rx.await.unwrap(), Err(RequestError::transport("reset")));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let request = ManualRequest::new("r1");
        request.cancel();
        let (completion, rx) = Completion::channel(request.id());
        request.start(completion);
        assert!(request.is_started());
        assert_eq!(rx.await.unwrap(), Err(RequestError::Cancelled));
    }
}
