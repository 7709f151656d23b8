//! Batch request: runs a fixed set of requests concurrently and reports one
//! aggregated outcome.

use super::config::BatchConfig;
use super::context::CompletionContext;
use super::registry::BatchRegistry;
use super::BatchId;
use crate::accessory::{notify_all, Accessory, AccessoryEvent, AccessoryTarget};
use crate::request::{Completion, Request, RequestError, RequestOutcome, RequestState};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub type SuccessCallback = Box<dyn FnOnce(&BatchRequest) + Send + 'static>;
pub type FailureCallback =
    Box<dyn FnOnce(&BatchRequest, &Arc<dyn Request>, &RequestError) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configuring,
    Running,
    Finished,
}

#[derive(Debug, Default)]
struct Member {
    state: RequestState,
    result: Option<Value>,
    error: Option<RequestError>,
}

impl Member {
    fn record(&mut self, outcome: &RequestOutcome) {
        self.state = RequestState::from_outcome(outcome);
        match outcome {
            Ok(value) => self.result = Some(value.clone()),
            Err(error) => self.error = Some(error.clone()),
        }
    }
}

enum Decision {
    Succeeded,
    Failed { index: usize, error: RequestError },
}

/// Everything that changes after construction. One lock guards all of it, so
/// the counters, the recorded failure and the finished flag never disagree.
struct State {
    phase: Phase,
    cancel_when_error_occur: bool,
    cancel_requested: bool,
    accessories: Vec<Arc<dyn Accessory>>,
    success: Option<SuccessCallback>,
    failure: Option<FailureCallback>,
    context: Arc<dyn CompletionContext>,
    members: Vec<Member>,
    finished_count: usize,
    stopped_count: usize,
    failed: Option<(usize, RequestError)>,
}

struct Inner {
    id: BatchId,
    requests: Vec<Arc<dyn Request>>,
    registry: Arc<BatchRegistry>,
    state: Mutex<State>,
}

/// Coordinates a fixed, ordered set of requests.
///
/// Cloning is cheap and yields another handle to the same batch.
///
/// Lifecycle:
/// 1. Build with [`BatchRequest::new`] or [`BatchRequest::with_config`].
/// 2. Configure: callbacks, accessories, cancel-on-error, completion context.
/// 3. [`start`](BatchRequest::start) once. Every request is started and the
///    batch is retained by its registry until it finishes.
/// 4. Exactly one of the success or failure callbacks is submitted to the
///    completion context.
#[derive(Clone)]
pub struct BatchRequest {
    inner: Arc<Inner>,
}

impl BatchRequest {
    pub fn new(requests: Vec<Arc<dyn Request>>) -> Result<Self> {
        Self::with_config(requests, BatchConfig::default())
    }

    /// Empty request sets and repeated request identities are rejected.
    pub fn with_config(requests: Vec<Arc<dyn Request>>, config: BatchConfig) -> Result<Self> {
        if requests.is_empty() {
            return Err(Error::configuration_with_context(
                "a batch needs at least one request",
                ErrorContext::new()
                    .with_field_path("requests")
                    .with_source("batch_request"),
            ));
        }
        let mut seen = HashSet::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if !seen.insert(request.id()) {
                return Err(Error::configuration_with_context(
                    "duplicate request in batch",
                    ErrorContext::new()
                        .with_field_path(format!("requests[{}]", index))
                        .with_details(format!("request {} appears more than once", request.id()))
                        .with_source("batch_request"),
                ));
            }
        }

        let registry = config.resolve_registry();
        let members = requests.iter().map(|_| Member::default()).collect();
        Ok(Self {
            inner: Arc::new(Inner {
                id: BatchId::new(),
                requests,
                registry,
                state: Mutex::new(State {
                    phase: Phase::Configuring,
                    cancel_when_error_occur: config.cancel_when_error_occur,
                    cancel_requested: false,
                    accessories: Vec::new(),
                    success: None,
                    failure: None,
                    context: config.completion_context,
                    members,
                    finished_count: 0,
                    stopped_count: 0,
                    failed: None,
                }),
            }),
        })
    }

    pub fn id(&self) -> BatchId {
        self.inner.id
    }

    /// Member requests in construction order.
    pub fn requests(&self) -> &[Arc<dyn Request>] {
        &self.inner.requests
    }

    pub fn len(&self) -> usize {
        self.inner.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.requests.is_empty()
    }

    pub fn registry(&self) -> &Arc<BatchRegistry> {
        &self.inner.registry
    }

    // ---------------------------------------------------------------------
    // Configuration (before start)
    // ---------------------------------------------------------------------

    pub fn add_accessory(&self, accessory: Arc<dyn Accessory>) -> Result<()> {
        self.configure("accessories", |st| st.accessories.push(accessory))
    }

    pub fn set_cancel_when_error_occur(&self, cancel: bool) -> Result<()> {
        self.configure("cancel_when_error_occur", |st| {
            st.cancel_when_error_occur = cancel
        })
    }

    pub fn set_completion_context(&self, ctx: Arc<dyn CompletionContext>) -> Result<()> {
        self.configure("completion_context", |st| st.context = ctx)
    }

    /// Replace both callbacks.
    pub fn set_callbacks<S, F>(&self, success: S, failure: F) -> Result<()>
    where
        S: FnOnce(&BatchRequest) + Send + 'static,
        F: FnOnce(&BatchRequest, &Arc<dyn Request>, &RequestError) + Send + 'static,
    {
        let success: SuccessCallback = Box::new(success);
        let failure: FailureCallback = Box::new(failure);
        self.configure("callbacks", move |st| {
            st.success = Some(success);
            st.failure = Some(failure);
        })
    }

    fn configure<T>(&self, field: &str, apply: impl FnOnce(&mut State) -> T) -> Result<T> {
        let mut st = self.lock();
        if st.phase != Phase::Configuring {
            return Err(Error::misuse_with_context(
                "batch configuration is frozen once started",
                ErrorContext::new()
                    .with_field_path(field)
                    .with_details(format!("batch {}", self.id()))
                    .with_source("batch_request"),
            ));
        }
        Ok(apply(&mut st))
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    /// Start every request. Returns immediately; the outcome arrives through
    /// the callbacks. A second call is a misuse error.
    pub fn start(&self) -> Result<()> {
        let accessories = {
            let mut st = self.lock();
            match st.phase {
                Phase::Configuring => {}
                Phase::Running | Phase::Finished => {
                    let msg = if st.phase == Phase::Running {
                        "batch already started"
                    } else {
                        "batch already finished"
                    };
                    return Err(Error::misuse_with_context(
                        msg,
                        ErrorContext::new()
                            .with_field_path("start")
                            .with_details(format!("batch {}", self.id()))
                            .with_source("batch_request"),
                    ));
                }
            }
            st.phase = Phase::Running;
            st.accessories.clone()
        };

        if let Err(e) = self.inner.registry.add(self.clone()) {
            self.lock().phase = Phase::Finished;
            return Err(e);
        }

        debug!(batch_id = %self.id(), requests = self.len(), "starting batch");
        notify_all(
            &accessories,
            AccessoryEvent::WillStart,
            AccessoryTarget::Batch(self),
        );
        for request in &self.inner.requests {
            let target = AccessoryTarget::Request(request.as_ref());
            notify_all(&request.accessories(), AccessoryEvent::WillStart, target);
            notify_all(&accessories, AccessoryEvent::WillStart, target);
        }

        for (index, request) in self.inner.requests.iter().enumerate() {
            let halted = {
                let st = self.lock();
                st.cancel_requested || st.phase == Phase::Finished
            };
            if halted {
                // Cancelled or already failed while starting: never hand the
                // request to the transport.
                self.member_finished(index, Err(RequestError::Cancelled));
                continue;
            }
            let batch = self.clone();
            request.start(Completion::new(request.id(), move |outcome| {
                batch.member_finished(index, outcome)
            }));
        }
        Ok(())
    }

    /// Set the callbacks and start in one call.
    pub fn start_with_callbacks<S, F>(&self, success: S, failure: F) -> Result<()>
    where
        S: FnOnce(&BatchRequest) + Send + 'static,
        F: FnOnce(&BatchRequest, &Arc<dyn Request>, &RequestError) + Send + 'static,
    {
        self.set_callbacks(success, failure)?;
        self.start()
    }

    /// Start the batch and wait for its outcome.
    ///
    /// Installs its own callbacks, replacing any set earlier.
    pub async fn run(&self) -> Result<BatchOutcome> {
        let (tx, rx) = oneshot::channel();
        let failure_tx = Arc::new(Mutex::new(Some(tx)));
        let success_tx = failure_tx.clone();
        self.start_with_callbacks(
            move |batch| {
                if let Some(tx) = take_sender(&success_tx) {
                    let _ = tx.send(BatchOutcome::Succeeded(batch.clone()));
                }
            },
            move |batch, request, error| {
                if let Some(tx) = take_sender(&failure_tx) {
                    let _ = tx.send(BatchOutcome::Failed(BatchFailure {
                        batch: batch.clone(),
                        request: request.clone(),
                        error: error.clone(),
                    }));
                }
            },
        )?;
        rx.await.map_err(|_| {
            Error::runtime_with_context(
                "batch outcome was never delivered",
                ErrorContext::new()
                    .with_details(format!("batch {}", self.id()))
                    .with_source("batch_request"),
            )
        })
    }

    /// Ask every unfinished request to cancel.
    ///
    /// The batch still waits for each request to report, then fails with the
    /// first failure that arrived, which is a cancellation unless a real
    /// failure got there first. No-op before start and after finish.
    pub fn cancel(&self) {
        let pending: Vec<usize> = {
            let mut st = self.lock();
            if st.phase != Phase::Running || st.cancel_requested {
                debug!(batch_id = %self.id(), phase = ?st.phase, "cancel ignored");
                return;
            }
            st.cancel_requested = true;
            st.members
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.state.is_terminal())
                .map(|(i, _)| i)
                .collect()
        };
        info!(batch_id = %self.id(), pending = pending.len(), "cancelling batch");
        for index in pending {
            self.inner.requests[index].cancel();
        }
    }

    // ---------------------------------------------------------------------
    // Outcome aggregation
    // ---------------------------------------------------------------------

    fn member_finished(&self, index: usize, outcome: RequestOutcome) {
        let request = &self.inner.requests[index];
        let (accessories, to_cancel, concluded) = {
            let mut st = self.lock();
            if st.members[index].state.is_terminal() {
                warn!(batch_id = %self.id(), request_id = %request.id(), "request reported twice; ignoring");
                return;
            }
            st.members[index].record(&outcome);
            st.stopped_count += 1;

            let mut decision = None;
            let mut to_cancel = Vec::new();
            match &outcome {
                Ok(_) => st.finished_count += 1,
                Err(error) if st.phase != Phase::Running => {
                    warn!(
                        batch_id = %self.id(),
                        request_id = %request.id(),
                        error = %error,
                        "failure after batch finished; discarding"
                    );
                }
                Err(error) if st.failed.is_none() => {
                    st.failed = Some((index, error.clone()));
                    if !st.cancel_requested {
                        decision = Some(Decision::Failed {
                            index,
                            error: error.clone(),
                        });
                        if st.cancel_when_error_occur {
                            to_cancel = st
                                .members
                                .iter()
                                .enumerate()
                                .filter(|(i, m)| *i != index && !m.state.is_terminal())
                                .map(|(i, _)| i)
                                .collect();
                        }
                    }
                }
                Err(error) => {
                    debug!(batch_id = %self.id(), request_id = %request.id(), error = %error, "later failure not reported");
                }
            }

            if decision.is_none() && st.phase == Phase::Running {
                let total = self.inner.requests.len();
                if st.cancel_requested {
                    if st.stopped_count == total {
                        // Without a recorded failure the cancel itself is the failure.
                        let (index, error) = st
                            .failed
                            .get_or_insert((0, RequestError::Cancelled))
                            .clone();
                        decision = Some(Decision::Failed { index, error });
                    }
                } else if st.finished_count == total && st.failed.is_none() {
                    decision = Some(Decision::Succeeded);
                }
            }

            let concluded = decision.map(|decision| {
                st.phase = Phase::Finished;
                let callback = match decision {
                    Decision::Succeeded => Callback::Success(st.success.take()),
                    Decision::Failed { index, error } => {
                        Callback::Failure(index, error, st.failure.take())
                    }
                };
                st.success = None;
                st.failure = None;
                (callback, st.context.clone())
            });
            // Accessories are frozen once running, so this snapshot is complete.
            (st.accessories.clone(), to_cancel, concluded)
        };

        let target = AccessoryTarget::Request(request.as_ref());
        notify_all(&request.accessories(), AccessoryEvent::DidStop, target);
        notify_all(&accessories, AccessoryEvent::DidStop, target);

        if !to_cancel.is_empty() {
            debug!(batch_id = %self.id(), count = to_cancel.len(), "cancelling remaining requests after failure");
        }
        for i in to_cancel {
            self.inner.requests[i].cancel();
        }

        if let Some((callback, context)) = concluded {
            self.conclude(callback, context, &accessories);
        }
    }

    fn conclude(
        &self,
        callback: Callback,
        context: Arc<dyn CompletionContext>,
        accessories: &[Arc<dyn Accessory>],
    ) {
        self.inner.registry.remove(self);
        match callback {
            Callback::Success(success) => {
                info!(batch_id = %self.id(), requests = self.len(), "batch succeeded");
                if let Some(success) = success {
                    let batch = self.clone();
                    context.submit(Box::new(move || success(&batch)));
                }
            }
            Callback::Failure(index, error, failure) => {
                let request = self.inner.requests[index].clone();
                info!(
                    batch_id = %self.id(),
                    request_id = %request.id(),
                    index,
                    cancelled = error.is_cancellation(),
                    error = %error,
                    "batch failed"
                );
                if let Some(failure) = failure {
                    let batch = self.clone();
                    context.submit(Box::new(move || failure(&batch, &request, &error)));
                }
            }
        }
        notify_all(accessories, AccessoryEvent::DidStop, AccessoryTarget::Batch(self));
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    pub fn cancel_when_error_occur(&self) -> bool {
        self.lock().cancel_when_error_occur
    }

    pub fn is_started(&self) -> bool {
        self.lock().phase != Phase::Configuring
    }

    /// True once the terminal outcome has been decided.
    pub fn is_finished(&self) -> bool {
        self.lock().phase == Phase::Finished
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Number of requests that succeeded.
    pub fn finished_count(&self) -> usize {
        self.lock().finished_count
    }

    pub fn failed_request(&self) -> Option<Arc<dyn Request>> {
        let index = self.lock().failed.as_ref().map(|(i, _)| *i)?;
        Some(self.inner.requests[index].clone())
    }

    pub fn failed_error(&self) -> Option<RequestError> {
        self.lock().failed.as_ref().map(|(_, e)| e.clone())
    }

    pub fn member_state(&self, index: usize) -> Option<RequestState> {
        self.lock().members.get(index).map(|m| m.state)
    }

    pub fn states(&self) -> Vec<RequestState> {
        self.lock().members.iter().map(|m| m.state).collect()
    }

    /// Result of the request at `index`, if it succeeded.
    pub fn result(&self, index: usize) -> Option<Value> {
        self.lock().members.get(index).and_then(|m| m.result.clone())
    }

    /// Results in request order; `None` for requests that did not succeed.
    pub fn results(&self) -> Vec<Option<Value>> {
        self.lock().members.iter().map(|m| m.result.clone()).collect()
    }

    pub fn error(&self, index: usize) -> Option<RequestError> {
        self.lock().members.get(index).and_then(|m| m.error.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

enum Callback {
    Success(Option<SuccessCallback>),
    Failure(usize, RequestError, Option<FailureCallback>),
}

fn take_sender<T>(slot: &Mutex<Option<oneshot::Sender<T>>>) -> Option<oneshot::Sender<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl fmt::Debug for BatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("BatchRequest")
            .field("id", &self.inner.id)
            .field("requests", &self.inner.requests.len())
            .field("phase", &st.phase)
            .field("finished_count", &st.finished_count)
            .field("failed", &st.failed)
            .finish()
    }
}

/// Terminal outcome returned by [`BatchRequest::run`].
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Succeeded(BatchRequest),
    Failed(BatchFailure),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded(_))
    }

    pub fn batch(&self) -> &BatchRequest {
        match self {
            BatchOutcome::Succeeded(batch) => batch,
            BatchOutcome::Failed(failure) => &failure.batch,
        }
    }

    pub fn into_result(self) -> std::result::Result<BatchRequest, BatchFailure> {
        match self {
            BatchOutcome::Succeeded(batch) => Ok(batch),
            BatchOutcome::Failed(failure) => Err(failure),
        }
    }
}

/// The failing request of a batch and the error it reported.
#[derive(Clone)]
pub struct BatchFailure {
    pub batch: BatchRequest,
    pub request: Arc<dyn Request>,
    pub error: RequestError,
}

impl fmt::Debug for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchFailure")
            .field("batch_id", &self.batch.id())
            .field("request_id", &self.request.id())
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} failed at request {} ({}): {}",
            self.batch.id(),
            self.request.id(),
            self.request.name(),
            self.error
        )
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
