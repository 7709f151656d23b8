//! 请求抽象：批处理所协调的单个异步网络请求。
//!
//! # Request Contract
//!
//! A [`Request`] is one independently startable and cancellable asynchronous
//! operation. The batching layer never performs I/O itself; it only drives
//! requests through this trait and listens for their outcome.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Request`] | Trait every batch member implements |
//! | [`Completion`] | One-shot handle a request reports its outcome through |
//! | [`RequestError`] | Terminal failure, with a distinct cancellation kind |
//! | [`TaskRequest`] | Adapter running any future on tokio |
//! | [`ManualRequest`] | Hand-resolved request for tests and demos |
//!
//! ## Contract
//!
//! - `start` begins the operation and must eventually report exactly once
//!   through the [`Completion`] it was given.
//! - `cancel` is idempotent and a no-op after termination. A request
//!   cancelled before `start` reports [`RequestError::Cancelled`] as soon as
//!   it is started.

mod completion;
mod error;
mod manual;
mod task;

pub use completion::Completion;
pub use error::RequestError;
pub use manual::ManualRequest;
pub use task::TaskRequest;

use crate::accessory::Accessory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Terminal outcome of a request: a JSON result or a failure.
pub type RequestOutcome = std::result::Result<serde_json::Value, RequestError>;

/// Unique identity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::Failed | RequestState::Cancelled
        )
    }

    pub fn from_outcome(outcome: &RequestOutcome) -> Self {
        match outcome {
            Ok(_) => RequestState::Succeeded,
            Err(e) if e.is_cancellation() => RequestState::Cancelled,
            Err(_) => RequestState::Failed,
        }
    }
}

impl Default for RequestState {
    fn default() -> Self {
        RequestState::Idle
    }
}

/// An independently startable, cancellable asynchronous operation.
pub trait Request: Send + Sync {
    fn id(&self) -> RequestId;

    /// Human-readable label used in logs.
    fn name(&self) -> &str {
        "request"
    }

    /// Begin the operation. Must not block; the outcome goes through `completion`.
    fn start(&self, completion: Completion);

    /// Ask the operation to stop early.
    fn cancel(&self);

    /// Hooks observing this request's start and stop.
    fn accessories(&self) -> Vec<Arc<dyn Accessory>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_from_outcome() {
        assert_eq!(
            RequestState::from_outcome(&Ok(json!("a"))),
            RequestState::Succeeded
        );
        assert_eq!(
            RequestState::from_outcome(&Err(RequestError::Cancelled)),
            RequestState::Cancelled
        );
        assert_eq!(
            RequestState::from_outcome(&Err(RequestError::status(500, "boom"))),
            RequestState::Failed
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestState::Idle.is_terminal());
        assert!(!RequestState::Running.is_terminal());
        assert!(RequestState::Succeeded.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RequestState::Succeeded).unwrap(),
            json!("succeeded")
        );
    }
}
