//! 批量请求模块：并发运行一组请求，并汇总为单一的成功或失败结果。
//!
//! # Batch Requests
//!
//! A [`BatchRequest`] runs a fixed set of independent requests concurrently
//! and reports exactly one aggregated outcome: success once every request
//! succeeded, or failure with the first request that failed.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`BatchRequest`] | Coordinator: start, cancel, aggregate outcomes |
//! | [`BatchConfig`] | Cancel-on-error policy, completion context, registry |
//! | [`BatchRegistry`] | Keep-alive table for in-flight batches |
//! | [`CompletionContext`] | Where terminal callbacks are delivered |
//! | [`BatchOutcome`] | Awaitable result of [`BatchRequest::run`] |
//!
//! ## Example
//!
//! ```rust,no_run
//! use request_batch::batch::{BatchConfig, BatchRequest};
//! use request_batch::request::{Request, TaskRequest};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> request_batch::Result<()> {
//! let requests: Vec<Arc<dyn Request>> = vec![
//!     Arc::new(TaskRequest::new(|| async { Ok(json!("profile")) })?),
//!     Arc::new(TaskRequest::new(|| async { Ok(json!("avatar")) })?),
//! ];
//! let batch = BatchRequest::with_config(
//!     requests,
//!     BatchConfig::new().with_cancel_when_error_occur(true),
//! )?;
//! match batch.run().await?.into_result() {
//!     Ok(done) => println!("results: {:?}", done.results()),
//!     Err(failure) => println!("failed: {}", failure),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Outcome rules
//!
//! - Success fires once every member succeeded and nobody called cancel.
//! - The first failure to reach the batch decides the outcome immediately.
//!   With cancel-on-error, every other unfinished member is cancelled.
//! - After [`BatchRequest::cancel`] the batch waits for all members, then
//!   reports the first failure that arrived, or `Cancelled` when every
//!   member still succeeded.
//! - Whatever happens, exactly one callback fires.

mod config;
mod context;
mod registry;
mod request;

pub use config::{BatchConfig, CANCEL_ON_ERROR_ENV};
pub use context::{CompletionContext, Inline, Job, SerialQueue, TokioContext};
pub use registry::{get_batch_registry, BatchRegistry};
pub use request::{BatchFailure, BatchOutcome, BatchRequest, FailureCallback, SuccessCallback};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identity of a batch, used as its registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
