//! # request-batch
//!
//! 客户端请求批处理：并发执行一组网络请求，并向调用方报告单一的汇总结果。
//!
//! Client-side request batching. A batch runs a fixed set of independent
//! requests concurrently, tracks each one to completion, and reports one
//! aggregated success or failure.
//!
//! ## Core Philosophy
//!
//! - **Transport-Agnostic**: requests are reached only through the [`Request`] trait
//! - **Exactly Once**: one terminal callback per batch, decided under a single lock
//! - **Cancellable**: cancel-all and cancel-on-first-error, with cancellation kept
//!   distinct from real failures
//! - **Observable**: accessory hooks see every request start and stop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use request_batch::{BatchRequest, Request, RequestError, TaskRequest};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> request_batch::Result<()> {
//!     let requests: Vec<Arc<dyn Request>> = vec![
//!         Arc::new(TaskRequest::new(|| async { Ok(json!({"name": "ada"})) })?),
//!         Arc::new(TaskRequest::new(|| async {
//!             Err(RequestError::status(413, "avatar too large"))
//!         })?),
//!     ];
//!
//!     let batch = BatchRequest::new(requests)?;
//!     batch.start_with_callbacks(
//!         |batch| println!("all done: {:?}", batch.results()),
//!         |_batch, request, error| println!("{} failed: {}", request.id(), error),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Batch coordinator, registry, configuration, completion contexts |
//! | [`request`] | Request trait, completion handle, ready-made adapters |
//! | [`accessory`] | Lifecycle hooks for instrumentation |

pub mod accessory;
pub mod batch;
pub mod request;

pub use accessory::{Accessory, AccessoryEvent, AccessoryTarget, FnAccessory};
pub use batch::{
    BatchConfig, BatchFailure, BatchId, BatchOutcome, BatchRegistry, BatchRequest,
    CompletionContext,
};
pub use request::{Completion, Request, RequestError, RequestId, RequestOutcome, RequestState, TaskRequest};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
