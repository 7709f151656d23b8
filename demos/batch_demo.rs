//! Profile update demo: fetch a profile, upload an avatar and post a status
//! as one batch, first with every request succeeding and then with the
//! upload rejected under cancel-on-error.
//!
//! Run with `RUST_LOG=request_batch=debug cargo run --example batch_demo`.

use request_batch::accessory::LoggingAccessory;
use request_batch::batch::{BatchConfig, BatchRequest, TokioContext};
use request_batch::request::{Request, RequestError, TaskRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn simulated(
    name: &'static str,
    delay_ms: u64,
    outcome: std::result::Result<serde_json::Value, RequestError>,
) -> anyhow::Result<Arc<dyn Request>> {
    let request = TaskRequest::new(move || async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        outcome
    })?
    .with_name(name)
    .with_accessory(Arc::new(LoggingAccessory::new(format!("[{}]", name))));
    Ok(Arc::new(request))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ctx = Arc::new(TokioContext::current()?);

    let batch = BatchRequest::with_config(
        vec![
            simulated("profile", 40, Ok(json!({"name": "ada"})))?,
            simulated("avatar", 80, Ok(json!({"url": "https://cdn.example.com/a.png"})))?,
            simulated("status", 20, Ok(json!({"posted": true})))?,
        ],
        BatchConfig::from_env().with_completion_context(ctx.clone()),
    )?;
    batch.add_accessory(Arc::new(LoggingAccessory::default()))?;
    match batch.run().await?.into_result() {
        Ok(done) => println!("all requests succeeded: {:?}", done.results()),
        Err(failure) => println!("{}", failure),
    }

    let batch = BatchRequest::with_config(
        vec![
            simulated("profile", 500, Ok(json!({"name": "ada"})))?,
            simulated("avatar", 30, Err(RequestError::status(413, "avatar too large")))?,
            simulated("status", 500, Ok(json!({"posted": true})))?,
        ],
        BatchConfig::new()
            .with_cancel_when_error_occur(true)
            .with_completion_context(ctx),
    )?;
    match batch.run().await?.into_result() {
        Ok(done) => println!("unexpected success: {:?}", done.results()),
        Err(failure) => {
            println!("batch failed at {}: {}", failure.request.name(), failure.error);
            tokio::time::sleep(Duration::from_millis(20)).await;
            println!("member states: {:?}", failure.batch.states());
        }
    }
    Ok(())
}
