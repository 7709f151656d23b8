//! Accessory hooks: lifecycle observers for requests and batches.
//!
//! Accessories are for instrumentation only. They are invoked synchronously
//! at each lifecycle point, and a panicking accessory is caught and logged
//! so it cannot disturb the batch that called it.

mod logging;
mod recording;

pub use logging::LoggingAccessory;
pub use recording::{AccessoryRecord, RecordingAccessory, TargetKind};

use crate::batch::BatchRequest;
use crate::request::Request;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessoryEvent {
    WillStart,
    DidStop,
}

impl fmt::Display for AccessoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessoryEvent::WillStart => f.write_str("will_start"),
            AccessoryEvent::DidStop => f.write_str("did_stop"),
        }
    }
}

/// What an accessory is being notified about.
#[derive(Clone, Copy)]
pub enum AccessoryTarget<'a> {
    Request(&'a dyn Request),
    Batch(&'a BatchRequest),
}

impl AccessoryTarget<'_> {
    pub fn kind(&self) -> TargetKind {
        match self {
            AccessoryTarget::Request(r) => TargetKind::Request(r.id()),
            AccessoryTarget::Batch(b) => TargetKind::Batch(b.id()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AccessoryTarget::Request(r) => r.name(),
            AccessoryTarget::Batch(_) => "batch",
        }
    }
}

impl fmt::Debug for AccessoryTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessoryTarget").field(&self.kind()).finish()
    }
}

pub trait Accessory: Send + Sync {
    fn will_start(&self, target: AccessoryTarget<'_>);
    fn did_stop(&self, target: AccessoryTarget<'_>);
}

/// Accessory backed by a closure receiving every event.
pub struct FnAccessory<F> {
    func: F,
}

impl<F> FnAccessory<F> {
    pub fn new(func: F) -> Self
    where
        F: for<'a> Fn(AccessoryEvent, AccessoryTarget<'a>) + Send + Sync,
    {
        Self { func }
    }
}

impl<F> Accessory for FnAccessory<F>
where
    F: for<'a> Fn(AccessoryEvent, AccessoryTarget<'a>) + Send + Sync,
{
    fn will_start(&self, target: AccessoryTarget<'_>) {
        (self.func)(AccessoryEvent::WillStart, target)
    }
    fn did_stop(&self, target: AccessoryTarget<'_>) {
        (self.func)(AccessoryEvent::DidStop, target)
    }
}

/// Invoke `event` on every accessory, isolating panics.
pub(crate) fn notify_all(
    accessories: &[Arc<dyn Accessory>],
    event: AccessoryEvent,
    target: AccessoryTarget<'_>,
) {
    for accessory in accessories {
        let call = AssertUnwindSafe(|| match event {
            AccessoryEvent::WillStart => accessory.will_start(target),
            AccessoryEvent::DidStop => accessory.did_stop(target),
        });
        if catch_unwind(call).is_err() {
            tracing::warn!(
                event = %event,
                target = ?target.kind(),
                "accessory panicked; ignoring"
            );
        }
    }
}
