use super::{Accessory, AccessoryTarget};
use tracing::{debug, info};

/// Emits lifecycle events through `tracing`.
///
/// Request events are logged at debug level, batch events at info.
#[derive(Debug, Clone)]
pub struct LoggingAccessory {
    prefix: String,
}

impl LoggingAccessory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for LoggingAccessory {
    fn default() -> Self {
        Self::new("[Batch]")
    }
}

impl Accessory for LoggingAccessory {
    fn will_start(&self, target: AccessoryTarget<'_>) {
        match target {
            AccessoryTarget::Request(r) => {
                debug!(prefix = %self.prefix, request_id = %r.id(), name = r.name(), "request will start")
            }
            AccessoryTarget::Batch(b) => {
                info!(prefix = %self.prefix, batch_id = %b.id(), requests = b.len(), "batch will start")
            }
        }
    }

    fn did_stop(&self, target: AccessoryTarget<'_>) {
        match target {
            AccessoryTarget::Request(r) => {
                debug!(prefix = %self.prefix, request_id = %r.id(), name = r.name(), "request did stop")
            }
            AccessoryTarget::Batch(b) => info!(
                prefix = %self.prefix,
                batch_id = %b.id(),
                finished = b.finished_count(),
                failed = b.failed_error().is_some(),
                "batch did stop"
            ),
        }
    }
}
