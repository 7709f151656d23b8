//! In-memory accessory for tests.

use super::{Accessory, AccessoryEvent, AccessoryTarget};
use crate::batch::BatchId;
use crate::request::RequestId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Request(RequestId),
    Batch(BatchId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryRecord {
    pub event: AccessoryEvent,
    pub target: TargetKind,
}

/// Records every notification in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingAccessory {
    records: Arc<RwLock<Vec<AccessoryRecord>>>,
}

impl RecordingAccessory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AccessoryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, event: AccessoryEvent) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Requests that received `event`, in arrival order.
    pub fn requests_with(&self, event: AccessoryEvent) -> Vec<RequestId> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.event == event)
            .filter_map(|r| match r.target {
                TargetKind::Request(id) => Some(id),
                TargetKind::Batch(_) => None,
            })
            .collect()
    }

    pub fn batch_events(&self) -> Vec<AccessoryEvent> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| matches!(r.target, TargetKind::Batch(_)))
            .map(|r| r.event)
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: AccessoryEvent, target: AccessoryTarget<'_>) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AccessoryRecord {
                event,
                target: target.kind(),
            });
    }
}

impl Accessory for RecordingAccessory {
    fn will_start(&self, target: AccessoryTarget<'_>) {
        self.push(AccessoryEvent::WillStart, target);
    }

    fn did_stop(&self, target: AccessoryTarget<'_>) {
        self.push(AccessoryEvent::DidStop, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ManualRequest, Request};

    #[test]
    fn test_records_in_order() {
        let recorder = RecordingAccessory::new();
        let r1 = ManualRequest::new("r1");
        let r2 = ManualRequest::new("r2");
        recorder.will_start(AccessoryTarget::Request(&r1));
        recorder.will_start(AccessoryTarget::Request(&r2));
        recorder.did_stop(AccessoryTarget::Request(&r2));

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.count(AccessoryEvent::WillStart), 2);
        assert_eq!(
            recorder.requests_with(AccessoryEvent::DidStop),
            vec![r2.id()]
        );
        assert!(recorder.batch_events().is_empty());

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_clones_share_records() {
        let recorder = RecordingAccessory::new();
        let clone = recorder.clone();
        let r1 = ManualRequest::new("r1");
        clone.did_stop(AccessoryTarget::Request(&r1));
        assert_eq!(recorder.len(), 1);
    }
}
