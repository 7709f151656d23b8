//! Batch registry: keeps in-flight batches alive.

use super::{BatchId, BatchRequest};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Strong references to every batch that has started and not yet finished.
///
/// A caller may drop its own handle right after `start`; the entry here is
/// what keeps the batch around until its callback is delivered.
pub struct BatchRegistry {
    batches: RwLock<HashMap<BatchId, BatchRequest>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn shared() -> Arc<Self> {
        SHARED_REGISTRY.clone()
    }

    pub fn add(&self, batch: BatchRequest) -> Result<()> {
        let mut batches = self.batches.write().unwrap_or_else(PoisonError::into_inner);
        match batches.entry(batch.id()) {
            Entry::Occupied(_) => {
                tracing::error!(batch_id = %batch.id(), "batch registered twice");
                Err(Error::DuplicateRegistration { batch: batch.id() })
            }
            Entry::Vacant(slot) => {
                slot.insert(batch);
                Ok(())
            }
        }
    }

    /// Stop retaining `batch`. Returns whether it was present.
    pub fn remove(&self, batch: &BatchRequest) -> bool {
        self.remove_id(batch.id()).is_some()
    }

    pub fn remove_id(&self, id: BatchId) -> Option<BatchRequest> {
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn get(&self, id: BatchId) -> Option<BatchRequest> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn contains(&self, id: BatchId) -> bool {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn ids(&self) -> Vec<BatchId> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_REGISTRY: Lazy<Arc<BatchRegistry>> = Lazy::new(|| Arc::new(BatchRegistry::new()));

pub fn get_batch_registry() -> Arc<BatchRegistry> {
    BatchRegistry::shared()
}
