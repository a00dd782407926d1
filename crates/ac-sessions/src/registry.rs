//! Learner registry: enforces "at most one active `SessionRecord` per
//! `learner_id`" and the pipeline's `max_concurrent_learners` cap.
//!
//! Adapted from the gateway's `SessionLockMap` (one `Semaphore(1)` per
//! session key). Here a second, global semaphore bounds how many learners
//! may be active at once, and acquisition is non-blocking — a learner that
//! can't get a slot is told `Busy` immediately rather than queued, since
//! the pipeline's back-pressure contract (spec §4.6) rejects rather than
//! queues new connections once at capacity.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct LearnerRegistry {
    capacity: Arc<Semaphore>,
    per_learner: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl LearnerRegistry {
    pub fn new(max_concurrent_learners: usize) -> Self {
        Self {
            capacity: Arc::new(Semaphore::new(max_concurrent_learners)),
            per_learner: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to admit `learner_id`. Fails immediately with [`RegistryBusy`]
    /// if the pipeline is at capacity or the learner already has an active
    /// session.
    pub fn try_acquire(&self, learner_id: &str) -> Result<LearnerHandle, RegistryBusy> {
        let capacity_permit = self
            .capacity
            .clone()
            .try_acquire_owned()
            .map_err(|_| RegistryBusy::AtCapacity)?;

        let sem = {
            let mut map = self.per_learner.lock();
            map.entry(learner_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        let learner_permit = sem
            .try_acquire_owned()
            .map_err(|_| RegistryBusy::LearnerAlreadyActive)?;

        Ok(LearnerHandle {
            learner_id: learner_id.to_owned(),
            _capacity_permit: capacity_permit,
            _learner_permit: learner_permit,
        })
    }

    /// Number of learners currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.per_learner
            .lock()
            .values()
            .filter(|sem| sem.available_permits() == 0)
            .count()
    }

    /// Drop tracking entries for learners with no active handle (cleanup).
    pub fn prune_idle(&self) {
        let mut map = self.per_learner.lock();
        map.retain(|_, sem| sem.available_permits() == 0);
    }
}

/// Held for the lifetime of one active session. Dropping it frees both the
/// per-learner slot and the global capacity slot.
pub struct LearnerHandle {
    pub learner_id: String,
    _capacity_permit: OwnedSemaphorePermit,
    _learner_permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryBusy {
    AtCapacity,
    LearnerAlreadyActive,
}

impl std::fmt::Display for RegistryBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryBusy::AtCapacity => write!(f, "pipeline is at max_concurrent_learners capacity"),
            RegistryBusy::LearnerAlreadyActive => write!(f, "learner already has an active session"),
        }
    }
}

impl std::error::Error for RegistryBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_learners_both_admitted() {
        let registry = LearnerRegistry::new(2);
        let h1 = registry.try_acquire("l1").unwrap();
        let h2 = registry.try_acquire("l2").unwrap();
        assert_eq!(h1.learner_id, "l1");
        assert_eq!(h2.learner_id, "l2");
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn same_learner_rejected_while_active() {
        let registry = LearnerRegistry::new(4);
        let _h1 = registry.try_acquire("l1").unwrap();
        let err = registry.try_acquire("l1").unwrap_err();
        assert_eq!(err, RegistryBusy::LearnerAlreadyActive);
    }

    #[test]
    fn capacity_cap_enforced() {
        let registry = LearnerRegistry::new(1);
        let _h1 = registry.try_acquire("l1").unwrap();
        let err = registry.try_acquire("l2").unwrap_err();
        assert_eq!(err, RegistryBusy::AtCapacity);
    }

    #[test]
    fn slot_freed_on_drop() {
        let registry = LearnerRegistry::new(1);
        {
            let _h1 = registry.try_acquire("l1").unwrap();
        }
        let h2 = registry.try_acquire("l2").unwrap();
        assert_eq!(h2.learner_id, "l2");
    }

    #[test]
    fn prune_idle_drops_released_entries() {
        let registry = LearnerRegistry::new(4);
        {
            let _h1 = registry.try_acquire("l1").unwrap();
        }
        registry.prune_idle();
        assert_eq!(registry.active_count(), 0);
    }
}
