//! Cancellation registry: job id → cancellation signal.
//!
//! One entry exists exactly while a worker owns the job, so the registry
//! doubles as the worker-liveness signal the orchestrator consults before
//! re-triggering execution. A single lock covers check, insert, and remove;
//! registration is an atomic check-and-insert, guaranteeing at most one
//! active worker per job id.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use annoq_core::CancelToken;

#[derive(Debug, Default)]
pub struct CancelRegistry {
    entries: Mutex<HashMap<Uuid, CancelToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, CancelToken>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a fresh token for a job id. Returns `None` when the id
    /// already has an active worker.
    pub fn try_register(&self, id: Uuid) -> Option<CancelToken> {
        let mut entries = self.lock();
        if entries.contains_key(&id) {
            return None;
        }
        let token = CancelToken::new();
        entries.insert(id, token.clone());
        Some(token)
    }

    /// Signal cancellation for a job id. Returns false when the id has no
    /// active worker. The signal is cooperative; the worker observes it at
    /// its next checkpoint.
    pub fn signal(&self, id: Uuid) -> bool {
        match self.lock().get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove a job's entry once its worker finishes.
    pub fn remove(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    /// Whether a worker currently owns this job id.
    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_signal() {
        let registry = CancelRegistry::new();
        let id = Uuid::new_v4();

        let token = registry.try_register(id).unwrap();
        assert!(registry.contains(id));
        assert!(!token.is_cancelled());

        assert!(registry.signal(id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = CancelRegistry::new();
        let id = Uuid::new_v4();

        assert!(registry.try_register(id).is_some());
        assert!(registry.try_register(id).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_signal_unknown_id() {
        let registry = CancelRegistry::new();
        assert!(!registry.signal(Uuid::new_v4()));
    }

    #[test]
    fn test_remove_frees_the_id() {
        let registry = CancelRegistry::new();
        let id = Uuid::new_v4();

        registry.try_register(id).unwrap();
        registry.remove(id);
        assert!(!registry.contains(id));
        assert!(registry.try_register(id).is_some());
    }
}
