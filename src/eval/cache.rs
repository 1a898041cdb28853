use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Session-lifetime memo of human approve/deny answers.
///
/// Keys are `base:joined args` (see [`CommandContext::cache_key`]).
/// Entries never expire; the cache is dropped with the session that owns
/// it. Share one instance between evaluators with `Arc`.
///
/// [`CommandContext::cache_key`]: crate::eval::CommandContext::cache_key
#[derive(Debug, Default)]
pub struct ApprovalCache {
    entries: Mutex<HashMap<String, bool>>,
}

impl ApprovalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior answer for `key`: `Some(true)` approved, `Some(false)` denied.
    pub fn lookup(&self, key: &str) -> Option<bool> {
        self.lock().get(key).copied()
    }

    /// Record an answer, replacing any earlier one for the same key.
    pub fn record(&self, key: impl Into<String>, approved: bool) {
        self.lock().insert(key.into(), approved);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the map half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, bool>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
