use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Maps a caller-supplied `context_id` to the `CancellationToken` for its
/// in-flight execution, so a later request on the same tenant can cancel
/// it. Entries are tenant-scoped by key (`tenant_id:context_id`) so one
/// tenant can never cancel another's execution by guessing a context id.
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh token under `key`, replacing any stale entry left
    /// behind by a previous execution that reused the same context id.
    pub fn register(&self, key: String) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens
            .lock()
            .expect("cancellation table lock poisoned")
            .insert(key, token.clone());
        token
    }

    /// Drop the entry once an execution finishes, win or lose, so the
    /// table doesn't grow unbounded.
    pub fn remove(&self, key: &str) {
        self.tokens
            .lock()
            .expect("cancellation table lock poisoned")
            .remove(key);
    }

    /// Cancel the execution registered under `key`. Returns `false` if no
    /// such execution is in flight.
    pub fn cancel(&self, key: &str) -> bool {
        match self
            .tokens
            .lock()
            .expect("cancellation table lock poisoned")
            .get(key)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn scoped_key(tenant_id: impl std::fmt::Display, context_id: &str) -> String {
    format!("{tenant_id}:{context_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_returns_false_for_unknown_key() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn cancel_triggers_the_registered_token() {
        let registry = CancellationRegistry::new();
        let token = registry.register("k".to_string());
        assert!(registry.cancel("k"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn remove_forgets_the_entry() {
        let registry = CancellationRegistry::new();
        registry.register("k".to_string());
        registry.remove("k");
        assert!(!registry.cancel("k"));
    }
}
