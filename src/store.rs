//! In-memory lock store hosted by the leader process.
//!
//! The store maps caller-chosen lock keys to opaque state tokens. Tokens are
//! never interpreted here; their meaning belongs to the lock protocols built
//! on top (see the `lock` module). An absent key is indistinguishable from a
//! key holding the empty string.
//!
//! Both operations take the single store mutex, so compare-and-swap is
//! linearizable across every connection the server handles. Call volume and
//! key cardinality are small; correctness, not throughput, is the goal here.

use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded map of lock key to state token.
///
/// Lives exactly as long as the leader process. Nothing is persisted and
/// nothing is ever deleted; leader exit is a full implicit reset of every
/// lock on the host.
#[derive(Debug, Default)]
pub struct LockStore {
    locks: Mutex<HashMap<String, String>>,
}

impl LockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current token for `key`, or the empty string if unset.
    pub fn get(&self, key: &str) -> String {
        let locks = self.locks.lock().unwrap_or_else(|poison| poison.into_inner());
        locks.get(key).cloned().unwrap_or_default()
    }

    /// Atomically replace the token for `key` with `new` if the current token
    /// equals `old`, and report whether the replacement happened.
    ///
    /// An unset key compares equal to the empty string. A non-matching `old`
    /// is a normal `false`, not an error.
    pub fn compare_and_swap(&self, key: &str, old: &str, new: &str) -> bool {
        let mut locks = self.locks.lock().unwrap_or_else(|poison| poison.into_inner());
        let current = locks.get(key).map(String::as_str).unwrap_or("");
        if current == old {
            locks.insert(key.to_string(), new.to_string());
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_unset_key_returns_empty_string() {
        let store = LockStore::new();
        assert_eq!(store.get("missing"), "");
    }

    #[test]
    fn cas_on_unset_key_matches_empty_string() {
        let store = LockStore::new();
        assert!(store.compare_and_swap("k", "", "1"));
        assert_eq!(store.get("k"), "1");
    }

    #[test]
    fn cas_mismatch_is_a_noop() {
        let store = LockStore::new();
        assert!(store.compare_and_swap("k", "", "1"));
        assert!(!store.compare_and_swap("k", "wrong", "2"));
        assert_eq!(store.get("k"), "1");
    }

    #[test]
    fn cas_to_empty_string_reads_back_as_unset() {
        let store = LockStore::new();
        assert!(store.compare_and_swap("k", "", "1"));
        assert!(store.compare_and_swap("k", "1", ""));
        assert_eq!(store.get("k"), "");
        // The empty value behaves exactly like a never-written key.
        assert!(store.compare_and_swap("k", "", "again"));
    }

    #[test]
    fn keys_are_independent() {
        let store = LockStore::new();
        assert!(store.compare_and_swap("a", "", "1"));
        assert_eq!(store.get("b"), "");
        assert!(store.compare_and_swap("b", "", "2"));
        assert_eq!(store.get("a"), "1");
        assert_eq!(store.get("b"), "2");
    }

    #[test]
    fn build_lock_scenario() {
        // Concrete walkthrough: empty store, two successful swaps, then a
        // stale-old swap that must leave the store untouched.
        let store = LockStore::new();
        assert!(store.compare_and_swap("build-lock", "", "1"));
        assert_eq!(store.get("build-lock"), "1");
        assert!(store.compare_and_swap("build-lock", "1", "2"));
        assert_eq!(store.get("build-lock"), "2");
        assert!(!store.compare_and_swap("build-lock", "1", "3"));
        assert_eq!(store.get("build-lock"), "2");
    }

    #[test]
    fn concurrent_cas_has_exactly_one_winner() {
        let store = Arc::new(LockStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.compare_and_swap("race", "", &format!("winner-{i}")))
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();

        assert_eq!(wins, 1, "exactly one CAS sharing the same old must win");
        assert!(store.get("race").starts_with("winner-"));
    }
}
