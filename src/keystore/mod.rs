//! API credential pool with round-robin rotation
//!
//! The provider enforces a per-key daily quota. When the active key is
//! exhausted the ingestion pipeline rotates to the next key in the pool
//! and the following cycle uses it.
//!
//! # Example
//!
//! ```
//! use yt_indexer::keystore::{InMemoryKeyStore, KeyStore};
//!
//! let store = InMemoryKeyStore::new(vec!["a".into(), "b".into()]).unwrap();
//! assert_eq!(store.get(), "a");
//! store.rotate();
//! assert_eq!(store.get(), "b");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Opaque API credential
pub type Key = String;

/// Errors raised while building a key store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// No keys were configured
    #[error("empty keystore, unable to find any keys")]
    EmptyPool,
}

/// Issues the active credential and rotates away from exhausted ones
pub trait KeyStore: Send + Sync {
    /// Advance to the next key, wrapping around at the end of the pool
    fn rotate(&self);

    /// Credential at the current cursor
    fn get(&self) -> Key;
}

/// Fixed, in-memory key pool
///
/// The cursor is a single atomic so `get` and `rotate` may be called from
/// any task. Rotation is expected from one task at a time; two concurrent
/// rotations both advance the cursor.
#[derive(Debug)]
pub struct InMemoryKeyStore {
    keys: Vec<Key>,
    cursor: AtomicUsize,
}

impl InMemoryKeyStore {
    /// Create a store from the configured keys
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::EmptyPool`] if `keys` is empty.
    pub fn new(keys: Vec<Key>) -> Result<Self, KeyStoreError> {
        if keys.is_empty() {
            return Err(KeyStoreError::EmptyPool);
        }

        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of keys in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; construction rejects empty pools
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Position of the active key
    pub fn current_index(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl KeyStore for InMemoryKeyStore {
    fn rotate(&self) {
        let len = self.keys.len();
        // fetch_update never fails with a closure that always returns Some
        let _ = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len));
    }

    fn get(&self) -> Key {
        self.keys[self.current_index()].clone()
    }
}

/// Short, log-safe fingerprint of a credential
pub fn redact(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(len - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store(keys: &[&str]) -> InMemoryKeyStore {
        InMemoryKeyStore::new(keys.iter().map(|k| k.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_rotation_sequence() {
        let store = store(&["1", "2", "3"]);

        // (expected key, rotate afterwards)
        let steps = [
            ("1", false),
            ("1", true),
            ("2", true),
            ("3", true),
            ("1", false),
        ];

        for (expected, rotate_next) in steps {
            assert_eq!(store.get(), expected);
            if rotate_next {
                store.rotate();
            }
        }
    }

    #[test]
    fn test_empty_pool_rejected() {
        let result = InMemoryKeyStore::new(Vec::new());
        assert_eq!(result.unwrap_err(), KeyStoreError::EmptyPool);
    }

    #[test]
    fn test_single_key_pool_rotates_to_itself() {
        let store = store(&["only"]);
        store.rotate();
        store.rotate();
        assert_eq!(store.get(), "only");
        assert_eq!(store.current_index(), 0);
    }

    #[test]
    fn test_len() {
        let store = store(&["a", "b"]);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("AIzaSyExampleKey1234"), "****1234");
        assert_eq!(redact("abc"), "****");
    }

    proptest! {
        #[test]
        fn prop_full_cycle_returns_to_start(n in 1usize..32, start in 0usize..32) {
            let keys: Vec<Key> = (0..n).map(|i| format!("key-{i}")).collect();
            let store = InMemoryKeyStore::new(keys).unwrap();
            for _ in 0..(start % n) {
                store.rotate();
            }
            let before = store.get();
            for _ in 0..n {
                store.rotate();
            }
            prop_assert_eq!(store.get(), before);
            prop_assert!(store.current_index() < n);
        }
    }
}
