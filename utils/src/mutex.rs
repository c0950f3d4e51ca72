//! Async mutual exclusion over sets of string keys.
//!
//! A task acquires every key it names or none of them. Two holders never
//! share a key; holders of disjoint key sets run concurrently. Keys are
//! released when the returned guard is dropped, on every exit path.

use std::collections::{BTreeSet, HashSet};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    held: Mutex<HashSet<String>>,
    released: Notify,
}

impl Inner {
    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is only mutated under short, non-panicking critical sections.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lock table keyed by strings, shared by cloning.
#[derive(Clone, Default)]
pub struct KeyedMutex {
    inner: Arc<Inner>,
}

/// Holds a set of keys until dropped.
#[must_use = "keys are released as soon as the guard is dropped"]
pub struct KeyedGuard {
    inner: Arc<Inner>,
    keys: BTreeSet<String>,
}

impl KeyedGuard {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until every key in `keys` is free, then take them all at once.
    pub async fn lock<I, K>(&self, keys: I) -> KeyedGuard
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        loop {
            let mut notified = pin!(self.inner.released.notified());
            notified.as_mut().enable();
            if let Some(guard) = self.try_acquire(&keys) {
                return guard;
            }
            tracing::trace!(?keys, "waiting for keyed lock");
            notified.await;
        }
    }

    /// Take every key in `keys` if none is held, without waiting.
    pub fn try_lock<I, K>(&self, keys: I) -> Option<KeyedGuard>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        self.try_acquire(&keys)
    }

    /// Whether `key` is currently held by anyone.
    pub fn is_locked(&self, key: &str) -> bool {
        self.inner.held().contains(key)
    }

    fn try_acquire(&self, keys: &BTreeSet<String>) -> Option<KeyedGuard> {
        let mut held = self.inner.held();
        if keys.iter().any(|k| held.contains(k)) {
            return None;
        }
        held.extend(keys.iter().cloned());
        Some(KeyedGuard {
            inner: Arc::clone(&self.inner),
            keys: keys.clone(),
        })
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        {
            let mut held = self.inner.held();
            for key in &self.keys {
                held.remove(key);
            }
        }
        self.inner.released.notify_waiters();
    }
}
