//! The key/value store behind sessions and state snapshots.
//!
//! The [`Store`] trait is the seam between the session layer and its
//! persistence: the manager and the state broadcaster only ever talk to
//! this interface. [`MemoryStore`] is the in-process implementation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Errors surfaced by a [`Store`] backend.
///
/// `MemoryStore` never fails, but the trait has to admit backends that
/// can (network caches, disk).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or returned a failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// An async key/value store with per-key expiry.
///
/// Values are strings; structured data goes through serde_json before it
/// lands here, so the store stays oblivious to what it holds. `Clone` is
/// required because every task that touches sessions carries its own
/// handle. The methods are declared as `impl Future + Send` rather than
/// bare `async fn` so futures generic over a `Store` can cross
/// `tokio::spawn`; implementations still just write `async fn`.
pub trait Store: Clone + Send + Sync + 'static {
    /// Writes a value. A `ttl` of `None` means the key never expires.
    fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads a value. Expired keys read as absent.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Removes a key. Removing an absent key is not an error.
    fn delete(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Resets a key's TTL without rewriting its value. No-op if the key
    /// is absent.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct Entry {
    value: String,
    /// `None` means the entry never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// An in-process [`Store`].
///
/// Expiry is lazy: stale entries are dropped when read or overwritten,
/// which is enough for session-sized data. Cloning shares the same
/// underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.lock().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            if entry.is_expired(Instant::now()) {
                entries.remove(key);
            } else {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
