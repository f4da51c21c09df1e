// # Memory Store
//
// In-memory implementation of Store.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for containerized deployments where losing
// monitoring state on restart only costs one silent first-seen pass.
//
// ## Expiry
//
// Expiry is lazy: an expired entry reads as absent and is purged the
// next time its key is touched. `list_keys` skips expired entries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::traits::store::Store;
use crate::Error;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory store implementation
///
/// All state lives in a HashMap protected by an async RwLock. No
/// persistence across restarts.
///
/// # Example
///
/// ```rust,no_run
/// use dnswatch_core::state::MemoryStore;
/// use dnswatch_core::traits::Store;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     store.put("dns:example.com:ips", "1.2.3.4").await?;
///     assert_eq!(
///         store.get("dns:example.com:ips").await?.as_deref(),
///         Some("1.2.3.4")
///     );
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of live entries in the store
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let guard = self.inner.read().await;
        guard.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Check if the store has no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clear all entries from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Utc::now();
        {
            let guard = self.inner.read().await;
            match guard.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Purge the expired entry
        self.inner.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Utc::now() + Duration::seconds(ttl_secs as i64)),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let now = Utc::now();
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        assert!(store.is_empty().await);

        store.put("dns:example.com:state", "resolved").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get("dns:example.com:state").await.unwrap().as_deref(),
            Some("resolved")
        );

        store.delete("dns:example.com:state").await.unwrap();
        assert_eq!(store.get("dns:example.com:state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_ttl_zero_expires_immediately() {
        let store = MemoryStore::new();

        store
            .put_with_ttl("global:dns_changes:1", "[]", 0)
            .await
            .unwrap();
        assert_eq!(store.get("global:dns_changes:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_ttl_live_entry_visible() {
        let store = MemoryStore::new();

        store
            .put_with_ttl("global:dns_changes:2", "[]", 3600)
            .await
            .unwrap();
        assert_eq!(
            store.get("global:dns_changes:2").await.unwrap().as_deref(),
            Some("[]")
        );
    }

    #[tokio::test]
    async fn test_memory_store_list_keys_by_prefix() {
        let store = MemoryStore::new();

        store.put("dns:a.example.com:ips", "1.1.1.1").await.unwrap();
        store.put("dns:b.example.com:ips", "2.2.2.2").await.unwrap();
        store.put("notify:a.example.com:last", "0").await.unwrap();

        let mut keys = store.list_keys("dns:").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["dns:a.example.com:ips", "dns:b.example.com:ips"]
        );
    }
}
