// # Store Trait
//
// Defines the interface for durable key/value persistence.
//
// ## Purpose
//
// The store holds every piece of monitoring state: per-domain DNS state,
// notification tracking, oscillation history, the global change bucket,
// and the dynamic domain list. Keys are plain strings; values are plain
// strings (JSON where structured). Some keys carry an expiry.
//
// ## Implementations
//
// - Memory: HashMap behind an async RwLock (testing, containers)
// - File: dual-slot checksummed snapshots with torn-write recovery
//
// ## Consistency
//
// All repo operations over this trait are read-modify-write sequences
// with last-writer-wins semantics; no transactions are assumed. The
// scheduler guarantees a single writer per domain per tick.

use async_trait::async_trait;

/// Trait for store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the value for a key
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The stored value
    /// - `Ok(None)`: No value, or the value has expired
    /// - `Err(Error)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Set the value for a key with no expiry
    async fn put(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// Set the value for a key, expiring after `ttl_secs` seconds
    ///
    /// An expired key reads as absent.
    async fn put_with_ttl(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<(), crate::Error>;

    /// Delete a key
    ///
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), crate::Error>;

    /// List all live (non-expired) keys with the given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing stores from configuration
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Create a Store instance from configuration
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn Store>, crate::Error>;
}
