//! Plugin-based component registry
//!
//! The registry allows resolvers, notifiers, and stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else
//! chains in the daemon.
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In the dnswatch-resolver-doh crate
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_resolver("doh", Box::new(DohFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::{NotifierConfig, ResolverConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsResolver, Notifier, Store};
use crate::traits::{NotifierFactory, ResolverFactory, StoreFactory};

/// Registry for plugin-based component creation
///
/// Maps component type names to factory objects, allowing dynamic
/// instantiation from configuration.
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    resolvers: RwLock<HashMap<String, Box<dyn ResolverFactory>>>,
    notifiers: RwLock<HashMap<String, Box<dyn NotifierFactory>>>,
    stores: RwLock<HashMap<String, std::sync::Arc<dyn StoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver factory
    pub fn register_resolver(&self, name: impl Into<String>, factory: Box<dyn ResolverFactory>) {
        self.resolvers.write().unwrap().insert(name.into(), factory);
    }

    /// Register a notifier factory
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        self.notifiers.write().unwrap().insert(name.into(), factory);
    }

    /// Register a store factory
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn StoreFactory>) {
        self.stores
            .write()
            .unwrap()
            .insert(name.into(), std::sync::Arc::from(factory));
    }

    /// Create a resolver from configuration
    pub fn create_resolver(&self, config: &ResolverConfig) -> Result<Box<dyn DnsResolver>> {
        let resolvers = self.resolvers.read().unwrap();
        let factory = resolvers
            .get(config.type_name())
            .ok_or_else(|| Error::config(format!("Unknown resolver type: {}", config.type_name())))?;
        factory.create(config)
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let notifiers = self.notifiers.read().unwrap();
        let factory = notifiers
            .get(config.type_name())
            .ok_or_else(|| Error::config(format!("Unknown notifier type: {}", config.type_name())))?;
        factory.create(config)
    }

    /// Create a store from configuration
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn Store>> {
        let store_type = match config {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        };

        let factory = {
            let stores = self.stores.read().unwrap();
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
                .clone()
            // Lock released here; factory creation may await I/O
        };

        let config_json = serde_json::to_value(config)?;
        factory.create(&config_json).await
    }

    /// Check if a resolver type is registered
    pub fn has_resolver(&self, name: &str) -> bool {
        self.resolvers.read().unwrap().contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        self.notifiers.read().unwrap().contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.read().unwrap().contains_key(name)
    }

    /// List all registered resolver types
    pub fn list_resolvers(&self) -> Vec<String> {
        self.resolvers.read().unwrap().keys().cloned().collect()
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        self.notifiers.read().unwrap().keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        self.stores.read().unwrap().keys().cloned().collect()
    }
}

/// Register the built-in store implementations
pub fn register_builtin_stores(registry: &ComponentRegistry) {
    registry.register_store("memory", Box::new(MemoryStoreFactory));
    registry.register_store("file", Box::new(FileStoreFactory));
}

struct MemoryStoreFactory;

#[async_trait::async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn Store>> {
        Ok(Box::new(crate::state::MemoryStore::new()))
    }
}

struct FileStoreFactory;

#[async_trait::async_trait]
impl StoreFactory for FileStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn Store>> {
        let path = config["path"]
            .as_str()
            .ok_or_else(|| Error::config("file store requires a path"))?;
        Ok(Box::new(crate::state::FileStore::new(path).await?))
    }
}
