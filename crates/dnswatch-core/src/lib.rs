// # dnswatch-core
//
// Core library for the DNS change monitoring system.
//
// ## Architecture Overview
//
// This library watches a dynamic set of domains for DNS changes and
// decides which changes are worth telling a human about:
// - **DnsResolver**: Trait for querying a domain's current DNS state
// - **Notifier**: Trait for delivering notifications to a chat channel
// - **Store**: Trait for durable key/value persistence
// - **DomainStateRepo**: Typed keyspace over the store
// - **analysis**: The change analyzer (CDN, load-balancer, temporal,
//   coordination, dampening)
// - **Observer**: Per-domain tick (resolve, diff, analyze, persist, emit)
// - **Scheduler**: Periodic bounded fan-out over all monitored domains
// - **Commands**: The surface the external chat module calls into
// - **ComponentRegistry**: Plugin-based registry for implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Analysis is pure; I/O lives at the seams
// 2. **Explainable Scoring**: Pattern scoring is hand-tuned and
//    deterministic, never a learned model
// 3. **Fail Open on Dampening**: When the suppression machinery errors,
//    notify rather than drop
// 4. **Library-First**: The daemon is a thin wrapper; everything here is
//    usable as a library

pub mod analysis;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod observer;
pub mod registry;
pub mod repo;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use commands::Commands;
pub use config::{EngineConfig, MonitorConfig, NotifierConfig, ResolverConfig, StoreConfig};
pub use error::{Error, Result};
pub use observer::{Observer, TickOutcome};
pub use registry::ComponentRegistry;
pub use repo::DomainStateRepo;
pub use scheduler::Scheduler;
pub use state::{FileStore, MemoryStore};
pub use traits::{DnsResolver, Notification, Notifier, Store};
