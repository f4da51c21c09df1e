//! Trait seams for the DNS monitoring system
//!
//! Three pluggable boundaries, mirroring the component model:
//! - `DnsResolver`: answers "what does this FQDN resolve to right now"
//! - `Notifier`: delivers a built notification to the chat channel
//! - `Store`: durable key/value persistence with optional expiry

pub mod notifier;
pub mod resolver;
pub mod store;

pub use notifier::{Notification, NotificationField, NotificationKind, Notifier, NotifierFactory, SeverityColor};
pub use resolver::{ARecord, DnsResolver, ResolveResult, ResolverFactory, SoaRecord};
pub use store::{Store, StoreFactory};
