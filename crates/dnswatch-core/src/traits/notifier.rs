// # Notifier Trait
//
// Defines the interface for delivering notifications to the chat channel.
//
// The core builds a structured `Notification` and hands it to the
// notifier; transport and rendering (webhook payloads, embed markup)
// are entirely the implementation's concern. The core never constructs
// transport payloads itself.
//
// ## Implementations
//
// - Webhook: `dnswatch-notify-webhook` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The family a notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An analyzed DNS change that passed the dampening decision
    Change,
    /// Rapid-change notice; further notifications are muted for 4 hours
    AutoSuppression,
    /// SOA serial moved without an IP change
    ZoneUpdated,
    /// Authority for the zone became unreachable
    AuthorityUnreachable,
    /// A monitoring-side failure (resolver transport error)
    ErrorMonitoring,
    /// The monitor restarted under a new deployment id
    NewDeployment,
}

/// Severity color for the rendered message
///
/// The exact encoding (hex value, emoji) is the notifier's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityColor {
    Red,
    Orange,
    Yellow,
    Blue,
    Gray,
}

/// One named field in a notification body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    /// Field label, e.g. "Previous IPs"
    pub name: String,
    /// Rendered value
    pub value: String,
}

/// A structured message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Which builder path produced this message
    pub kind: NotificationKind,
    /// Headline, e.g. "Critical DNS Change Detected"
    pub title: String,
    /// The domain the message concerns
    pub domain: String,
    /// Severity color for rendering
    pub color: SeverityColor,
    /// Ordered body fields
    pub fields: Vec<NotificationField>,
    /// Recommended operator actions
    pub actions: Vec<String>,
}

impl Notification {
    /// Look up a field value by name (test convenience)
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Trait for notifier implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// Notifiers are single-shot: one `emit` call delivers one notification.
/// The observer never retries a failed emit within a tick; the dampening
/// timestamp has already been advanced, so a failure costs one message,
/// never a retry storm.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Accepted by the transport
    /// - `Err(Error)`: Delivery failed (not retried this tick)
    async fn emit(&self, notification: &Notification) -> Result<(), crate::Error>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
