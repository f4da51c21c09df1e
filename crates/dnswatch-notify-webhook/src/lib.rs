// # Webhook Notifier
//
// Delivers notifications to a chat channel webhook as embed payloads.
//
// ## Constraints
//
// - Makes one HTTP request per notification
// - Full error propagation to the observer (which never retries within
//   a tick; the dampening timestamp has already advanced)
// - NO retry logic, NO queuing, NO background tasks
// - The webhook URL is a secret: it never appears in logs or Debug
//   output
//
// ## Payload
//
// ```json
// {
//   "username": "dnswatch",
//   "embeds": [{
//     "title": "...",
//     "description": "domain",
//     "color": 15158332,
//     "fields": [{"name": "...", "value": "...", "inline": false}]
//   }]
// }
// ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use dnswatch_core::config::NotifierConfig;
use dnswatch_core::traits::{Notification, Notifier, NotifierFactory, SeverityColor};
use dnswatch_core::{Error, Result};

/// Default HTTP timeout for webhook requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Embed color encoding per severity
fn color_code(color: SeverityColor) -> u32 {
    match color {
        SeverityColor::Red => 0xE7_4C3C,
        SeverityColor::Orange => 0xE6_7E22,
        SeverityColor::Yellow => 0xF1_C40F,
        SeverityColor::Blue => 0x34_98DB,
        SeverityColor::Gray => 0x95_A5A6,
    }
}

/// Render a notification as the webhook embed payload
fn render(notification: &Notification) -> Value {
    let mut fields: Vec<Value> = notification
        .fields
        .iter()
        .map(|f| json!({"name": f.name, "value": f.value, "inline": false}))
        .collect();

    if !notification.actions.is_empty() {
        fields.push(json!({
            "name": "Recommended Actions",
            "value": notification
                .actions
                .iter()
                .map(|a| format!("- {}", a))
                .collect::<Vec<_>>()
                .join("\n"),
            "inline": false,
        }));
    }

    json!({
        "username": "dnswatch",
        "embeds": [{
            "title": notification.title,
            "description": notification.domain,
            "color": color_code(notification.color),
            "fields": fields,
        }],
    })
}

/// Webhook notifier
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the URL,
/// which embeds the webhook token.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &"<REDACTED>")
            .finish()
    }
}

impl WebhookNotifier {
    /// Create a notifier with the default deadline
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a notifier with an explicit request deadline
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit(&self, notification: &Notification) -> Result<()> {
        let payload = render(notification);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notifier(format!("webhook request failed: {}", e)))?;

        if response.status().is_success() {
            tracing::debug!(title = %notification.title, "webhook delivered");
            return Ok(());
        }

        let status = response.status();
        Err(match status.as_u16() {
            401 | 403 => Error::notifier(format!(
                "webhook authentication failed (status {}); check the webhook URL",
                status
            )),
            404 => Error::notifier("webhook not found; it may have been deleted".to_string()),
            429 => Error::notifier(format!("webhook rate limited (status {})", status)),
            500..=599 => Error::notifier(format!("webhook server error (transient): {}", status)),
            _ => Error::notifier(format!("webhook rejected notification: {}", status)),
        })
    }

    fn notifier_name(&self) -> &'static str {
        "webhook"
    }
}

/// Factory for creating webhook notifiers
pub struct WebhookFactory;

impl NotifierFactory for WebhookFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Webhook { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(Error::config("webhook URL is required"));
                }
                Ok(Box::new(WebhookNotifier::with_timeout(
                    url.clone(),
                    Duration::from_secs(*timeout_secs),
                )))
            }
            _ => Err(Error::config("Invalid config for webhook notifier")),
        }
    }
}

/// Register the webhook notifier with a registry
pub fn register(registry: &dnswatch_core::ComponentRegistry) {
    registry.register_notifier("webhook", Box::new(WebhookFactory));
}
