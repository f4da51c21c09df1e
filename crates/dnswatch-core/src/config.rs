//! Configuration types for the DNS monitoring system
//!
//! This module defines all configuration structures used throughout the
//! crate. The daemon builds these from environment variables; embedders
//! construct them directly.

use serde::{Deserialize, Serialize};

use crate::domain::canonicalize_domain;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Resolver configuration
    pub resolver: ResolverConfig,

    /// Notifier configuration
    pub notifier: NotifierConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Boot-time (static) domains to monitor
    pub static_domains: Vec<String>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MonitorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for domain in &self.static_domains {
            canonicalize_domain(domain)?;
        }
        self.resolver.validate()?;
        self.notifier.validate()?;
        if self.engine.check_interval_secs == 0 {
            return Err(crate::Error::config("check interval must be > 0"));
        }
        Ok(())
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// DNS-over-HTTPS against a recursive resolver
    Doh {
        /// Endpoint base, e.g. "https://1.1.1.1/dns-query"
        endpoint: String,
        /// Request deadline in seconds
        #[serde(default = "default_resolve_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom resolver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ResolverConfig::Doh { endpoint, timeout_secs } => {
                if !endpoint.starts_with("https://") {
                    return Err(crate::Error::config("DoH endpoint must use HTTPS"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("resolver timeout must be > 0"));
                }
                Ok(())
            }
            ResolverConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("custom resolver factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom resolver config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the resolver type name
    pub fn type_name(&self) -> &str {
        match self {
            ResolverConfig::Doh { .. } => "doh",
            ResolverConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig::Doh {
            endpoint: "https://1.1.1.1/dns-query".to_string(),
            timeout_secs: default_resolve_timeout_secs(),
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Webhook delivery
    Webhook {
        /// Webhook URL (treated as a secret; never logged)
        url: String,
        /// Request deadline in seconds
        #[serde(default = "default_notify_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Webhook { url, .. } => {
                if url.is_empty() {
                    return Err(crate::Error::config("webhook URL cannot be empty"));
                }
                if !url.starts_with("https://") {
                    return Err(crate::Error::config("webhook URL must use HTTPS"));
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("custom notifier factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom notifier config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Webhook { .. } => "webhook",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-backed store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between sweeps
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Bound on concurrent domain checks within one sweep
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Host-provided deployment id; a change emits one notification
    #[serde(default)]
    pub version_id: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            concurrency: default_concurrency(),
            version_id: None,
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_concurrency() -> usize {
    crate::scheduler::DEFAULT_CONCURRENCY
}

fn default_resolve_timeout_secs() -> u64 {
    5
}

fn default_notify_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> MonitorConfig {
        MonitorConfig {
            resolver: ResolverConfig::default(),
            notifier: NotifierConfig::Webhook {
                url: "https://chat.example/hook".to_string(),
                timeout_secs: 5,
            },
            store: StoreConfig::Memory,
            static_domains: vec!["example.com".to_string()],
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_bad_static_domain_rejected() {
        let mut config = valid_config();
        config.static_domains.push("bad domain".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plain_http_webhook_rejected() {
        let mut config = valid_config();
        config.notifier = NotifierConfig::Webhook {
            url: "http://chat.example/hook".to_string(),
            timeout_secs: 5,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = valid_config();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.static_domains, config.static_domains);
    }
}
