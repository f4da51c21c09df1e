// # dnswatchd - DNS Change Monitoring Daemon
//
// This is a THIN integration layer: it reads configuration from
// environment variables, wires the registered components together, and
// starts the scheduler. All monitoring logic lives in dnswatch-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Domains
// - `DNSWATCH_DOMAINS`: Comma-separated static domains to monitor
//
// ### Notifier
// - `DNSWATCH_WEBHOOK_URL`: Webhook URL for notifications (required)
//
// ### Resolver
// - `DNSWATCH_RESOLVER_ENDPOINT`: DoH endpoint
//   (default: https://1.1.1.1/dns-query)
//
// ### Store
// - `DNSWATCH_STORE_TYPE`: Store type (file, memory; default: file)
// - `DNSWATCH_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `DNSWATCH_CHECK_INTERVAL`: Seconds between sweeps (default: 60)
// - `DNSWATCH_CONCURRENCY`: Concurrent checks per sweep (default: 16)
// - `DNSWATCH_VERSION_ID`: Deployment id; a change emits one notification
// - `DNSWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DNSWATCH_DOMAINS=example.com,api.example.com
// export DNSWATCH_WEBHOOK_URL=https://chat.example/hook/abc
// export DNSWATCH_STORE_TYPE=file
// export DNSWATCH_STORE_PATH=/var/lib/dnswatch/state.json
//
// dnswatchd
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use dnswatch_core::{
    ComponentRegistry, DomainStateRepo, MonitorConfig, NotifierConfig, Observer, ResolverConfig,
    Scheduler, StoreConfig,
};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration read from the environment
struct Config {
    domains: Vec<String>,
    webhook_url: String,
    resolver_endpoint: String,
    store_type: String,
    store_path: Option<String>,
    check_interval_secs: u64,
    concurrency: usize,
    version_id: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            domains: env::var("DNSWATCH_DOMAINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            webhook_url: env::var("DNSWATCH_WEBHOOK_URL").unwrap_or_default(),
            resolver_endpoint: env::var("DNSWATCH_RESOLVER_ENDPOINT")
                .unwrap_or_else(|_| "https://1.1.1.1/dns-query".to_string()),
            store_type: env::var("DNSWATCH_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DNSWATCH_STORE_PATH").ok(),
            check_interval_secs: env::var("DNSWATCH_CHECK_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            concurrency: env::var("DNSWATCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            version_id: env::var("DNSWATCH_VERSION_ID").ok(),
            log_level: env::var("DNSWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.webhook_url.is_empty() {
            anyhow::bail!(
                "DNSWATCH_WEBHOOK_URL is required. \
                Set it via: export DNSWATCH_WEBHOOK_URL=https://..."
            );
        }

        if !self.webhook_url.starts_with("https://") {
            anyhow::bail!("DNSWATCH_WEBHOOK_URL must use HTTPS. Got: {}", self.webhook_url);
        }

        let token_lower = self.webhook_url.to_lowercase();
        if token_lower.contains("your_webhook") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "DNSWATCH_WEBHOOK_URL appears to be a placeholder. \
                Use the actual webhook URL from your chat channel."
            );
        }

        match self.store_type.as_str() {
            "file" | "memory" => {}
            other => anyhow::bail!(
                "DNSWATCH_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        }

        if self.store_type == "file" && self.store_path.as_ref().is_none_or(|p| p.is_empty()) {
            anyhow::bail!(
                "DNSWATCH_STORE_PATH is required when DNSWATCH_STORE_TYPE=file. \
                Set it via: export DNSWATCH_STORE_PATH=/var/lib/dnswatch/state.json"
            );
        }

        if !(10..=3600).contains(&self.check_interval_secs) {
            anyhow::bail!(
                "DNSWATCH_CHECK_INTERVAL must be between 10 and 3600 seconds. Got: {}",
                self.check_interval_secs
            );
        }

        if !(1..=64).contains(&self.concurrency) {
            anyhow::bail!(
                "DNSWATCH_CONCURRENCY must be between 1 and 64. Got: {}",
                self.concurrency
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "DNSWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }

        Ok(())
    }

    /// Build the core configuration from the environment values
    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            resolver: ResolverConfig::Doh {
                endpoint: self.resolver_endpoint.clone(),
                timeout_secs: 5,
            },
            notifier: NotifierConfig::Webhook {
                url: self.webhook_url.clone(),
                timeout_secs: 5,
            },
            store: match self.store_type.as_str() {
                "memory" => StoreConfig::Memory,
                _ => StoreConfig::File {
                    path: self.store_path.clone().unwrap_or_default(),
                },
            },
            static_domains: self.domains.clone(),
            engine: dnswatch_core::EngineConfig {
                check_interval_secs: self.check_interval_secs,
                concurrency: self.concurrency,
                version_id: self.version_id.clone(),
            },
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting dnswatchd");
    info!("Monitoring {} static domain(s)", config.domains.len());

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DaemonExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                DaemonExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Wire the components and run the scheduler until shutdown
async fn run_daemon(config: Config) -> Result<()> {
    let monitor_config = config.monitor_config();
    monitor_config.validate()?;

    let registry = ComponentRegistry::new();
    dnswatch_core::registry::register_builtin_stores(&registry);
    dnswatch_resolver_doh::register(&registry);
    dnswatch_notify_webhook::register(&registry);

    info!(
        "Registered components: resolvers={:?}, notifiers={:?}, stores={:?}",
        registry.list_resolvers(),
        registry.list_notifiers(),
        registry.list_stores()
    );

    let store: Arc<dyn dnswatch_core::Store> =
        Arc::from(registry.create_store(&monitor_config.store).await?);
    let resolver: Arc<dyn dnswatch_core::DnsResolver> =
        Arc::from(registry.create_resolver(&monitor_config.resolver)?);
    let notifier: Arc<dyn dnswatch_core::Notifier> =
        Arc::from(registry.create_notifier(&monitor_config.notifier)?);

    let repo = DomainStateRepo::new(store);
    let observer = Arc::new(Observer::new(resolver, Arc::clone(&notifier), repo.clone()));

    let mut scheduler = Scheduler::new(
        observer,
        notifier,
        repo,
        monitor_config.static_domains.clone(),
    )
    .with_concurrency(monitor_config.engine.concurrency);

    if let Some(ref version) = monitor_config.engine.version_id {
        scheduler = scheduler.with_version_id(version.clone());
    }

    info!(
        "Starting scheduler with {}s interval",
        monitor_config.engine.check_interval_secs
    );
    scheduler
        .run(Duration::from_secs(monitor_config.engine.check_interval_secs))
        .await?;

    info!("Shutdown complete");
    Ok(())
}
