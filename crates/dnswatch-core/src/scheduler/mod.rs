//! Sweep scheduling
//!
//! The scheduler owns the periodic loop: every tick it enumerates the
//! union of static and dynamic domains and fans the observer out over
//! them with bounded concurrency. Per-domain work is independent by
//! construction (the analyzers are stateless and the store is the only
//! shared resource), so fan-out is safe at any bound.
//!
//! A deployment-id change (the host's version string differs from the
//! stored one) emits a single `NewDeployment` notification before the
//! first sweep of the new process.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::observer::{Observer, TickOutcome};
use crate::repo::{now_ms, BotStatus, DomainStateRepo};
use crate::traits::Notifier;
use crate::{notify, Result};

/// Default bound on concurrent domain checks within one sweep
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Counts from one completed sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub domains: usize,
    pub changed: usize,
    pub notified: usize,
    pub first_seen: usize,
    pub errors: usize,
}

/// Periodic sweep runner
pub struct Scheduler {
    observer: Arc<Observer>,
    notifier: Arc<dyn Notifier>,
    repo: DomainStateRepo,
    static_domains: Vec<String>,
    version_id: Option<String>,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(
        observer: Arc<Observer>,
        notifier: Arc<dyn Notifier>,
        repo: DomainStateRepo,
        static_domains: Vec<String>,
    ) -> Self {
        Self {
            observer,
            notifier,
            repo,
            static_domains,
            version_id: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the host-provided deployment id checked before each sweep
    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Override the fan-out bound
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The union of static and dynamic domains, deduplicated and sorted
    pub async fn monitored_domains(&self) -> Result<Vec<String>> {
        let mut domains: BTreeSet<String> = self.static_domains.iter().cloned().collect();
        domains.extend(self.repo.dynamic_domains().await?);
        Ok(domains.into_iter().collect())
    }

    /// Emit the one-time deployment notice when the version id moved
    async fn check_deployment(&self, domains_monitored: usize) -> Result<()> {
        let Some(ref version) = self.version_id else {
            return Ok(());
        };

        let stored = self.repo.version_id().await?;
        if stored.as_deref() == Some(version.as_str()) {
            return Ok(());
        }

        info!(version = %version, previous = ?stored, "new deployment detected");
        let notification = notify::build_new_deployment(version, domains_monitored);
        if let Err(e) = self.notifier.emit(&notification).await {
            warn!(error = %e, "deployment notification failed");
        }
        self.repo.set_version_id(version).await
    }

    /// Run one full sweep over every monitored domain
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let domains = self.monitored_domains().await?;
        let mut summary = SweepSummary {
            domains: domains.len(),
            ..Default::default()
        };

        self.check_deployment(domains.len()).await?;

        debug!(domains = domains.len(), "sweep started");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(String, Result<TickOutcome>)> = JoinSet::new();

        for domain in domains {
            let observer = Arc::clone(&self.observer);
            let permit = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Closing the semaphore is not part of this design, so
                // acquisition only fails if the task set is dropped
                let _permit = permit.acquire().await;
                let outcome = observer.check(&domain).await;
                (domain, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((domain, Ok(outcome))) => match outcome {
                    TickOutcome::FirstSeen => summary.first_seen += 1,
                    TickOutcome::Changed { notified } => {
                        summary.changed += 1;
                        if notified {
                            summary.notified += 1;
                        }
                    }
                    TickOutcome::TransportError => summary.errors += 1,
                    TickOutcome::NoChange
                    | TickOutcome::SerialChanged
                    | TickOutcome::AuthorityUnreachable => {
                        debug!(domain, ?outcome, "tick complete");
                    }
                },
                Ok((domain, Err(e))) => {
                    summary.errors += 1;
                    error!(domain, error = %e, "domain check failed");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(error = %e, "domain check panicked");
                }
            }
        }

        let ts = now_ms();
        let status = BotStatus {
            online: true,
            last_check: ts,
            domains_monitored: summary.domains,
            activity: format!(
                "checked {} domain(s), {} changed, {} notified",
                summary.domains, summary.changed, summary.notified
            ),
            updated_at: ts,
        };
        if let Err(e) = self.repo.write_bot_status(&status).await {
            warn!(error = %e, "status heartbeat write failed");
        }

        info!(
            domains = summary.domains,
            changed = summary.changed,
            notified = summary.notified,
            errors = summary.errors,
            "sweep complete"
        );

        Ok(summary)
    }

    /// Run sweeps on an interval until a shutdown signal is received
    ///
    /// Production entry point; uses SIGINT for shutdown.
    pub async fn run(&self, interval: Duration) -> Result<()> {
        self.run_internal(interval, None).await
    }

    async fn run_internal(
        &self,
        interval: Duration,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "sweep failed");
                        }
                    }
                    _ = &mut rx => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "sweep failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
        }

        self.repo.store().flush().await?;
        info!("state flushed, scheduler stopped");
        Ok(())
    }

    /// Test-only helper to run the loop with a controlled shutdown signal
    ///
    /// **TESTING ONLY**: contract tests require deterministic shutdown.
    /// Production code should use `run()`, which shuts down on OS
    /// signals.
    pub async fn run_with_shutdown(
        &self,
        interval: Duration,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(interval, shutdown_rx).await
    }
}
