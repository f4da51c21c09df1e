//! Per-domain observation
//!
//! One `check` call is one tick for one domain: resolve, diff against
//! the persisted state, run the analyzer pipeline, persist, and emit a
//! notification when the dampening calculator says so.
//!
//! ## Ordering rules
//!
//! - Writes within a tick: state, IPs, serial, then notification
//!   tracking. A crash mid-sequence leaves a consistent earlier state.
//! - The global-bucket append happens BEFORE the coordination query, so
//!   the current change is part of its own correlation window.
//! - `lastNotificationAt` is advanced BEFORE the notifier call; a
//!   delivery failure is logged, never retried within the tick.
//!
//! ## Error policy
//!
//! Transport failures (resolver or deadline) recover locally: emit an
//! `ErrorMonitoring` notification, mutate nothing, move on. Failures on
//! the dampening path fail open: better a duplicate notification than
//! a silently dropped one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::analysis::{self, dampening, NotifyDecision};
use crate::notify;
use crate::repo::{DomainState, DomainStateRepo};
use crate::traits::{DnsResolver, Notification, Notifier, ResolveResult};
use crate::Result;

/// Deadlines for the observer's outbound calls
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    /// DoH resolution
    pub resolve: Duration,
    /// Notifier emission
    pub notify: Duration,
    /// Coordination bucket read
    pub bucket_read: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            resolve: Duration::from_secs(5),
            notify: Duration::from_secs(5),
            bucket_read: Duration::from_secs(2),
        }
    }
}

/// What one tick concluded for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// First successful observation, recorded silently
    FirstSeen,
    /// IP set unchanged, serial unchanged
    NoChange,
    /// Serial moved with an unchanged IP set
    SerialChanged,
    /// IP set changed; `notified` reports the dampening decision
    Changed { notified: bool },
    /// Authority unreachable (notified only on the transition)
    AuthorityUnreachable,
    /// Resolver transport failure; no state was mutated
    TransportError,
}

/// Per-domain tick runner
pub struct Observer {
    resolver: Arc<dyn DnsResolver>,
    notifier: Arc<dyn Notifier>,
    repo: DomainStateRepo,
    deadlines: Deadlines,
}

impl Observer {
    pub fn new(
        resolver: Arc<dyn DnsResolver>,
        notifier: Arc<dyn Notifier>,
        repo: DomainStateRepo,
    ) -> Self {
        Self {
            resolver,
            notifier,
            repo,
            deadlines: Deadlines::default(),
        }
    }

    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Deliver a notification, logging instead of propagating failures.
    ///
    /// The dampening timestamp has already been advanced by the caller,
    /// so a failed delivery costs one message, never a retry storm.
    async fn emit(&self, notification: &Notification) {
        match timeout(self.deadlines.notify, self.notifier.emit(notification)).await {
            Ok(Ok(())) => {
                debug!(domain = %notification.domain, title = %notification.title, "notification delivered")
            }
            Ok(Err(e)) => {
                warn!(domain = %notification.domain, error = %e, "notification delivery failed")
            }
            Err(_) => {
                warn!(domain = %notification.domain, "notification delivery timed out")
            }
        }
    }

    /// Advance the dampening clock, then deliver.
    async fn notify_tracked(&self, domain: &str, now_ms: i64, notification: &Notification) {
        if let Err(e) = self.repo.set_last_notification_at(domain, now_ms).await {
            // Fail open: prefer a possible duplicate over a dropped alert
            warn!(domain, error = %e, "failed to advance notification timestamp");
        }
        self.emit(notification).await;
    }

    /// Run one tick for one domain
    pub async fn check(&self, domain: &str) -> Result<TickOutcome> {
        let resolved = match timeout(self.deadlines.resolve, self.resolver.resolve(domain)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(domain, error = %e, "resolution failed");
                self.emit(&notify::build_error_monitoring(domain, &e.to_string()))
                    .await;
                return Ok(TickOutcome::TransportError);
            }
            Err(_) => {
                warn!(domain, "resolution timed out");
                self.emit(&notify::build_error_monitoring(domain, "resolution timed out"))
                    .await;
                return Ok(TickOutcome::TransportError);
            }
        };

        let prior = self.repo.load_state(domain).await?;
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        if resolved.no_authority {
            if prior.state != DomainState::NoAuthority {
                info!(domain, "authority became unreachable");
                self.notify_tracked(
                    domain,
                    now_ms,
                    &notify::build_authority_unreachable(domain, &resolved.comments),
                )
                .await;
                self.repo.set_state(domain, DomainState::NoAuthority).await?;
            }
            return Ok(TickOutcome::AuthorityUnreachable);
        }

        let current_ips = resolved.canonical_ips();
        let serial = resolved.soa.as_ref().map(|soa| soa.serial.clone());

        if prior.state == DomainState::Unseen {
            // First sight establishes the baseline without a notification
            self.repo
                .write_observation(domain, DomainState::Resolved, &current_ips, serial.as_deref())
                .await?;
            info!(domain, ips = %current_ips.join(","), "first observation recorded");
            return Ok(TickOutcome::FirstSeen);
        }

        if current_ips != prior.last_ips {
            let notified = self
                .handle_change(domain, &prior, &resolved, &current_ips, serial.as_deref(), now_ms)
                .await?;
            return Ok(TickOutcome::Changed { notified });
        }

        if let (Some(new_serial), Some(old_serial)) = (serial.as_deref(), prior.last_serial.as_deref())
        {
            if new_serial != old_serial {
                self.repo.set_state(domain, DomainState::Resolved).await?;
                self.repo.set_serial(domain, new_serial).await?;
                self.notify_tracked(
                    domain,
                    now_ms,
                    &notify::build_zone_updated(domain, old_serial, new_serial),
                )
                .await;
                return Ok(TickOutcome::SerialChanged);
            }
        }

        // Recovery from no_authority with identical IPs still needs the
        // state flag moved back
        if prior.state == DomainState::NoAuthority {
            self.repo.set_state(domain, DomainState::Resolved).await?;
        }

        Ok(TickOutcome::NoChange)
    }

    async fn handle_change(
        &self,
        domain: &str,
        prior: &crate::repo::MonitoredState,
        resolved: &ResolveResult,
        current_ips: &[String],
        serial: Option<&str>,
        now_ms: i64,
    ) -> Result<bool> {
        debug!(
            domain,
            previous = %prior.last_ips.join(","),
            current = %current_ips.join(","),
            "IP set changed"
        );

        self.repo
            .write_observation(domain, DomainState::Resolved, current_ips, serial)
            .await?;

        // Append before querying so this change correlates with siblings
        // observed in the same window
        if let Err(e) = self.repo.append_change_bucket(domain, current_ips, now_ms).await {
            warn!(domain, error = %e, "global bucket append failed");
        }
        let bucket = match timeout(
            self.deadlines.bucket_read,
            self.repo.recent_bucket_entries(now_ms),
        )
        .await
        {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!(domain, error = %e, "coordination bucket read failed");
                Vec::new()
            }
            Err(_) => {
                warn!(domain, "coordination bucket read timed out");
                Vec::new()
            }
        };

        let ttl = resolved.ttl().unwrap_or(0);
        let analysis = analysis::analyze_change(
            domain,
            &prior.last_ips,
            current_ips,
            ttl,
            &prior.recent_ip_history,
            &bucket,
            crate::repo::ms_to_datetime(now_ms),
        );

        let outcome = dampening::calculate(&dampening::DampeningInputs {
            change: &analysis.change,
            cdn: &analysis.cdn,
            lb: &analysis.lb,
            temporal: &analysis.temporal,
            history: &prior.recent_ip_history,
            current_ips,
            last_notification_at: prior.last_notification_at,
            now_ms,
        });

        debug!(
            domain,
            period_ms = outcome.period_ms,
            multiplier = outcome.multiplier,
            oscillation = outcome.oscillation,
            decision = ?outcome.decision,
            "dampening calculated"
        );

        let notified = match outcome.decision {
            NotifyDecision::Notify => {
                let notification = notify::build_change(
                    domain,
                    &analysis,
                    &prior.last_ips,
                    current_ips,
                    resolved.soa.as_ref(),
                );
                self.notify_tracked(domain, now_ms, &notification).await;
                true
            }
            NotifyDecision::NotifyAutoSuppression => {
                info!(
                    domain,
                    changes = outcome.changes_last_hour,
                    "rapid churn, switching to auto-suppression"
                );
                let notification =
                    notify::build_auto_suppression(domain, outcome.changes_last_hour, current_ips);
                self.notify_tracked(domain, now_ms, &notification).await;
                true
            }
            NotifyDecision::Suppress => {
                debug!(domain, "change suppressed by dampening");
                false
            }
        };

        // History records every change, suppressed or not
        self.repo.push_recent_ips(domain, current_ips, now_ms).await?;

        Ok(notified)
    }
}
