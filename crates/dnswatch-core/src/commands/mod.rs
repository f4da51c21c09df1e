//! Command surface
//!
//! The operations the external chat module calls into. Interaction
//! plumbing (slash commands, signatures, deferred responses) lives
//! outside; this module owns validation, provenance rules, and the
//! store mutations.
//!
//! Provenance: static domains come from boot configuration and cannot
//! be removed here; dynamic domains are fully mutable.

use serde::Serialize;

use crate::domain::canonicalize_domain;
use crate::repo::{DomainState, DomainStateRepo, IpObservation};
use crate::Result;

/// Result of an add request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Already monitored (static or dynamic)
    Duplicate,
    /// Failed validation; carries the reason verbatim
    Invalid(String),
}

/// Result of a remove request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Result of a subtree removal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtreeRemoval {
    /// Dynamic domains removed, with their stored keys deleted
    pub removed: Vec<String>,
    /// Static matches that were refused
    pub refused_static: Vec<String>,
}

/// The monitored-domain listing, split by provenance
#[derive(Debug, Clone, Serialize)]
pub struct DomainLists {
    pub r#static: Vec<String>,
    pub dynamic: Vec<String>,
}

/// Dampening view for one domain
#[derive(Debug, Clone, Serialize)]
pub struct DampeningStatus {
    pub domain: String,
    /// Instant of the most recent notification, ms since epoch
    pub last_notification_at: Option<i64>,
    /// Qualifying history entries in the last hour
    pub changes_last_hour: usize,
    pub recent_ip_history: Vec<IpObservation>,
}

/// Monitoring status view for one domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainStatus {
    pub domain: String,
    /// "unseen" | "resolved" | "no_authority"
    pub state: String,
    pub current_ips: Vec<String>,
    pub serial: Option<String>,
    pub last_notification_at: Option<i64>,
    pub is_static: bool,
}

/// Command handlers over the repo and the boot-time static list
pub struct Commands {
    repo: DomainStateRepo,
    static_domains: Vec<String>,
}

impl Commands {
    pub fn new(repo: DomainStateRepo, static_domains: Vec<String>) -> Self {
        Self {
            repo,
            static_domains,
        }
    }

    fn is_static(&self, fqdn: &str) -> bool {
        self.static_domains.iter().any(|d| d == fqdn)
    }

    /// List every monitored domain, split by provenance
    pub async fn list_domains(&self) -> Result<DomainLists> {
        let mut dynamic = self.repo.dynamic_domains().await?;
        dynamic.sort();
        let mut r#static = self.static_domains.clone();
        r#static.sort();
        Ok(DomainLists { r#static, dynamic })
    }

    /// Add a domain to the dynamic list
    pub async fn add_dynamic(&self, fqdn: &str) -> Result<AddOutcome> {
        let canonical = match canonicalize_domain(fqdn) {
            Ok(domain) => domain,
            Err(e) => return Ok(AddOutcome::Invalid(e.to_string())),
        };

        if self.is_static(&canonical) {
            return Ok(AddOutcome::Duplicate);
        }

        let mut dynamic = self.repo.dynamic_domains().await?;
        if dynamic.iter().any(|d| d == &canonical) {
            return Ok(AddOutcome::Duplicate);
        }

        dynamic.push(canonical);
        self.repo.set_dynamic_domains(&dynamic).await?;
        Ok(AddOutcome::Added)
    }

    /// Remove a dynamic domain, deleting all of its stored keys
    pub async fn remove_dynamic(&self, fqdn: &str) -> Result<RemoveOutcome> {
        let canonical = fqdn.to_ascii_lowercase();
        let mut dynamic = self.repo.dynamic_domains().await?;
        let before = dynamic.len();
        dynamic.retain(|d| d != &canonical);
        if dynamic.len() == before {
            return Ok(RemoveOutcome::NotFound);
        }

        self.repo.set_dynamic_domains(&dynamic).await?;
        self.repo.delete_domain(&canonical).await?;
        Ok(RemoveOutcome::Removed)
    }

    /// Remove a domain and everything below it from the dynamic list.
    ///
    /// Static matches are refused and reported back; their state keys
    /// are untouched.
    pub async fn remove_subtree(&self, fqdn: &str) -> Result<SubtreeRemoval> {
        let canonical = fqdn.to_ascii_lowercase();
        let suffix = format!(".{}", canonical);
        let in_subtree = |d: &str| d == canonical || d.ends_with(&suffix);

        let mut result = SubtreeRemoval::default();
        for d in &self.static_domains {
            if in_subtree(d) {
                result.refused_static.push(d.clone());
            }
        }

        let mut dynamic = self.repo.dynamic_domains().await?;
        let (removed, kept): (Vec<String>, Vec<String>) =
            dynamic.drain(..).partition(|d| in_subtree(d));

        self.repo.set_dynamic_domains(&kept).await?;
        for domain in &removed {
            self.repo.delete_domain(domain).await?;
        }
        result.removed = removed;
        result.removed.sort();
        result.refused_static.sort();
        Ok(result)
    }

    /// Current dampening view for one domain
    pub async fn get_dampening(&self, fqdn: &str) -> Result<DampeningStatus> {
        let canonical = fqdn.to_ascii_lowercase();
        let state = self.repo.load_state(&canonical).await?;
        let now = crate::repo::now_ms();
        let changes_last_hour = state
            .recent_ip_history
            .iter()
            .filter(|obs| now - obs.timestamp <= 3600 * 1000)
            .count();
        Ok(DampeningStatus {
            domain: canonical,
            last_notification_at: state.last_notification_at,
            changes_last_hour,
            recent_ip_history: state.recent_ip_history,
        })
    }

    /// Reset dampening for one domain: the next change notifies
    pub async fn clear_dampening(&self, fqdn: &str) -> Result<()> {
        self.repo
            .clear_notification_tracking(&fqdn.to_ascii_lowercase())
            .await
    }

    /// Current monitoring status for one domain
    pub async fn get_status(&self, fqdn: &str) -> Result<DomainStatus> {
        let canonical = fqdn.to_ascii_lowercase();
        let state = self.repo.load_state(&canonical).await?;
        Ok(DomainStatus {
            is_static: self.is_static(&canonical),
            state: match state.state {
                DomainState::Unseen => "unseen",
                DomainState::Resolved => "resolved",
                DomainState::NoAuthority => "no_authority",
            }
            .to_string(),
            current_ips: state.last_ips,
            serial: state.last_serial,
            last_notification_at: state.last_notification_at,
            domain: canonical,
        })
    }
}
