//! Typed repository over the Store
//!
//! Every persisted value the monitor uses goes through this module, so
//! the keyspace lives in exactly one place:
//!
//! - `dns:<fqdn>:state`   -> "resolved" | "no_authority"
//! - `dns:<fqdn>:ips`     -> comma-separated sorted IPs
//! - `dns:<fqdn>:serial`  -> opaque SOA serial string
//! - `notify:<fqdn>:last` -> decimal milliseconds-since-epoch
//! - `notify:<fqdn>:recent_ips` -> JSON [{"ips": [...], "timestamp": ms}]
//! - `dynamic:domains`    -> JSON array of FQDNs
//! - `global:dns_changes:<floor(ms/300000)>` -> JSON bucket (TTL 3600 s)
//! - `system:version_id`  -> opaque deployment id
//! - `bot:status`         -> JSON heartbeat
//!
//! Integrity policy: a stored value that fails to decode is logged and
//! treated as absent. Corruption costs one re-learned baseline, never a
//! crashed sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::canonical_ip_set;
use crate::error::Result;
use crate::traits::Store;

/// Upper bound on retained IP-history entries per domain
pub const HISTORY_MAX_ENTRIES: usize = 10;

/// Freshness horizon for IP-history entries
pub const HISTORY_HORIZON_MS: i64 = 7 * 24 * 3600 * 1000;

/// Width of one global change bucket
pub const BUCKET_WIDTH_MS: i64 = 300_000;

/// Retention of global change buckets
pub const BUCKET_TTL_SECS: u64 = 3600;

/// Lifecycle state of a monitored domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    /// Never successfully observed; no keys written yet
    Unseen,
    /// Last observation resolved normally
    Resolved,
    /// The zone's authority was unreachable at last observation
    NoAuthority,
}

impl DomainState {
    fn as_str(self) -> Option<&'static str> {
        match self {
            DomainState::Unseen => None,
            DomainState::Resolved => Some("resolved"),
            DomainState::NoAuthority => Some("no_authority"),
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "resolved" => DomainState::Resolved,
            "no_authority" => DomainState::NoAuthority,
            _ => DomainState::Unseen,
        }
    }
}

/// One historical IP-set observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpObservation {
    /// Sorted IP set at the time of observation
    pub ips: Vec<String>,
    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// One entry in a global change bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// The domain that changed
    pub domain: String,
    /// Its new sorted IP set
    pub ips: Vec<String>,
    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// Heartbeat written after every sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub online: bool,
    pub last_check: i64,
    pub domains_monitored: usize,
    pub activity: String,
    pub updated_at: i64,
}

/// Everything persisted for one monitored domain
#[derive(Debug, Clone)]
pub struct MonitoredState {
    pub state: DomainState,
    /// Canonical (sorted) IP set from the last observation
    pub last_ips: Vec<String>,
    /// SOA serial from the last observation
    pub last_serial: Option<String>,
    /// Instant of the most recent emitted notification (ms since epoch)
    pub last_notification_at: Option<i64>,
    /// Bounded history of distinct observations, ascending by timestamp
    pub recent_ip_history: Vec<IpObservation>,
}

/// Typed accessor layer over the Store
#[derive(Clone)]
pub struct DomainStateRepo {
    store: Arc<dyn Store>,
}

impl DomainStateRepo {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Borrow the underlying store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn state_key(fqdn: &str) -> String {
        format!("dns:{}:state", fqdn)
    }

    fn ips_key(fqdn: &str) -> String {
        format!("dns:{}:ips", fqdn)
    }

    fn serial_key(fqdn: &str) -> String {
        format!("dns:{}:serial", fqdn)
    }

    fn last_notification_key(fqdn: &str) -> String {
        format!("notify:{}:last", fqdn)
    }

    fn recent_ips_key(fqdn: &str) -> String {
        format!("notify:{}:recent_ips", fqdn)
    }

    fn bucket_key(bucket: i64) -> String {
        format!("global:dns_changes:{}", bucket)
    }

    /// Decode a stored JSON value, logging and discarding corrupt data
    fn decode_json<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding corrupt stored value");
                None
            }
        }
    }

    /// Load the full monitored state for a domain
    pub async fn load_state(&self, fqdn: &str) -> Result<MonitoredState> {
        let state = match self.store.get(&Self::state_key(fqdn)).await? {
            Some(raw) => DomainState::parse(&raw),
            None => DomainState::Unseen,
        };

        let last_ips = match self.store.get(&Self::ips_key(fqdn)).await? {
            Some(raw) if !raw.is_empty() => {
                canonical_ip_set(&raw.split(',').map(str::to_string).collect::<Vec<_>>())
            }
            _ => Vec::new(),
        };

        let last_serial = self.store.get(&Self::serial_key(fqdn)).await?;

        let last_notification_at = match self.store.get(&Self::last_notification_key(fqdn)).await? {
            Some(raw) => match raw.parse::<i64>() {
                Ok(ms) => Some(ms),
                Err(e) => {
                    tracing::warn!(
                        key = %Self::last_notification_key(fqdn),
                        error = %e,
                        "discarding corrupt stored value"
                    );
                    None
                }
            },
            None => None,
        };

        let recent_ip_history = match self.store.get(&Self::recent_ips_key(fqdn)).await? {
            Some(raw) => {
                Self::decode_json::<Vec<IpObservation>>(&Self::recent_ips_key(fqdn), &raw)
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        Ok(MonitoredState {
            state,
            last_ips,
            last_serial,
            last_notification_at,
            recent_ip_history,
        })
    }

    /// Persist one observation: state, then IPs, then serial.
    ///
    /// The write order matters: a crash mid-sequence leaves a state the
    /// next tick reads as a consistent earlier snapshot.
    pub async fn write_observation(
        &self,
        fqdn: &str,
        state: DomainState,
        ips: &[String],
        serial: Option<&str>,
    ) -> Result<()> {
        if let Some(s) = state.as_str() {
            self.store.put(&Self::state_key(fqdn), s).await?;
        }
        self.store
            .put(&Self::ips_key(fqdn), &canonical_ip_set(ips).join(","))
            .await?;
        if let Some(serial) = serial {
            self.store.put(&Self::serial_key(fqdn), serial).await?;
        }
        Ok(())
    }

    /// Overwrite only the domain's lifecycle state
    pub async fn set_state(&self, fqdn: &str, state: DomainState) -> Result<()> {
        if let Some(s) = state.as_str() {
            self.store.put(&Self::state_key(fqdn), s).await?;
        }
        Ok(())
    }

    /// Overwrite only the stored SOA serial
    pub async fn set_serial(&self, fqdn: &str, serial: &str) -> Result<()> {
        self.store.put(&Self::serial_key(fqdn), serial).await
    }

    /// Advance the last-notification instant.
    ///
    /// Monotone: an older instant than the stored one is ignored.
    pub async fn set_last_notification_at(&self, fqdn: &str, at_ms: i64) -> Result<()> {
        let key = Self::last_notification_key(fqdn);
        if let Some(raw) = self.store.get(&key).await? {
            if raw.parse::<i64>().map_or(false, |stored| stored > at_ms) {
                return Ok(());
            }
        }
        self.store.put(&key, &at_ms.to_string()).await
    }

    /// Append an observation to the per-domain IP history.
    ///
    /// The history keeps at most `HISTORY_MAX_ENTRIES` entries, all
    /// within the freshness horizon, ascending by timestamp.
    pub async fn push_recent_ips(&self, fqdn: &str, ips: &[String], at_ms: i64) -> Result<()> {
        let key = Self::recent_ips_key(fqdn);
        let mut history: Vec<IpObservation> = match self.store.get(&key).await? {
            Some(raw) => Self::decode_json(&key, &raw).unwrap_or_default(),
            None => Vec::new(),
        };

        history.push(IpObservation {
            ips: canonical_ip_set(ips),
            timestamp: at_ms,
        });
        history.sort_by_key(|obs| obs.timestamp);
        history.retain(|obs| at_ms - obs.timestamp <= HISTORY_HORIZON_MS);
        if history.len() > HISTORY_MAX_ENTRIES {
            let excess = history.len() - HISTORY_MAX_ENTRIES;
            history.drain(..excess);
        }

        self.store
            .put(&key, &serde_json::to_string(&history)?)
            .await
    }

    /// Drop notification tracking for a domain (dampening reset)
    pub async fn clear_notification_tracking(&self, fqdn: &str) -> Result<()> {
        self.store.delete(&Self::last_notification_key(fqdn)).await?;
        self.store.delete(&Self::recent_ips_key(fqdn)).await
    }

    /// Remove every key belonging to a domain
    pub async fn delete_domain(&self, fqdn: &str) -> Result<()> {
        self.store.delete(&Self::state_key(fqdn)).await?;
        self.store.delete(&Self::ips_key(fqdn)).await?;
        self.store.delete(&Self::serial_key(fqdn)).await?;
        self.store.delete(&Self::last_notification_key(fqdn)).await?;
        self.store.delete(&Self::recent_ips_key(fqdn)).await
    }

    /// The dynamically-added domain list
    pub async fn dynamic_domains(&self) -> Result<Vec<String>> {
        match self.store.get("dynamic:domains").await? {
            Some(raw) => Ok(Self::decode_json("dynamic:domains", &raw).unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the dynamically-added domain list
    pub async fn set_dynamic_domains(&self, domains: &[String]) -> Result<()> {
        self.store
            .put("dynamic:domains", &serde_json::to_string(domains)?)
            .await
    }

    /// Append a change to the current 5-minute global bucket
    pub async fn append_change_bucket(
        &self,
        domain: &str,
        ips: &[String],
        at_ms: i64,
    ) -> Result<()> {
        let key = Self::bucket_key(at_ms / BUCKET_WIDTH_MS);
        let mut entries: Vec<BucketEntry> = match self.store.get(&key).await? {
            Some(raw) => Self::decode_json(&key, &raw).unwrap_or_default(),
            None => Vec::new(),
        };
        entries.push(BucketEntry {
            domain: domain.to_string(),
            ips: canonical_ip_set(ips),
            timestamp: at_ms,
        });
        self.store
            .put_with_ttl(&key, &serde_json::to_string(&entries)?, BUCKET_TTL_SECS)
            .await
    }

    /// Entries from the current and previous bucket (a ten-minute window)
    pub async fn recent_bucket_entries(&self, at_ms: i64) -> Result<Vec<BucketEntry>> {
        let current = at_ms / BUCKET_WIDTH_MS;
        let mut entries = Vec::new();
        for bucket in [current - 1, current] {
            let key = Self::bucket_key(bucket);
            if let Some(raw) = self.store.get(&key).await? {
                if let Some(mut decoded) = Self::decode_json::<Vec<BucketEntry>>(&key, &raw) {
                    entries.append(&mut decoded);
                }
            }
        }
        Ok(entries)
    }

    /// The stored deployment id
    pub async fn version_id(&self) -> Result<Option<String>> {
        self.store.get("system:version_id").await
    }

    /// Record the running deployment id
    pub async fn set_version_id(&self, version: &str) -> Result<()> {
        self.store.put("system:version_id", version).await
    }

    /// Write the post-sweep heartbeat
    pub async fn write_bot_status(&self, status: &BotStatus) -> Result<()> {
        self.store
            .put("bot:status", &serde_json::to_string(status)?)
            .await
    }
}

/// Current wall-clock instant as milliseconds since epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a stored millisecond instant back to a `DateTime`
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;

    fn repo() -> DomainStateRepo {
        DomainStateRepo::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_unseen_domain_loads_empty() {
        let repo = repo();
        let state = repo.load_state("example.com").await.unwrap();
        assert_eq!(state.state, DomainState::Unseen);
        assert!(state.last_ips.is_empty());
        assert!(state.last_serial.is_none());
        assert!(state.last_notification_at.is_none());
        assert!(state.recent_ip_history.is_empty());
    }

    #[tokio::test]
    async fn test_observation_round_trip_is_canonical() {
        let repo = repo();
        let ips = vec!["9.9.9.9".to_string(), "1.2.3.4".to_string()];
        repo.write_observation("example.com", DomainState::Resolved, &ips, Some("2024010101"))
            .await
            .unwrap();

        let state = repo.load_state("example.com").await.unwrap();
        assert_eq!(state.state, DomainState::Resolved);
        assert_eq!(state.last_ips, vec!["1.2.3.4", "9.9.9.9"]);
        assert_eq!(state.last_serial.as_deref(), Some("2024010101"));

        // Keyspace literal check
        let raw = repo
            .store()
            .get("dns:example.com:ips")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw, "1.2.3.4,9.9.9.9");
    }

    #[tokio::test]
    async fn test_last_notification_is_monotone() {
        let repo = repo();
        repo.set_last_notification_at("example.com", 2_000).await.unwrap();
        repo.set_last_notification_at("example.com", 1_000).await.unwrap();

        let state = repo.load_state("example.com").await.unwrap();
        assert_eq!(state.last_notification_at, Some(2_000));
    }

    #[tokio::test]
    async fn test_history_bounded_and_fresh() {
        let repo = repo();
        let now = now_ms();

        // One stale entry beyond the horizon plus twelve fresh ones
        repo.push_recent_ips("example.com", &["1.1.1.1".to_string()], now - HISTORY_HORIZON_MS - 1)
            .await
            .unwrap();
        for i in 0..12 {
            repo.push_recent_ips(
                "example.com",
                &[format!("10.0.0.{}", i)],
                now - 1000 * (12 - i),
            )
            .await
            .unwrap();
        }

        let state = repo.load_state("example.com").await.unwrap();
        assert_eq!(state.recent_ip_history.len(), HISTORY_MAX_ENTRIES);
        assert!(state
            .recent_ip_history
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(state
            .recent_ip_history
            .iter()
            .all(|obs| now - obs.timestamp <= HISTORY_HORIZON_MS));
    }

    #[tokio::test]
    async fn test_corrupt_history_reads_as_absent() {
        let repo = repo();
        repo.store()
            .put("notify:example.com:recent_ips", "{not json")
            .await
            .unwrap();
        let state = repo.load_state("example.com").await.unwrap();
        assert!(state.recent_ip_history.is_empty());
    }

    #[tokio::test]
    async fn test_bucket_window_spans_two_buckets() {
        let repo = repo();
        let now = 10 * BUCKET_WIDTH_MS + 1;

        repo.append_change_bucket("a.example.com", &["1.1.1.1".to_string()], now - BUCKET_WIDTH_MS)
            .await
            .unwrap();
        repo.append_change_bucket("b.example.com", &["2.2.2.2".to_string()], now)
            .await
            .unwrap();
        // Two buckets back: outside the query window
        repo.append_change_bucket(
            "c.example.com",
            &["3.3.3.3".to_string()],
            now - 2 * BUCKET_WIDTH_MS,
        )
        .await
        .unwrap();

        let entries = repo.recent_bucket_entries(now).await.unwrap();
        let domains: Vec<&str> = entries.iter().map(|e| e.domain.as_str()).collect();
        assert!(domains.contains(&"a.example.com"));
        assert!(domains.contains(&"b.example.com"));
        assert!(!domains.contains(&"c.example.com"));
    }

    #[tokio::test]
    async fn test_delete_domain_removes_all_keys() {
        let repo = repo();
        repo.write_observation(
            "example.com",
            DomainState::Resolved,
            &["1.2.3.4".to_string()],
            Some("1"),
        )
        .await
        .unwrap();
        repo.set_last_notification_at("example.com", 1).await.unwrap();
        repo.push_recent_ips("example.com", &["1.2.3.4".to_string()], now_ms())
            .await
            .unwrap();

        repo.delete_domain("example.com").await.unwrap();

        for key in [
            "dns:example.com:state",
            "dns:example.com:ips",
            "dns:example.com:serial",
            "notify:example.com:last",
            "notify:example.com:recent_ips",
        ] {
            assert_eq!(repo.store().get(key).await.unwrap(), None, "{key}");
        }
    }
}
