//! Test doubles and common utilities for the contract tests
//!
//! Hand-rolled mocks only: a scripted resolver that replays canned
//! results, and a counting notifier that records everything it is asked
//! to deliver.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use dnswatch_core::repo::DomainStateRepo;
use dnswatch_core::state::MemoryStore;
use dnswatch_core::traits::{
    ARecord, DnsResolver, Notification, Notifier, ResolveResult, SoaRecord,
};
use dnswatch_core::{Error, Observer, Result};

/// Build a `ResolveResult` with the given IPs, TTL, and serial
pub fn resolution(ips: &[&str], ttl: u32, serial: &str) -> ResolveResult {
    ResolveResult {
        a_records: ips
            .iter()
            .map(|ip| ARecord {
                ip: ip.to_string(),
                ttl,
            })
            .collect(),
        soa: Some(SoaRecord {
            primary_ns: "ns1.example.com".to_string(),
            admin_email: "hostmaster@example.com".to_string(),
            serial: serial.to_string(),
            refresh: 7200,
            retry: 3600,
            expire: 1_209_600,
            minimum_ttl: 300,
        }),
        status: 0,
        no_authority: false,
        comments: Vec::new(),
    }
}

/// Build a `ResolveResult` carrying the unreachable-authority signal
pub fn no_authority_resolution() -> ResolveResult {
    ResolveResult {
        a_records: Vec::new(),
        soa: None,
        status: 2,
        no_authority: true,
        comments: vec!["No Reachable Authority (delegation example.com.)".to_string()],
    }
}

/// A resolver that replays scripted results per domain
///
/// Results are consumed front-to-back; once a domain's queue empties,
/// the last served result is repeated. `Err` entries are modeled as
/// `None`.
#[derive(Default)]
pub struct ScriptedResolver {
    scripts: Mutex<HashMap<String, VecDeque<Option<ResolveResult>>>>,
    served: Mutex<HashMap<String, Option<ResolveResult>>>,
    call_count: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful resolution for a domain
    pub fn push(&self, domain: &str, result: ResolveResult) {
        self.scripts
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .push_back(Some(result));
    }

    /// Queue a transport failure for a domain
    pub fn push_error(&self, domain: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .push_back(None);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for ScriptedResolver {
    async fn resolve(&self, fqdn: &str) -> Result<ResolveResult> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let queued = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(fqdn)
            .and_then(|queue| queue.pop_front());

        let entry = match queued {
            Some(entry) => {
                self.served
                    .lock()
                    .unwrap()
                    .insert(fqdn.to_string(), entry.clone());
                entry
            }
            // Queue drained: keep serving the last scripted answer
            None => self
                .served
                .lock()
                .unwrap()
                .get(fqdn)
                .cloned()
                .ok_or_else(|| Error::resolver(format!("no script for {}", fqdn)))?,
        };

        entry.ok_or_else(|| Error::resolver(format!("scripted transport failure for {}", fqdn)))
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// A notifier that records every notification it is asked to deliver
#[derive(Default)]
pub struct CountingNotifier {
    emitted: Mutex<Vec<Notification>>,
    fail: std::sync::atomic::AtomicBool,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent emit fail
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<Notification> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn emit_count(&self) -> usize {
        self.emitted.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn emit(&self, notification: &Notification) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::notifier("scripted delivery failure"));
        }
        self.emitted.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "counting"
    }
}

/// A fully wired observer over a fresh in-memory store
pub struct Harness {
    pub resolver: Arc<ScriptedResolver>,
    pub notifier: Arc<CountingNotifier>,
    pub repo: DomainStateRepo,
    pub observer: Observer,
}

impl Harness {
    pub fn new() -> Self {
        let resolver = Arc::new(ScriptedResolver::new());
        let notifier = Arc::new(CountingNotifier::new());
        let repo = DomainStateRepo::new(Arc::new(MemoryStore::new()));
        let observer = Observer::new(
            Arc::clone(&resolver) as Arc<dyn DnsResolver>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            repo.clone(),
        );
        Self {
            resolver,
            notifier,
            repo,
            observer,
        }
    }
}
