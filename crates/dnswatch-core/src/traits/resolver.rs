// # Resolver Trait
//
// Defines the interface for querying the current DNS state of a domain.
//
// ## Implementations
//
// - DoH: `dnswatch-resolver-doh` crate (recursive resolution over HTTPS)
//
// ## In-band signals
//
// Two conditions that look like failures are data, not errors, and the
// observer interprets them:
// - `status != 0` (SERVFAIL, NXDOMAIN, ...)
// - `no_authority` (the resolver reported "No Reachable Authority")
//
// Only transport-level failures surface as `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single A record from a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecord {
    /// IPv4 address in dotted-quad form
    pub ip: String,
    /// Record time-to-live in seconds
    pub ttl: u32,
}

/// Parsed SOA record fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaRecord {
    /// Primary nameserver, trailing dot stripped
    pub primary_ns: String,
    /// Zone admin contact, normalized to mailbox form (first dot -> @)
    pub admin_email: String,
    /// Zone serial, kept as an opaque string
    pub serial: String,
    /// Refresh interval in seconds
    pub refresh: u32,
    /// Retry interval in seconds
    pub retry: u32,
    /// Expire limit in seconds
    pub expire: u32,
    /// Negative-caching TTL in seconds
    pub minimum_ttl: u32,
}

/// Combined result of one resolution pass (SOA query + A query)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveResult {
    /// A records in answer order
    pub a_records: Vec<ARecord>,
    /// SOA record if the resolver returned one
    pub soa: Option<SoaRecord>,
    /// DoH status code (0 = NOERROR)
    pub status: i32,
    /// True iff the resolver reported an unreachable authority
    pub no_authority: bool,
    /// Diagnostic comments passed through from the resolver
    pub comments: Vec<String>,
}

impl ResolveResult {
    /// The resolved IPs in canonical (sorted, deduplicated) form
    pub fn canonical_ips(&self) -> Vec<String> {
        let ips: Vec<String> = self.a_records.iter().map(|r| r.ip.clone()).collect();
        crate::domain::canonical_ip_set(&ips)
    }

    /// TTL of the first A record, if any
    pub fn ttl(&self) -> Option<u32> {
        self.a_records.first().map(|r| r.ttl)
    }
}

/// Trait for resolver implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// Resolvers are single-shot: one `resolve` call performs the queries for
/// one domain and returns. Retry, scheduling, and interpretation of the
/// result are owned by the observer.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolve a domain, returning its current A-record set and SOA fields
    ///
    /// # Returns
    ///
    /// - `Ok(ResolveResult)`: The combined answer (possibly empty)
    /// - `Err(Error)`: Transport failure only
    async fn resolve(&self, fqdn: &str) -> Result<ResolveResult, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

/// Helper trait for constructing resolvers from configuration
pub trait ResolverFactory: Send + Sync {
    /// Create a DnsResolver instance from configuration
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
    ) -> Result<Box<dyn DnsResolver>, crate::Error>;
}
