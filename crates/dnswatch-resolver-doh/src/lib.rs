// # DoH Resolver
//
// DNS-over-HTTPS resolver implementation for the monitoring system.
//
// ## Behavior
//
// One `resolve` call issues two independent queries against the
// configured recursive resolver (SOA first, then A) and combines the
// answers:
//
// ```http
// GET https://1.1.1.1/dns-query?name=example.com&type=SOA
// GET https://1.1.1.1/dns-query?name=example.com&type=A
// Accept: application/dns-json
// ```
//
// ## Error semantics
//
// Only transport failures (connect, deadline, non-200, unparseable
// body) surface as errors. A DoH `Status != 0` and the "No Reachable
// Authority" comment are carried in-band on the result; the observer
// interprets them.
//
// ## Constraints
//
// - Single-shot: no retry, no backoff, no caching (owned by the
//   observer and the store)
// - No background tasks

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use dnswatch_core::config::ResolverConfig;
use dnswatch_core::traits::{ARecord, DnsResolver, ResolveResult, ResolverFactory, SoaRecord};
use dnswatch_core::{Error, Result};

/// Record type code for A records in DoH JSON
const TYPE_A: u16 = 1;

/// Record type code for SOA records in DoH JSON
const TYPE_SOA: u16 = 6;

/// Comment substring signalling an unreachable authority
const NO_AUTHORITY_MARKER: &str = "No Reachable Authority";

/// Default request deadline
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One resource record in a DoH JSON answer
#[derive(Debug, Clone, Deserialize)]
struct DohRecord {
    #[serde(rename = "type")]
    record_type: u16,
    #[serde(rename = "TTL", default)]
    ttl: u32,
    #[serde(default)]
    data: String,
}

/// The Comment field is a string in some responses and an array in others
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommentField {
    One(String),
    Many(Vec<String>),
}

impl CommentField {
    fn into_vec(self) -> Vec<String> {
        match self {
            CommentField::One(comment) => vec![comment],
            CommentField::Many(comments) => comments,
        }
    }
}

/// Standard DoH JSON response shape
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: i32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohRecord>,
    #[serde(rename = "Authority", default)]
    authority: Vec<DohRecord>,
    #[serde(rename = "Comment")]
    comment: Option<CommentField>,
}

/// Parse SOA record data: whitespace-separated
/// `primaryNS admin serial refresh retry expire minTTL`.
///
/// The admin mailbox is normalized from label form: trailing dot
/// stripped, first inner dot replaced with `@`.
fn parse_soa(data: &str) -> Option<SoaRecord> {
    let parts: Vec<&str> = data.split_whitespace().collect();
    if parts.len() < 7 {
        return None;
    }

    let admin = parts[1].trim_end_matches('.').replacen('.', "@", 1);

    Some(SoaRecord {
        primary_ns: parts[0].trim_end_matches('.').to_string(),
        admin_email: admin,
        serial: parts[2].to_string(),
        refresh: parts[3].parse().ok()?,
        retry: parts[4].parse().ok()?,
        expire: parts[5].parse().ok()?,
        minimum_ttl: parts[6].parse().ok()?,
    })
}

/// Combine the SOA and A responses into one result
fn combine(soa_response: &DohResponse, a_response: &DohResponse) -> ResolveResult {
    let a_records: Vec<ARecord> = a_response
        .answer
        .iter()
        .filter(|r| r.record_type == TYPE_A)
        .map(|r| ARecord {
            ip: r.data.clone(),
            ttl: r.ttl,
        })
        .collect();

    // The SOA query answers in Answer; negative responses carry it in
    // Authority instead
    let soa = soa_response
        .answer
        .iter()
        .chain(soa_response.authority.iter())
        .find(|r| r.record_type == TYPE_SOA)
        .and_then(|r| parse_soa(&r.data));

    let mut comments: Vec<String> = Vec::new();
    for response in [soa_response, a_response] {
        if let Some(ref comment) = response.comment {
            comments.extend(comment.clone().into_vec());
        }
    }

    let no_authority = comments.iter().any(|c| c.contains(NO_AUTHORITY_MARKER));

    ResolveResult {
        a_records,
        soa,
        status: a_response.status,
        no_authority,
        comments,
    }
}

/// DoH resolver against a fixed recursive endpoint
pub struct DohResolver {
    endpoint: String,
    client: reqwest::Client,
}

impl DohResolver {
    /// Create a resolver with the default deadline
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a resolver with an explicit request deadline
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn query(&self, fqdn: &str, record_type: &str) -> Result<DohResponse> {
        let url = format!("{}?name={}&type={}", self.endpoint, fqdn, record_type);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| Error::resolver(format!("request failed for {}: {}", fqdn, e)))?;

        if !response.status().is_success() {
            return Err(Error::resolver(format!(
                "HTTP {} from resolver for {} ({})",
                response.status(),
                fqdn,
                record_type
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolver(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::resolver(format!("unparseable DoH response for {}: {}", fqdn, e)))
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn resolve(&self, fqdn: &str) -> Result<ResolveResult> {
        let soa_response = self.query(fqdn, "SOA").await?;
        let a_response = self.query(fqdn, "A").await?;

        let result = combine(&soa_response, &a_response);
        tracing::debug!(
            fqdn,
            status = result.status,
            records = result.a_records.len(),
            no_authority = result.no_authority,
            "resolved"
        );
        Ok(result)
    }

    fn resolver_name(&self) -> &'static str {
        "doh"
    }
}

/// Factory for creating DoH resolvers
pub struct DohFactory;

impl ResolverFactory for DohFactory {
    fn create(&self, config: &ResolverConfig) -> Result<Box<dyn DnsResolver>> {
        match config {
            ResolverConfig::Doh { endpoint, timeout_secs } => Ok(Box::new(
                DohResolver::with_timeout(endpoint.clone(), Duration::from_secs(*timeout_secs)),
            )),
            _ => Err(Error::config("Invalid config for DoH resolver")),
        }
    }
}

/// Register the DoH resolver with a registry
pub fn register(registry: &dnswatch_core::ComponentRegistry) {
    registry.register_resolver("doh", Box::new(DohFactory));
}
