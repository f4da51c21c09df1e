//! Coordinated-change detection
//!
//! Several sibling FQDNs of one registrable parent changing within a
//! short window points at a platform-wide event (provider migration,
//! anycast reshuffle) rather than a per-domain incident. The detector
//! reads the global change bucket, which the observer appends to BEFORE
//! querying, so the current change correlates with itself-and-siblings.

use std::collections::HashSet;

use crate::domain::registrable_parent;
use crate::repo::BucketEntry;

/// Result of cross-domain correlation for one change
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinationResult {
    pub is_coordinated: bool,
    /// Combined sibling-count / IP-overlap score in [0, 1]
    pub score: f64,
    pub analysis: String,
    /// Distinct sibling domains that changed in the window
    pub related_domains: Vec<String>,
}

impl CoordinationResult {
    fn not_coordinated(analysis: impl Into<String>) -> Self {
        Self {
            is_coordinated: false,
            score: 0.0,
            analysis: analysis.into(),
            related_domains: Vec::new(),
        }
    }
}

/// Correlate one domain's change against the recent bucket window.
///
/// `entries` should span the current and previous 5-minute bucket;
/// `target_ips` is the domain's new canonical IP set.
pub fn detect(entries: &[BucketEntry], domain: &str, target_ips: &[String]) -> CoordinationResult {
    let parent = registrable_parent(domain);

    let sibling_entries: Vec<&BucketEntry> = entries
        .iter()
        .filter(|e| e.domain != domain && registrable_parent(&e.domain) == parent)
        .collect();

    if sibling_entries.is_empty() {
        return CoordinationResult::not_coordinated(format!(
            "no sibling changes under {} in the last 10 minutes",
            parent
        ));
    }

    let mut related_domains: Vec<String> = sibling_entries
        .iter()
        .map(|e| e.domain.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    related_domains.sort();

    let related_ips: HashSet<&String> =
        sibling_entries.iter().flat_map(|e| e.ips.iter()).collect();
    let target_set: HashSet<&String> = target_ips.iter().collect();
    let intersection = target_set.intersection(&related_ips).count();
    let denominator = related_ips.len().max(target_set.len());
    let overlap_ratio = if denominator == 0 {
        0.0
    } else {
        intersection as f64 / denominator as f64
    };

    let score = (0.3 * related_domains.len() as f64 + 0.7 * overlap_ratio).min(1.0);
    let is_coordinated = related_domains.len() >= 2 && score > 0.6;

    CoordinationResult {
        is_coordinated,
        score,
        analysis: format!(
            "{} sibling domain(s) under {} changed within 10 minutes, IP overlap {:.0}%",
            related_domains.len(),
            parent,
            overlap_ratio * 100.0
        ),
        related_domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(domain: &str, ips: &[&str]) -> BucketEntry {
        BucketEntry {
            domain: domain.to_string(),
            ips: ips.iter().map(|s| s.to_string()).collect(),
            timestamp: 0,
        }
    }

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_siblings_not_coordinated() {
        let entries = vec![entry("other.net", &["1.1.1.1"])];
        let result = detect(&entries, "api.example.com", &ips(&["1.1.1.1"]));
        assert!(!result.is_coordinated);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_own_entry_is_ignored() {
        let entries = vec![
            entry("api.example.com", &["1.1.1.1"]),
            entry("www.example.com", &["1.1.1.1"]),
        ];
        let result = detect(&entries, "api.example.com", &ips(&["1.1.1.1"]));
        assert_eq!(result.related_domains, vec!["www.example.com"]);
        // Only one sibling: never coordinated regardless of overlap
        assert!(!result.is_coordinated);
    }

    #[test]
    fn test_three_siblings_with_high_overlap() {
        let entries = vec![
            entry("www.example.com", &["10.0.0.1", "10.0.0.2"]),
            entry("cdn.example.com", &["10.0.0.1", "10.0.0.2"]),
            entry("mail.example.com", &["10.0.0.2"]),
        ];
        let result = detect(&entries, "api.example.com", &ips(&["10.0.0.1", "10.0.0.2"]));
        // score = min(1, 0.3*3 + 0.7*1.0) = 1.0
        assert!(result.is_coordinated);
        assert!(result.score > 0.6);
        assert_eq!(result.related_domains.len(), 3);
    }

    #[test]
    fn test_two_siblings_no_overlap_below_threshold() {
        let entries = vec![
            entry("www.example.com", &["10.0.0.1"]),
            entry("cdn.example.com", &["10.0.0.2"]),
        ];
        let result = detect(&entries, "api.example.com", &ips(&["192.168.1.1"]));
        // score = 0.3*2 + 0.7*0 = 0.6, not strictly greater than 0.6
        assert!(!result.is_coordinated);
        assert!((result.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_different_parent_is_not_a_sibling() {
        let entries = vec![
            entry("www.example.org", &["10.0.0.1"]),
            entry("cdn.example.org", &["10.0.0.1"]),
        ];
        let result = detect(&entries, "api.example.com", &ips(&["10.0.0.1"]));
        assert!(result.related_domains.is_empty());
    }

    #[test]
    fn test_score_is_capped_at_one() {
        let entries: Vec<BucketEntry> = (0..8)
            .map(|i| entry(&format!("s{}.example.com", i), &["10.0.0.1"]))
            .collect();
        let result = detect(&entries, "api.example.com", &ips(&["10.0.0.1"]));
        assert!(result.is_coordinated);
        assert!((result.score - 1.0).abs() < 1e-9);
    }
}
