//! Domain name validation and canonical forms
//!
//! Monitored domains are stored lowercased. Validation follows RFC 1035:
//! labels of 1-63 alphanumeric-plus-inner-hyphen characters, 253 bytes
//! total. IP sets are kept in canonical form (sorted ascending
//! lexicographically) everywhere they are persisted or compared.

use crate::error::{Error, Result};

/// Validate a domain name and return its canonical (lowercased) form.
///
/// # Errors
///
/// Returns `Error::Validation` describing the first failing rule.
pub fn canonicalize_domain(domain: &str) -> Result<String> {
    if domain.is_empty() {
        return Err(Error::validation("domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::validation(format!(
            "domain name too long: {} bytes (max 253)",
            domain.len()
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::validation(format!(
                "domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::validation(format!(
                "domain label too long: {} bytes (max 63): '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::validation(format!(
                "domain label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::validation(format!(
                "domain label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(domain.to_ascii_lowercase())
}

/// The registrable parent of a domain: its last two dot-separated labels.
///
/// Used to group sibling FQDNs for coordinated-change detection. A bare
/// two-label domain is its own parent.
pub fn registrable_parent(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() <= 2 {
        domain.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Sort an IP set into canonical form: ascending lexicographic order,
/// duplicates removed.
pub fn canonical_ip_set(ips: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = ips.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}
