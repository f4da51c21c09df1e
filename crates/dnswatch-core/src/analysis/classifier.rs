//! Change classification
//!
//! Computes the change type and base severity from the previous and
//! current IP sets plus the time context. Severity here is a starting
//! point; coordination can upgrade it downstream.

use std::collections::HashSet;

use super::temporal::TemporalContext;

/// Shape of the difference between two IP sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Previous set was empty
    Addition,
    /// Current set is empty
    Removal,
    /// Overlapping, but membership shifted
    Replacement,
    /// Disjoint non-empty sets
    CompleteChange,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Addition => "addition",
            ChangeType::Removal => "removal",
            ChangeType::Replacement => "replacement",
            ChangeType::CompleteChange => "complete_change",
        }
    }
}

/// Assigned importance of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Classified change, ready for the dampening calculator
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeContext {
    pub change_type: ChangeType,
    pub severity: Severity,
    /// TTL of the current answer, seconds
    pub ttl: u32,
    pub confidence: f64,
    /// Observation instant, ms since epoch
    pub at_ms: i64,
}

/// Classify a change between two canonical IP sets
pub fn classify(
    previous: &[String],
    current: &[String],
    ttl: u32,
    temporal: &TemporalContext,
    at_ms: i64,
) -> ChangeContext {
    let change_type = if previous.is_empty() {
        ChangeType::Addition
    } else if current.is_empty() {
        ChangeType::Removal
    } else {
        let prev: HashSet<&String> = previous.iter().collect();
        let disjoint = !current.iter().any(|ip| prev.contains(ip));
        if disjoint {
            ChangeType::CompleteChange
        } else {
            ChangeType::Replacement
        }
    };

    let severity = if change_type == ChangeType::CompleteChange && temporal.is_business_hours {
        Severity::Critical
    } else if change_type == ChangeType::Removal {
        Severity::High
    } else if temporal.is_maintenance_window {
        Severity::Low
    } else {
        Severity::Medium
    };

    ChangeContext {
        change_type,
        severity,
        ttl,
        confidence: 0.8,
        at_ms,
    }
}
