//! The intelligent change analyzer
//!
//! A one-way pipeline, no back-edges:
//! temporal + CDN feed the classifier; classifier, load-balancer, and
//! coordination feed the dampening calculator; the calculator feeds the
//! notification builder. Every stage is a stateless function over its
//! inputs, so per-domain work shares nothing mutable.

pub mod cdn;
pub mod classifier;
pub mod coordinated;
pub mod dampening;
pub mod load_balancer;
pub mod temporal;

pub use cdn::CdnDetection;
pub use classifier::{ChangeContext, ChangeType, Severity};
pub use coordinated::CoordinationResult;
pub use dampening::{DampeningInputs, DampeningOutcome, NotifyDecision};
pub use load_balancer::{LbAnalysis, LbPattern};
pub use temporal::{TemporalContext, TimePattern};

use crate::repo::{BucketEntry, IpObservation};
use chrono::{DateTime, Utc};

/// Observations within this window feed the load-balancer analyzer
const LB_WINDOW_MS: i64 = 3600 * 1000;

/// Minimum windowed observations before local LB analysis has signal
const LB_MIN_OBSERVATIONS: usize = 3;

/// Everything the analyzers concluded about one change
#[derive(Debug, Clone)]
pub struct ChangeAnalysis {
    pub change: ChangeContext,
    pub cdn: CdnDetection,
    pub lb: LbAnalysis,
    pub temporal: TemporalContext,
    pub coordination: CoordinationResult,
}

/// Run every analyzer over one observed change.
///
/// `history` is the persisted state BEFORE this observation; `bucket`
/// must already include the current change (the observer appends before
/// it queries).
#[allow(clippy::too_many_arguments)]
pub fn analyze_change(
    domain: &str,
    previous_ips: &[String],
    current_ips: &[String],
    ttl: u32,
    history: &[IpObservation],
    bucket: &[BucketEntry],
    at: DateTime<Utc>,
) -> ChangeAnalysis {
    let at_ms = at.timestamp_millis();
    let temporal = temporal::classify(at);
    let cdn = cdn::detect(current_ips);
    let mut lb = load_balancer::analyze(history, at_ms);
    let mut change = classifier::classify(previous_ips, current_ips, ttl, &temporal, at_ms);

    // A failover flip is operationally urgent whatever the raw diff said
    if lb.pattern == LbPattern::Failover {
        change.severity = change.severity.max(Severity::High);
    }

    let coordination = coordinated::detect(bucket, domain, current_ips);
    if coordination.is_coordinated {
        let windowed = history
            .iter()
            .filter(|obs| at_ms - obs.timestamp <= LB_WINDOW_MS)
            .count();
        // Siblings rotating together are one platform balancer even when
        // this domain alone has too little history to show it
        if lb.pattern == LbPattern::Unknown && windowed < LB_MIN_OBSERVATIONS {
            lb = LbAnalysis {
                is_load_balancer: true,
                pattern: LbPattern::RoundRobin,
                confidence: coordination.score,
                analysis: coordination.analysis.clone(),
            };
        }
        change.severity = change.severity.max(Severity::High);
    }

    ChangeAnalysis {
        change,
        cdn,
        lb,
        temporal,
        coordination,
    }
}
