//! Dampening calculation
//!
//! Combines every analyzer signal into one answer: does this change get
//! a notification, and how long are follow-ups muted. The calculator
//! fails open; when in doubt it notifies rather than drops.

use super::cdn::CdnDetection;
use super::classifier::{ChangeContext, Severity};
use super::load_balancer::{LbAnalysis, LbPattern};
use super::temporal::TemporalContext;
use crate::repo::IpObservation;

/// Hard floor on the dampening period
pub const MIN_PERIOD_MS: i64 = 60 * 1000;

/// Hard ceiling on the dampening period
pub const MAX_PERIOD_MS: i64 = 4 * 3600 * 1000;

/// Mute window after an auto-suppression notice
pub const AUTO_SUPPRESS_PERIOD_MS: i64 = 4 * 3600 * 1000;

/// Lookback for the oscillation override
const OSCILLATION_WINDOW_MS: i64 = 24 * 3600 * 1000;

/// Lookback for the change-rate multipliers and auto-suppression
const CHANGE_RATE_WINDOW_MS: i64 = 3600 * 1000;

/// What the observer should do with the current change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    /// Emit the full change notification
    Notify,
    /// Emit the rapid-change notice instead of the full notification
    NotifyAutoSuppression,
    /// Stay silent; history is still recorded
    Suppress,
}

/// Full calculator output, kept explainable for operators
#[derive(Debug, Clone, PartialEq)]
pub struct DampeningOutcome {
    /// Effective suppression period applied from this change
    pub period_ms: i64,
    /// TTL-derived base before multipliers (0 on the auto-suppress path)
    pub base_ms: i64,
    /// Product of all matching signal multipliers
    pub multiplier: f64,
    /// True when the oscillation override replaced the computed period
    pub oscillation: bool,
    /// Qualifying history entries in the last hour
    pub changes_last_hour: usize,
    pub decision: NotifyDecision,
}

/// Everything the calculator looks at for one change
pub struct DampeningInputs<'a> {
    pub change: &'a ChangeContext,
    pub cdn: &'a CdnDetection,
    pub lb: &'a LbAnalysis,
    pub temporal: &'a TemporalContext,
    /// History as persisted BEFORE the current observation is appended
    pub history: &'a [IpObservation],
    /// Canonical current IP set
    pub current_ips: &'a [String],
    /// Instant of the most recent emitted notification, ms since epoch
    pub last_notification_at: Option<i64>,
    pub now_ms: i64,
}

fn base_period_ms(ttl: u32) -> i64 {
    let ttl_ms = ttl as i64 * 1000;
    if ttl < 60 {
        20 * 60 * 1000
    } else if ttl < 300 {
        15 * 60 * 1000
    } else if ttl < 900 {
        (2 * ttl_ms).max(5 * 60 * 1000)
    } else {
        ttl_ms.max(5 * 60 * 1000)
    }
}

fn multiplier(inputs: &DampeningInputs<'_>, changes_last_hour: usize) -> f64 {
    let mut m = 1.0;

    if inputs.cdn.is_any_cdn {
        m *= if inputs.cdn.confidence > 0.8 { 2.0 } else { 1.5 };
    }

    if inputs.lb.is_load_balancer {
        m *= match inputs.lb.pattern {
            LbPattern::RoundRobin => 3.0,
            LbPattern::Weighted => 2.0,
            LbPattern::Failover => 0.5,
            LbPattern::Geographic | LbPattern::Unknown => 1.5,
        };
    }

    if inputs.temporal.is_maintenance_window {
        m *= 1.5;
    }
    if inputs.temporal.is_business_hours {
        m *= 0.8;
    }

    m *= match inputs.change.severity {
        Severity::Critical => 0.3,
        Severity::High => 0.6,
        Severity::Low => 2.0,
        Severity::Medium => 1.0,
    };

    if changes_last_hour >= 5 {
        m *= 4.0;
    } else if changes_last_hour >= 3 {
        m *= 2.0;
    }

    m
}

fn oscillation_seen(inputs: &DampeningInputs<'_>) -> bool {
    let signature = inputs.current_ips.join(",");
    inputs.history.iter().any(|obs| {
        inputs.now_ms - obs.timestamp <= OSCILLATION_WINDOW_MS && obs.ips.join(",") == signature
    })
}

fn within_period(last: Option<i64>, now_ms: i64, period_ms: i64) -> bool {
    last.map_or(false, |at| now_ms - at < period_ms)
}

/// Run the full dampening decision for one observed change.
pub fn calculate(inputs: &DampeningInputs<'_>) -> DampeningOutcome {
    let changes_last_hour = inputs
        .history
        .iter()
        .filter(|obs| inputs.now_ms - obs.timestamp <= CHANGE_RATE_WINDOW_MS)
        .count();

    // Auto-suppression: a domain churning this fast gets one notice and
    // then four hours of silence.
    let suppress_threshold = if inputs.lb.is_load_balancer { 3 } else { 5 };
    if changes_last_hour >= suppress_threshold {
        let already_muted = within_period(
            inputs.last_notification_at,
            inputs.now_ms,
            AUTO_SUPPRESS_PERIOD_MS,
        );
        return DampeningOutcome {
            period_ms: AUTO_SUPPRESS_PERIOD_MS,
            base_ms: 0,
            multiplier: 1.0,
            oscillation: false,
            changes_last_hour,
            decision: if already_muted {
                NotifyDecision::Suppress
            } else {
                NotifyDecision::NotifyAutoSuppression
            },
        };
    }

    let base_ms = base_period_ms(inputs.change.ttl);
    let m = multiplier(inputs, changes_last_hour);
    let mut period_ms = ((base_ms as f64 * m) as i64).clamp(MIN_PERIOD_MS, MAX_PERIOD_MS);

    // Oscillation override: a signature we already saw in the last day is
    // churn, not news. The override replaces the computed period.
    let oscillation = oscillation_seen(inputs);
    if oscillation {
        period_ms = if inputs.cdn.is_any_cdn || inputs.lb.is_load_balancer {
            2 * 3600 * 1000
        } else {
            30 * 60 * 1000
        };
    }

    let decision = if within_period(inputs.last_notification_at, inputs.now_ms, period_ms) {
        NotifyDecision::Suppress
    } else {
        NotifyDecision::Notify
    };

    DampeningOutcome {
        period_ms,
        base_ms,
        multiplier: m,
        oscillation,
        changes_last_hour,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cdn;
    use crate::analysis::classifier::{ChangeType, Severity};
    use crate::analysis::load_balancer::LbAnalysis;
    use crate::analysis::temporal;
    use chrono::TimeZone;

    const NOW: i64 = 1_700_000_000_000;

    fn change(ttl: u32, severity: Severity) -> ChangeContext {
        ChangeContext {
            change_type: ChangeType::Replacement,
            severity,
            ttl,
            confidence: 0.8,
            at_ms: NOW,
        }
    }

    fn no_cdn() -> cdn::CdnDetection {
        cdn::detect(&[])
    }

    fn lb(pattern: LbPattern, conf: f64) -> LbAnalysis {
        LbAnalysis {
            is_load_balancer: pattern != LbPattern::Unknown,
            pattern,
            confidence: conf,
            analysis: String::new(),
        }
    }

    fn business_hours() -> temporal::TemporalContext {
        temporal::classify(chrono::Utc.with_ymd_and_hms(2024, 1, 9, 10, 0, 0).unwrap())
    }

    fn quiet_night() -> temporal::TemporalContext {
        // Tuesday 20:00: off-hours but neither maintenance nor business
        temporal::classify(chrono::Utc.with_ymd_and_hms(2024, 1, 9, 20, 0, 0).unwrap())
    }

    fn calc(inputs: &DampeningInputs<'_>) -> DampeningOutcome {
        calculate(inputs)
    }

    fn default_inputs<'a>(
        change: &'a ChangeContext,
        cdn: &'a cdn::CdnDetection,
        lb: &'a LbAnalysis,
        temporal: &'a temporal::TemporalContext,
        history: &'a [IpObservation],
        ips: &'a [String],
    ) -> DampeningInputs<'a> {
        DampeningInputs {
            change,
            cdn,
            lb,
            temporal,
            history,
            current_ips: ips,
            last_notification_at: None,
            now_ms: NOW,
        }
    }

    #[test]
    fn test_ttl_base_thresholds() {
        assert_eq!(base_period_ms(59), 20 * 60 * 1000);
        assert_eq!(base_period_ms(60), 15 * 60 * 1000);
        assert_eq!(base_period_ms(299), 15 * 60 * 1000);
        assert_eq!(base_period_ms(300), 10 * 60 * 1000);
        assert_eq!(base_period_ms(899), 2 * 899 * 1000);
        assert_eq!(base_period_ms(900), 15 * 60 * 1000);
        assert_eq!(base_period_ms(7200), 7200 * 1000);
    }

    #[test]
    fn test_clamp_bounds() {
        // Critical severity on a tiny base cannot go below one minute
        let change1 = change(60, Severity::Critical);
        let cdn = no_cdn();
        let lb1 = lb(LbPattern::Failover, 0.6);
        let temporal = business_hours();
        let ips = vec!["1.1.1.1".to_string()];
        let outcome = calc(&default_inputs(&change1, &cdn, &lb1, &temporal, &[], &ips));
        assert!(outcome.period_ms >= MIN_PERIOD_MS);
        assert!(outcome.period_ms <= MAX_PERIOD_MS);

        // Round-robin on a huge TTL cannot exceed four hours
        let change2 = change(36_000, Severity::Low);
        let lb2 = lb(LbPattern::RoundRobin, 0.8);
        let outcome = calc(&default_inputs(&change2, &cdn, &lb2, &temporal, &[], &ips));
        assert_eq!(outcome.period_ms, MAX_PERIOD_MS);
    }

    #[test]
    fn test_critical_business_hours_shortens_period() {
        // TTL 3600, critical, business hours: 3_600_000 * 0.3 * 0.8
        let change = change(3600, Severity::Critical);
        let cdn = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = business_hours();
        let ips = vec!["9.9.9.9".to_string()];
        let outcome = calc(&default_inputs(&change, &cdn, &lb, &temporal, &[], &ips));
        assert_eq!(outcome.base_ms, 3_600_000);
        assert!((outcome.multiplier - 0.24).abs() < 1e-9);
        assert_eq!(outcome.period_ms, 864_000);
        assert_eq!(outcome.decision, NotifyDecision::Notify);
    }

    #[test]
    fn test_failover_high_severity_business_hours() {
        // Multipliers: failover 0.5 * business 0.8 * high 0.6 = 0.24
        let change = change(300, Severity::High);
        let cdn = no_cdn();
        let lb = lb(LbPattern::Failover, 0.6);
        let temporal = business_hours();
        let ips = vec!["2.2.2.2".to_string()];
        let outcome = calc(&default_inputs(&change, &cdn, &lb, &temporal, &[], &ips));
        assert!((outcome.multiplier - 0.24).abs() < 1e-9);
        assert_eq!(outcome.base_ms, 600_000);
        assert_eq!(outcome.period_ms, 144_000);
    }

    #[test]
    fn test_oscillation_override_with_lb() {
        let ips = vec!["104.16.0.1".to_string(), "104.16.0.2".to_string()];
        let history = vec![
            IpObservation {
                ips: ips.clone(),
                timestamp: NOW - 40 * 60 * 1000,
            },
            IpObservation {
                ips: vec!["104.16.0.3".to_string()],
                timestamp: NOW - 20 * 60 * 1000,
            },
        ];
        let change = change(60, Severity::Medium);
        let detection = cdn::detect(&ips);
        let lb = lb(LbPattern::RoundRobin, 0.8);
        let temporal = quiet_night();
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &history, &ips));
        assert!(outcome.oscillation);
        assert_eq!(outcome.period_ms, 2 * 3600 * 1000);
    }

    #[test]
    fn test_oscillation_override_plain_domain() {
        let ips = vec!["8.8.4.4".to_string()];
        let history = vec![IpObservation {
            ips: ips.clone(),
            timestamp: NOW - 3600 * 1000,
        }];
        let change = change(600, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &history, &ips));
        assert!(outcome.oscillation);
        assert_eq!(outcome.period_ms, 30 * 60 * 1000);
    }

    #[test]
    fn test_stale_signature_is_not_oscillation() {
        let ips = vec!["8.8.4.4".to_string()];
        let history = vec![IpObservation {
            ips: ips.clone(),
            timestamp: NOW - 25 * 3600 * 1000,
        }];
        let change = change(600, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &history, &ips));
        assert!(!outcome.oscillation);
    }

    #[test]
    fn test_auto_suppression_with_lb_threshold_three() {
        let history: Vec<IpObservation> = (0..3)
            .map(|i| IpObservation {
                ips: vec![format!("10.0.0.{}", i)],
                timestamp: NOW - (i as i64 + 1) * 10 * 60 * 1000,
            })
            .collect();
        let change = change(60, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::RoundRobin, 0.8);
        let temporal = quiet_night();
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &history, &[]));
        assert_eq!(outcome.decision, NotifyDecision::NotifyAutoSuppression);
        assert_eq!(outcome.period_ms, AUTO_SUPPRESS_PERIOD_MS);
        assert_eq!(outcome.changes_last_hour, 3);
    }

    #[test]
    fn test_no_lb_needs_five_changes_to_suppress() {
        let history: Vec<IpObservation> = (0..4)
            .map(|i| IpObservation {
                ips: vec![format!("10.0.0.{}", i)],
                timestamp: NOW - (i as i64 + 1) * 10 * 60 * 1000,
            })
            .collect();
        let change = change(60, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &history, &[]));
        assert_ne!(outcome.decision, NotifyDecision::NotifyAutoSuppression);
        // 4 changes in the hour still doubles the period
        assert!((outcome.multiplier - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_suppression_mutes_followups_for_four_hours() {
        let history: Vec<IpObservation> = (0..6)
            .map(|i| IpObservation {
                ips: vec![format!("10.0.0.{}", i)],
                timestamp: NOW - (i as i64 + 1) * 8 * 60 * 1000,
            })
            .collect();
        let change = change(60, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::RoundRobin, 0.8);
        let temporal = quiet_night();

        let mut inputs = default_inputs(&change, &detection, &lb, &temporal, &history, &[]);
        // Notice already went out an hour ago
        inputs.last_notification_at = Some(NOW - 3600 * 1000);
        let outcome = calc(&inputs);
        assert_eq!(outcome.decision, NotifyDecision::Suppress);
        assert_eq!(outcome.period_ms, AUTO_SUPPRESS_PERIOD_MS);
    }

    #[test]
    fn test_recent_notification_suppresses() {
        let change = change(3600, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();
        let ips = vec!["1.1.1.1".to_string()];
        let mut inputs = default_inputs(&change, &detection, &lb, &temporal, &[], &ips);
        inputs.last_notification_at = Some(NOW - 60 * 1000);
        let outcome = calc(&inputs);
        assert_eq!(outcome.decision, NotifyDecision::Suppress);
    }

    #[test]
    fn test_never_notified_always_notifies() {
        let change = change(3600, Severity::Medium);
        let detection = no_cdn();
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();
        let ips = vec!["1.1.1.1".to_string()];
        let outcome = calc(&default_inputs(&change, &detection, &lb, &temporal, &[], &ips));
        assert_eq!(outcome.decision, NotifyDecision::Notify);
    }

    #[test]
    fn test_cdn_confidence_tiers() {
        let ips: Vec<String> = vec!["104.16.0.1".to_string(), "8.8.8.8".to_string()];
        let half = cdn::detect(&ips); // confidence 0.5 -> x1.5 tier
        let full = cdn::detect(&["104.16.0.1".to_string()]); // 1.0 -> x2.0 tier
        let change = change(3600, Severity::Medium);
        let lb = lb(LbPattern::Unknown, 0.0);
        let temporal = quiet_night();

        let outcome = calc(&default_inputs(&change, &half, &lb, &temporal, &[], &ips));
        assert!((outcome.multiplier - 1.5).abs() < 1e-9);

        let outcome = calc(&default_inputs(&change, &full, &lb, &temporal, &[], &ips));
        assert!((outcome.multiplier - 2.0).abs() < 1e-9);
    }
}
