//! Load-balancer pattern classification
//!
//! Inspects the windowed IP-set history of one domain and tags the churn
//! pattern. Only observations from the last hour count; fewer than three
//! of them means there is not enough signal to call anything.

use std::collections::HashMap;

use crate::repo::IpObservation;

/// Window of history considered for pattern classification
const WINDOW_MS: i64 = 3600 * 1000;

/// Minimum qualifying observations before any pattern can fire
const MIN_OBSERVATIONS: usize = 3;

/// The recognized rotation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbPattern {
    RoundRobin,
    Weighted,
    Failover,
    Geographic,
    Unknown,
}

impl LbPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            LbPattern::RoundRobin => "round_robin",
            LbPattern::Weighted => "weighted",
            LbPattern::Failover => "failover",
            LbPattern::Geographic => "geographic",
            LbPattern::Unknown => "unknown",
        }
    }
}

/// Result of load-balancer analysis
#[derive(Debug, Clone, PartialEq)]
pub struct LbAnalysis {
    pub is_load_balancer: bool,
    pub pattern: LbPattern,
    pub confidence: f64,
    pub analysis: String,
}

impl LbAnalysis {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            is_load_balancer: false,
            pattern: LbPattern::Unknown,
            confidence: 0.0,
            analysis: reason.into(),
        }
    }
}

fn signature(obs: &IpObservation) -> String {
    obs.ips.join(",")
}

/// Classify the rotation pattern of one domain's recent history.
///
/// Evaluation order is fixed: round-robin, weighted, failover; the first
/// matching pattern wins.
pub fn analyze(history: &[IpObservation], now_ms: i64) -> LbAnalysis {
    let recent: Vec<&IpObservation> = history
        .iter()
        .filter(|obs| now_ms - obs.timestamp <= WINDOW_MS)
        .collect();

    if recent.len() < MIN_OBSERVATIONS {
        return LbAnalysis::unknown(format!(
            "only {} observation(s) in the last hour, need {}",
            recent.len(),
            MIN_OBSERVATIONS
        ));
    }

    let n = recent.len();
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for obs in &recent {
        *frequency.entry(signature(obs)).or_default() += 1;
    }
    let distinct = frequency.len();

    // Round-robin: few signatures cycling at a steady clip
    if n >= 5 && (2..=3).contains(&distinct) {
        return LbAnalysis {
            is_load_balancer: true,
            pattern: LbPattern::RoundRobin,
            confidence: 0.8,
            analysis: format!(
                "round-robin rotation: {} observations cycling through {} IP sets",
                n, distinct
            ),
        };
    }

    // Weighted: one signature clearly dominates the others
    if (2..=4).contains(&distinct) {
        let mut counts: Vec<usize> = frequency.values().copied().collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        let (top, second) = (counts[0], counts[1]);
        if top as f64 > 1.5 * second as f64 {
            return LbAnalysis {
                is_load_balancer: true,
                pattern: LbPattern::Weighted,
                confidence: 0.7,
                analysis: format!(
                    "weighted distribution: dominant set seen {} times vs {} for the runner-up",
                    top, second
                ),
            };
        }
    }

    // Failover: a long quiet stretch before the most recent flip. The
    // newest gap is compared against the mean of the earlier gaps.
    let mut sorted: Vec<&IpObservation> = recent.clone();
    sorted.sort_by_key(|obs| obs.timestamp);
    let gaps: Vec<i64> = sorted
        .windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .collect();
    let (earlier, last_gap) = (&gaps[..gaps.len() - 1], gaps[gaps.len() - 1]);
    let mean_gap = earlier.iter().sum::<i64>() as f64 / earlier.len() as f64;
    if distinct <= 2 && last_gap as f64 > 3.0 * mean_gap {
        return LbAnalysis {
            is_load_balancer: true,
            pattern: LbPattern::Failover,
            confidence: 0.6,
            analysis: format!(
                "failover pattern: latest gap {}s against a {}s mean across {} observations",
                last_gap / 1000,
                (mean_gap / 1000.0).round() as i64,
                n
            ),
        };
    }

    LbAnalysis::unknown(format!(
        "no recognized pattern across {} observations of {} IP sets",
        n, distinct
    ))
}
