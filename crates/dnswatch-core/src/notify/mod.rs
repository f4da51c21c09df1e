//! Notification building
//!
//! Pure functions from a classification bundle to a structured
//! `Notification`. No I/O here; delivery belongs to the `Notifier`
//! implementation and rendering details (hex colors, emoji) are the
//! transport's concern.

use crate::analysis::{ChangeAnalysis, ChangeType, LbPattern, Severity};
use crate::traits::notifier::{Notification, NotificationField, NotificationKind, SeverityColor};
use crate::traits::resolver::SoaRecord;

fn severity_color(severity: Severity) -> SeverityColor {
    match severity {
        Severity::Critical => SeverityColor::Red,
        Severity::High => SeverityColor::Orange,
        Severity::Medium => SeverityColor::Yellow,
        Severity::Low => SeverityColor::Blue,
    }
}

fn title_for(analysis: &ChangeAnalysis) -> &'static str {
    if analysis.coordination.is_coordinated {
        "Coordinated Infrastructure Change Detected"
    } else if analysis.change.severity == Severity::Critical {
        "Critical DNS Change Detected"
    } else if analysis.lb.pattern == LbPattern::Failover {
        "Load Balancer Failover Detected"
    } else if analysis.cdn.is_any_cdn {
        "CDN Configuration Change"
    } else if analysis.temporal.is_maintenance_window {
        "DNS Change During Maintenance Window"
    } else if analysis.change.change_type == ChangeType::CompleteChange {
        "Complete IP Address Change"
    } else {
        "DNS Change Detected"
    }
}

fn format_ips(ips: &[String]) -> String {
    if ips.is_empty() {
        "(none)".to_string()
    } else {
        ips.join(", ")
    }
}

fn recommended_actions(analysis: &ChangeAnalysis) -> Vec<String> {
    let mut actions = Vec::new();

    if analysis.coordination.is_coordinated {
        actions.push(format!(
            "Treat as a platform-wide event; review sibling domains: {}",
            analysis.coordination.related_domains.join(", ")
        ));
    }

    match analysis.change.severity {
        Severity::Critical => {
            actions.push("Verify this change with the domain owner immediately".to_string())
        }
        Severity::High => {
            actions.push("Check service health for the affected endpoints".to_string())
        }
        _ => {}
    }

    if analysis.lb.pattern == LbPattern::Failover {
        actions.push("Confirm primary endpoint health and the failback plan".to_string());
    } else if analysis.lb.is_load_balancer {
        actions.push("Likely balancer rotation; compare against known pool membership".to_string());
    }

    if analysis.cdn.is_any_cdn {
        actions.push("Review recent CDN configuration releases for this zone".to_string());
    }

    if analysis.change.change_type == ChangeType::CompleteChange {
        actions.push("Validate ownership of the new IPs (whois, PTR records)".to_string());
    }

    if analysis.temporal.is_maintenance_window {
        actions.push("Correlate with the maintenance calendar before escalating".to_string());
    }

    if actions.is_empty() {
        actions.push("No action required; recorded for audit".to_string());
    }

    actions
}

/// Build the notification for an analyzed change that passed dampening
pub fn build_change(
    domain: &str,
    analysis: &ChangeAnalysis,
    previous_ips: &[String],
    current_ips: &[String],
    soa: Option<&SoaRecord>,
) -> Notification {
    let mut fields = vec![
        NotificationField {
            name: "Previous IPs".to_string(),
            value: format_ips(previous_ips),
        },
        NotificationField {
            name: "Current IPs".to_string(),
            value: format_ips(current_ips),
        },
        NotificationField {
            name: "Change Type".to_string(),
            value: analysis.change.change_type.as_str().to_string(),
        },
        NotificationField {
            name: "Severity".to_string(),
            value: analysis.change.severity.as_str().to_string(),
        },
        NotificationField {
            name: "TTL".to_string(),
            value: format!("{}s", analysis.change.ttl),
        },
        NotificationField {
            name: "Time Context".to_string(),
            value: analysis.temporal.pattern.as_str().to_string(),
        },
    ];

    if analysis.cdn.is_any_cdn {
        fields.push(NotificationField {
            name: "CDN".to_string(),
            value: format!(
                "{} ({:.0}% of IPs in known ranges)",
                analysis.cdn.provider.unwrap_or("mixed/unnamed"),
                analysis.cdn.confidence * 100.0
            ),
        });
    }

    if analysis.lb.is_load_balancer {
        fields.push(NotificationField {
            name: "Load Balancer".to_string(),
            value: format!(
                "{} (confidence {:.2}): {}",
                analysis.lb.pattern.as_str(),
                analysis.lb.confidence,
                analysis.lb.analysis
            ),
        });
    }

    if analysis.coordination.is_coordinated {
        fields.push(NotificationField {
            name: "Coordinated Change".to_string(),
            value: format!(
                "score {:.2}; related: {}; {}",
                analysis.coordination.score,
                analysis.coordination.related_domains.join(", "),
                analysis.coordination.analysis
            ),
        });
    }

    if let Some(soa) = soa {
        fields.push(NotificationField {
            name: "SOA".to_string(),
            value: format!(
                "{} ({}), serial {}",
                soa.primary_ns, soa.admin_email, soa.serial
            ),
        });
    }

    Notification {
        kind: NotificationKind::Change,
        title: title_for(analysis).to_string(),
        domain: domain.to_string(),
        color: severity_color(analysis.change.severity),
        fields,
        actions: recommended_actions(analysis),
    }
}

/// Build the rapid-change notice that precedes a four-hour mute
pub fn build_auto_suppression(
    domain: &str,
    changes_last_hour: usize,
    current_ips: &[String],
) -> Notification {
    Notification {
        kind: NotificationKind::AutoSuppression,
        title: "Rapid DNS Changes - Notifications Suppressed".to_string(),
        domain: domain.to_string(),
        color: SeverityColor::Yellow,
        fields: vec![
            NotificationField {
                name: "Changes In Last Hour".to_string(),
                value: changes_last_hour.to_string(),
            },
            NotificationField {
                name: "Current IPs".to_string(),
                value: format_ips(current_ips),
            },
            NotificationField {
                name: "Suppression Window".to_string(),
                value: "4 hours".to_string(),
            },
        ],
        actions: vec![
            "Further notifications for this domain are muted for 4 hours".to_string(),
            "Inspect the domain directly if the churn is unexpected".to_string(),
        ],
    }
}

/// Build the notice for a SOA serial change with an unchanged IP set
pub fn build_zone_updated(domain: &str, previous_serial: &str, serial: &str) -> Notification {
    Notification {
        kind: NotificationKind::ZoneUpdated,
        title: "DNS Zone Updated".to_string(),
        domain: domain.to_string(),
        color: SeverityColor::Blue,
        fields: vec![
            NotificationField {
                name: "Previous Serial".to_string(),
                value: previous_serial.to_string(),
            },
            NotificationField {
                name: "New Serial".to_string(),
                value: serial.to_string(),
            },
        ],
        actions: vec!["Zone content changed without an A-record change".to_string()],
    }
}

/// Build the notice for a zone whose authority stopped answering
pub fn build_authority_unreachable(domain: &str, comments: &[String]) -> Notification {
    let detail = if comments.is_empty() {
        "resolver reported no reachable authority".to_string()
    } else {
        comments.join("; ")
    };
    Notification {
        kind: NotificationKind::AuthorityUnreachable,
        title: "DNS Authority Unreachable".to_string(),
        domain: domain.to_string(),
        color: SeverityColor::Orange,
        fields: vec![NotificationField {
            name: "Resolver Comment".to_string(),
            value: detail,
        }],
        actions: vec![
            "Check the zone's nameservers and delegation".to_string(),
            "Confirm whether the domain registration lapsed".to_string(),
        ],
    }
}

/// Build the notice for a monitoring-side failure
pub fn build_error_monitoring(domain: &str, error: &str) -> Notification {
    Notification {
        kind: NotificationKind::ErrorMonitoring,
        title: "Error Monitoring Domain".to_string(),
        domain: domain.to_string(),
        color: SeverityColor::Gray,
        fields: vec![NotificationField {
            name: "Error".to_string(),
            value: error.to_string(),
        }],
        actions: vec!["Monitoring continues; state was not modified".to_string()],
    }
}

/// Build the restart notice for a new deployment id
pub fn build_new_deployment(version: &str, domains_monitored: usize) -> Notification {
    Notification {
        kind: NotificationKind::NewDeployment,
        title: "Monitor Deployed".to_string(),
        domain: String::new(),
        color: SeverityColor::Blue,
        fields: vec![
            NotificationField {
                name: "Deployment".to_string(),
                value: version.to_string(),
            },
            NotificationField {
                name: "Domains Monitored".to_string(),
                value: domains_monitored.to_string(),
            },
        ],
        actions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{self, load_balancer};
    use crate::repo::BucketEntry;
    use chrono::TimeZone;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn analyze(
        previous: &[String],
        current: &[String],
        ttl: u32,
        bucket: &[BucketEntry],
        hour: u32,
    ) -> analysis::ChangeAnalysis {
        analysis::analyze_change(
            "api.example.com",
            previous,
            current,
            ttl,
            &[],
            bucket,
            chrono::Utc.with_ymd_and_hms(2024, 1, 9, hour, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_critical_title_and_color() {
        let analysis = analyze(&ips(&["5.5.5.5"]), &ips(&["9.9.9.9"]), 3600, &[], 10);
        let n = build_change("api.example.com", &analysis, &ips(&["5.5.5.5"]), &ips(&["9.9.9.9"]), None);
        assert_eq!(n.title, "Critical DNS Change Detected");
        assert_eq!(n.color, SeverityColor::Red);
        assert_eq!(n.field("Change Type"), Some("complete_change"));
        assert_eq!(n.field("Severity"), Some("critical"));
    }

    #[test]
    fn test_coordinated_title_wins_over_critical() {
        let shared = ips(&["10.0.0.1"]);
        let bucket: Vec<BucketEntry> = ["www.example.com", "cdn.example.com", "mail.example.com"]
            .iter()
            .map(|d| BucketEntry {
                domain: d.to_string(),
                ips: shared.clone(),
                timestamp: 0,
            })
            .collect();
        let analysis = analyze(&ips(&["5.5.5.5"]), &shared, 300, &bucket, 10);
        assert!(analysis.coordination.is_coordinated);
        let n = build_change("api.example.com", &analysis, &ips(&["5.5.5.5"]), &shared, None);
        assert_eq!(n.title, "Coordinated Infrastructure Change Detected");
        assert!(n.field("Coordinated Change").is_some());
    }

    #[test]
    fn test_cdn_title_for_cdn_replacement() {
        let analysis = analyze(
            &ips(&["104.16.0.1", "104.16.0.2"]),
            &ips(&["104.16.0.2", "104.16.0.3"]),
            60,
            &[],
            20,
        );
        let n = build_change(
            "api.example.com",
            &analysis,
            &ips(&["104.16.0.1", "104.16.0.2"]),
            &ips(&["104.16.0.2", "104.16.0.3"]),
            None,
        );
        assert_eq!(n.title, "CDN Configuration Change");
        assert!(n.field("CDN").unwrap().contains("Cloudflare"));
    }

    #[test]
    fn test_maintenance_title() {
        let analysis = analyze(
            &ips(&["1.1.2.3", "1.1.2.4"]),
            &ips(&["1.1.2.3", "1.1.2.5"]),
            300,
            &[],
            3,
        );
        let n = build_change(
            "api.example.com",
            &analysis,
            &ips(&["1.1.2.3", "1.1.2.4"]),
            &ips(&["1.1.2.3", "1.1.2.5"]),
            None,
        );
        assert_eq!(n.title, "DNS Change During Maintenance Window");
        assert_eq!(n.color, SeverityColor::Blue);
    }

    #[test]
    fn test_default_title_and_soa_field() {
        let analysis = analyze(
            &ips(&["1.1.2.3", "1.1.2.4"]),
            &ips(&["1.1.2.3", "1.1.2.5"]),
            300,
            &[],
            20,
        );
        let soa = SoaRecord {
            primary_ns: "ns1.example.com".to_string(),
            admin_email: "hostmaster@example.com".to_string(),
            serial: "2024010101".to_string(),
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum_ttl: 300,
        };
        let n = build_change(
            "api.example.com",
            &analysis,
            &ips(&["1.1.2.3", "1.1.2.4"]),
            &ips(&["1.1.2.3", "1.1.2.5"]),
            Some(&soa),
        );
        assert_eq!(n.title, "DNS Change Detected");
        assert!(n.field("SOA").unwrap().contains("2024010101"));
        assert!(!n.actions.is_empty());
    }

    #[test]
    fn test_failover_title() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 9, 20, 0, 0).unwrap();
        let at_ms = at.timestamp_millis();
        let history: Vec<crate::repo::IpObservation> = vec![
            crate::repo::IpObservation { ips: ips(&["1.1.1.1"]), timestamp: at_ms - 3_000_000 },
            crate::repo::IpObservation { ips: ips(&["2.2.2.2"]), timestamp: at_ms - 2_940_000 },
            crate::repo::IpObservation { ips: ips(&["1.1.1.1"]), timestamp: at_ms - 2_880_000 },
            crate::repo::IpObservation { ips: ips(&["2.2.2.2"]), timestamp: at_ms - 60_000 },
        ];
        let analysis = analysis::analyze_change(
            "api.example.com",
            &ips(&["1.1.1.1", "3.3.3.3"]),
            &ips(&["2.2.2.2", "3.3.3.3"]),
            300,
            &history,
            &[],
            at,
        );
        assert_eq!(analysis.lb.pattern, load_balancer::LbPattern::Failover);
        let n = build_change(
            "api.example.com",
            &analysis,
            &ips(&["1.1.1.1", "3.3.3.3"]),
            &ips(&["2.2.2.2", "3.3.3.3"]),
            None,
        );
        assert_eq!(n.title, "Load Balancer Failover Detected");
        assert_eq!(n.color, SeverityColor::Orange);
    }

    #[test]
    fn test_auto_suppression_notice_shape() {
        let n = build_auto_suppression("api.example.com", 6, &ips(&["1.2.3.4"]));
        assert_eq!(n.kind, NotificationKind::AutoSuppression);
        assert_eq!(n.field("Changes In Last Hour"), Some("6"));
    }
}
