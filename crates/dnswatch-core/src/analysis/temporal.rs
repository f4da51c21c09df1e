//! Time-of-day context
//!
//! A pure function of the wall clock (UTC). The same change means very
//! different things at 03:00 Sunday and 10:00 Tuesday.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Named time-context bucket, first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePattern {
    MaintenanceWindow,
    OffHours,
    Weekend,
    Normal,
}

impl TimePattern {
    pub fn as_str(self) -> &'static str {
        match self {
            TimePattern::MaintenanceWindow => "maintenance_window",
            TimePattern::OffHours => "off_hours",
            TimePattern::Weekend => "weekend",
            TimePattern::Normal => "normal",
        }
    }
}

/// Time-context flags for one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalContext {
    pub is_weekend: bool,
    pub is_maintenance_window: bool,
    pub is_business_hours: bool,
    pub pattern: TimePattern,
}

/// Classify an instant (UTC)
pub fn classify(at: DateTime<Utc>) -> TemporalContext {
    let hour = at.hour();
    let is_weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);
    let is_maintenance_window = (2..=6).contains(&hour) || hour >= 22 || hour <= 2;
    let is_business_hours = !is_weekend && (8..=18).contains(&hour);

    let pattern = if is_maintenance_window {
        TimePattern::MaintenanceWindow
    } else if !is_business_hours {
        TimePattern::OffHours
    } else if is_weekend {
        TimePattern::Weekend
    } else {
        TimePattern::Normal
    };

    TemporalContext {
        is_weekend,
        is_maintenance_window,
        is_business_hours,
        pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_tuesday_morning_is_business_hours() {
        // 2024-01-09 is a Tuesday
        let ctx = classify(at(2024, 1, 9, 10));
        assert!(!ctx.is_weekend);
        assert!(!ctx.is_maintenance_window);
        assert!(ctx.is_business_hours);
        assert_eq!(ctx.pattern, TimePattern::Normal);
    }

    #[test]
    fn test_maintenance_hours() {
        for hour in [0, 1, 2, 3, 4, 5, 6, 22, 23] {
            let ctx = classify(at(2024, 1, 9, hour));
            assert!(ctx.is_maintenance_window, "hour {hour}");
            assert_eq!(ctx.pattern, TimePattern::MaintenanceWindow, "hour {hour}");
        }
        for hour in [7, 8, 21] {
            assert!(!classify(at(2024, 1, 9, hour)).is_maintenance_window, "hour {hour}");
        }
    }

    #[test]
    fn test_weekday_evening_is_off_hours() {
        let ctx = classify(at(2024, 1, 9, 20));
        assert!(!ctx.is_business_hours);
        assert!(!ctx.is_maintenance_window);
        assert_eq!(ctx.pattern, TimePattern::OffHours);
    }

    #[test]
    fn test_saturday_flags() {
        // 2024-01-13 is a Saturday; daytime weekend resolves to off_hours
        // because business hours never apply on weekends
        let ctx = classify(at(2024, 1, 13, 10));
        assert!(ctx.is_weekend);
        assert!(!ctx.is_business_hours);
        assert_eq!(ctx.pattern, TimePattern::OffHours);
    }

    #[test]
    fn test_business_hour_boundaries() {
        assert!(!classify(at(2024, 1, 9, 7)).is_business_hours);
        assert!(classify(at(2024, 1, 9, 8)).is_business_hours);
        assert!(classify(at(2024, 1, 9, 18)).is_business_hours);
        assert!(!classify(at(2024, 1, 9, 19)).is_business_hours);
    }
}
