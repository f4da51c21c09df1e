//! CDN detection
//!
//! Classifies an IP set against a curated table of public CDN ranges.
//! The table is read-only after initialization and shared freely.

use std::net::Ipv4Addr;

/// Result of classifying an IP set against the CDN range table
#[derive(Debug, Clone, PartialEq)]
pub struct CdnDetection {
    /// Dominant provider, present when more than half the set matched it
    pub provider: Option<&'static str>,
    /// Fraction of the input set inside any known range
    pub confidence: f64,
    /// True when at least one IP matched a range
    pub is_any_cdn: bool,
}

impl CdnDetection {
    fn none() -> Self {
        Self {
            provider: None,
            confidence: 0.0,
            is_any_cdn: false,
        }
    }
}

const fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

/// Curated public ranges, checked in order; first containing range wins.
static CDN_RANGES: &[(&str, u32, u32)] = &[
    ("Cloudflare", ip(104, 16, 0, 0), ip(104, 31, 255, 255)),
    ("Cloudflare", ip(172, 64, 0, 0), ip(172, 71, 255, 255)),
    ("Cloudflare", ip(108, 162, 192, 0), ip(108, 162, 255, 255)),
    ("Cloudflare", ip(190, 93, 240, 0), ip(190, 93, 255, 255)),
    ("Cloudflare", ip(188, 114, 96, 0), ip(188, 114, 127, 255)),
    ("AWS", ip(13, 32, 0, 0), ip(13, 35, 255, 255)),
    ("AWS", ip(13, 224, 0, 0), ip(13, 227, 255, 255)),
    ("AWS", ip(13, 249, 0, 0), ip(13, 249, 255, 255)),
    ("AWS", ip(52, 84, 0, 0), ip(52, 85, 255, 255)),
    ("AWS", ip(54, 230, 0, 0), ip(54, 239, 255, 255)),
    ("AWS", ip(204, 246, 164, 0), ip(204, 246, 191, 255)),
    ("AWS", ip(205, 251, 192, 0), ip(205, 251, 255, 255)),
    ("Fastly", ip(23, 235, 32, 0), ip(23, 235, 63, 255)),
    ("Fastly", ip(151, 101, 0, 0), ip(151, 101, 255, 255)),
    ("Fastly", ip(199, 232, 0, 0), ip(199, 232, 255, 255)),
    ("Google", ip(35, 186, 0, 0), ip(35, 191, 255, 255)),
    ("Google", ip(130, 211, 0, 0), ip(130, 211, 255, 255)),
    ("Google", ip(35, 244, 0, 0), ip(35, 247, 255, 255)),
    ("Azure", ip(40, 90, 0, 0), ip(40, 91, 255, 255)),
    ("Azure", ip(13, 107, 42, 0), ip(13, 107, 43, 255)),
    ("Azure", ip(204, 79, 197, 0), ip(204, 79, 197, 255)),
    ("KeyCDN", ip(119, 81, 0, 0), ip(119, 81, 255, 255)),
    ("StackPath", ip(94, 31, 0, 0), ip(94, 31, 255, 255)),
    ("Imperva", ip(149, 126, 72, 0), ip(149, 126, 79, 255)),
    ("Imperva", ip(185, 11, 124, 0), ip(185, 11, 127, 255)),
];

fn match_provider(ip_str: &str) -> Option<&'static str> {
    let addr: Ipv4Addr = ip_str.parse().ok()?;
    let value = u32::from(addr);
    CDN_RANGES
        .iter()
        .find(|(_, start, end)| (*start..=*end).contains(&value))
        .map(|(provider, _, _)| *provider)
}

/// Classify an IP set.
///
/// `confidence` is the matched fraction of the input. The named provider
/// is the one matched by the earliest matching input IP, reported only
/// when more than half the set matched something.
pub fn detect(ips: &[String]) -> CdnDetection {
    if ips.is_empty() {
        return CdnDetection::none();
    }

    let mut matches = 0usize;
    let mut first_provider: Option<&'static str> = None;

    for ip_str in ips {
        if let Some(provider) = match_provider(ip_str) {
            matches += 1;
            first_provider.get_or_insert(provider);
        }
    }

    let confidence = matches as f64 / ips.len() as f64;
    CdnDetection {
        provider: if confidence > 0.5 { first_provider } else { None },
        confidence,
        is_any_cdn: confidence > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_input() {
        let detection = detect(&[]);
        assert_eq!(detection.provider, None);
        assert_eq!(detection.confidence, 0.0);
        assert!(!detection.is_any_cdn);
    }

    #[test]
    fn test_full_cloudflare_set() {
        let detection = detect(&ips(&["104.16.0.1", "104.31.255.254"]));
        assert_eq!(detection.provider, Some("Cloudflare"));
        assert_eq!(detection.confidence, 1.0);
        assert!(detection.is_any_cdn);
    }

    #[test]
    fn test_range_boundaries_inclusive() {
        assert_eq!(detect(&ips(&["104.16.0.0"])).provider, Some("Cloudflare"));
        assert_eq!(detect(&ips(&["104.31.255.255"])).provider, Some("Cloudflare"));
        assert!(!detect(&ips(&["104.15.255.255"])).is_any_cdn);
        assert!(!detect(&ips(&["104.32.0.0"])).is_any_cdn);
    }

    #[test]
    fn test_half_match_has_no_provider() {
        // 1 of 2 matched: confidence exactly 0.5, below the naming bar
        let detection = detect(&ips(&["151.101.1.1", "8.8.8.8"]));
        assert_eq!(detection.confidence, 0.5);
        assert_eq!(detection.provider, None);
        assert!(detection.is_any_cdn);
    }

    #[test]
    fn test_majority_match_names_first_provider() {
        let detection = detect(&ips(&["54.230.0.1", "13.33.1.1", "8.8.8.8"]));
        assert!(detection.confidence > 0.5);
        assert_eq!(detection.provider, Some("AWS"));
    }

    #[test]
    fn test_every_provider_present() {
        for (probe, expected) in [
            ("172.64.10.10", "Cloudflare"),
            ("13.226.0.1", "AWS"),
            ("23.235.47.9", "Fastly"),
            ("35.190.0.1", "Google"),
            ("13.107.42.200", "Azure"),
            ("119.81.3.4", "KeyCDN"),
            ("94.31.200.1", "StackPath"),
            ("185.11.125.9", "Imperva"),
        ] {
            let detection = detect(&ips(&[probe]));
            assert_eq!(detection.provider, Some(expected), "{probe}");
        }
    }

    #[test]
    fn test_subset_confidence_monotone() {
        // Growing a set only with table IPs never lowers confidence
        let small = detect(&ips(&["104.16.0.1", "8.8.8.8"]));
        let large = detect(&ips(&["104.16.0.1", "8.8.8.8", "151.101.1.1", "35.186.0.9"]));
        assert!(large.confidence >= small.confidence);
    }

    #[test]
    fn test_garbage_input_does_not_match() {
        let detection = detect(&ips(&["not-an-ip", "::1"]));
        assert!(!detection.is_any_cdn);
    }
}
