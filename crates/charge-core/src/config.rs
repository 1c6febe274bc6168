use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::models::CanonicalSession;
use crate::time_utils::TimezoneHandler;

// ── Engine defaults ───────────────────────────────────────────────────────────

/// Efficiency reported when it cannot be computed (no power, no duration).
pub const PLACEHOLDER_EFFICIENCY: f64 = 80.0;

/// Power assumed for a station with no usable rating when ranking it.
pub const DEFAULT_RANKING_POWER_KW: f64 = 50.0;

/// Power assumed for a session with no usable rating when classifying it.
/// Lands the session in the Level 2 class.
pub const DEFAULT_CLASSIFICATION_POWER_KW: f64 = 7.0;

/// Default number of results a store keeps before pruning.
pub const DEFAULT_RETENTION: usize = 20;

// ── AnalyzerConfig ────────────────────────────────────────────────────────────

/// Tunables for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    /// Zone used for naive timestamps, hour-of-day buckets and date ranges.
    pub timezone: TimezoneHandler,
    pub ranking_default_power_kw: f64,
    pub classification_default_power_kw: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timezone: TimezoneHandler::default(),
            ranking_default_power_kw: DEFAULT_RANKING_POWER_KW,
            classification_default_power_kw: DEFAULT_CLASSIFICATION_POWER_KW,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_timezone(tz_name: &str) -> Self {
        Self {
            timezone: TimezoneHandler::new(tz_name),
            ..Self::default()
        }
    }
}

// ── SessionFilter ─────────────────────────────────────────────────────────────

/// Optional restrictions applied to normalized sessions before analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Inclusive local start date.
    pub start_date: Option<NaiveDate>,
    /// Inclusive local end date.
    pub end_date: Option<NaiveDate>,
    /// Station ids to keep (case-insensitive). Empty keeps every station.
    pub stations: Vec<String>,
    /// Location fragments to keep (case-insensitive substring match).
    /// Sessions without a location never match a non-empty list.
    #[serde(default)]
    pub locations: Vec<String>,
}

impl SessionFilter {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.stations.is_empty()
            && self.locations.is_empty()
    }

    /// Reject a range whose start lies after its end.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AnalyticsError::Config(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// `true` when `session` passes every configured restriction.
    pub fn matches(&self, session: &CanonicalSession, tz: &TimezoneHandler) -> bool {
        if !self.stations.is_empty()
            && !self
                .stations
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(&session.station_id))
        {
            return false;
        }
        if !self.locations.is_empty() && !self.matches_location(session.location.as_deref()) {
            return false;
        }
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        let date = tz.local_date(&session.timestamp);
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }

    fn matches_location(&self, location: Option<&str>) -> bool {
        let Some(location) = location.map(str::to_lowercase) else {
            return false;
        };
        self.locations
            .iter()
            .map(|l| l.trim().to_lowercase())
            .any(|wanted| !wanted.is_empty() && location.contains(&wanted))
    }

    /// Short human-readable summary, e.g. `"2024-01-01..2024-01-31, stations [S1, S2]"`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.start_date.is_some() || self.end_date.is_some() {
            let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
            parts.push(format!("{}..{}", fmt(self.start_date), fmt(self.end_date)));
        }
        if !self.stations.is_empty() {
            parts.push(format!("stations [{}]", self.stations.join(", ")));
        }
        if !self.locations.is_empty() {
            parts.push(format!("locations [{}]", self.locations.join(", ")));
        }
        if parts.is_empty() {
            "no filter".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};

    fn session(station: &str, y: i32, m: u32, d: u32, h: u32) -> CanonicalSession {
        CanonicalSession {
            station_id: station.to_string(),
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            energy_delivered: 10.0,
            session_duration: 30.0,
            power_rating: 22.0,
            status: "completed".to_string(),
            location: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.ranking_default_power_kw, 50.0);
        assert_eq!(config.classification_default_power_kw, 7.0);
        assert_eq!(config.timezone.tz(), chrono_tz::Tz::UTC);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = SessionFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&session("S1", 2024, 1, 1, 0), &TimezoneHandler::default()));
        assert_eq!(filter.describe(), "no filter");
    }

    #[test]
    fn test_station_filter_is_case_insensitive() {
        let filter = SessionFilter {
            stations: vec!["s1".to_string()],
            ..Default::default()
        };
        let tz = TimezoneHandler::default();
        assert!(filter.matches(&session("S1", 2024, 1, 1, 0), &tz));
        assert!(!filter.matches(&session("S2", 2024, 1, 1, 0), &tz));
    }

    #[test]
    fn test_date_filter_is_inclusive() {
        let filter = SessionFilter {
            start_date: Some(date(2024, 1, 2)),
            end_date: Some(date(2024, 1, 3)),
            ..Default::default()
        };
        let tz = TimezoneHandler::default();
        assert!(!filter.matches(&session("S1", 2024, 1, 1, 23), &tz));
        assert!(filter.matches(&session("S1", 2024, 1, 2, 0), &tz));
        assert!(filter.matches(&session("S1", 2024, 1, 3, 23), &tz));
        assert!(!filter.matches(&session("S1", 2024, 1, 4, 0), &tz));
    }

    #[test]
    fn test_date_filter_uses_local_date() {
        let filter = SessionFilter {
            start_date: Some(date(2024, 1, 2)),
            ..Default::default()
        };
        // 23:00 UTC on Jan 1 is already Jan 2 in Berlin.
        let s = session("S1", 2024, 1, 1, 23);
        assert!(!filter.matches(&s, &TimezoneHandler::default()));
        assert!(filter.matches(&s, &TimezoneHandler::new("Europe/Berlin")));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let filter = SessionFilter {
            start_date: Some(date(2024, 2, 1)),
            end_date: Some(date(2024, 1, 1)),
            ..Default::default()
        };
        assert!(matches!(filter.validate(), Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn test_describe() {
        let filter = SessionFilter {
            start_date: Some(date(2024, 1, 1)),
            end_date: None,
            stations: vec!["S1".to_string(), "S2".to_string()],
            locations: Vec::new(),
        };
        assert_eq!(filter.describe(), "2024-01-01.., stations [S1, S2]");

        let filter = SessionFilter {
            locations: vec!["Depot".to_string()],
            ..Default::default()
        };
        assert_eq!(filter.describe(), "locations [Depot]");
    }

    #[test]
    fn test_location_filter_matches_fragment() {
        let filter = SessionFilter {
            locations: vec![" depot ".to_string(), "Mall".to_string()],
            ..Default::default()
        };
        assert!(!filter.is_empty());
        let tz = TimezoneHandler::default();
        let mut s = session("S1", 2024, 1, 1, 0);

        s.location = Some("Depot North".to_string());
        assert!(filter.matches(&s, &tz));
        s.location = Some("City Mall, level 2".to_string());
        assert!(filter.matches(&s, &tz));
        s.location = Some("Highway".to_string());
        assert!(!filter.matches(&s, &tz));
        s.location = None;
        assert!(!filter.matches(&s, &tz));
    }

    #[test]
    fn test_location_and_station_filters_combine() {
        let filter = SessionFilter {
            stations: vec!["S1".to_string()],
            locations: vec!["north".to_string()],
            ..Default::default()
        };
        let tz = TimezoneHandler::default();
        let mut s1 = session("S1", 2024, 1, 1, 0);
        s1.location = Some("Depot North".to_string());
        let mut s2 = session("S2", 2024, 1, 1, 0);
        s2.location = Some("Depot North".to_string());
        assert!(filter.matches(&s1, &tz));
        assert!(!filter.matches(&s2, &tz));
    }
}
