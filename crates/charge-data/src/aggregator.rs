//! Grouping of normalized sessions by station, hour of day, month and power
//! class.

use std::collections::BTreeMap;

use chrono::Datelike;

use charge_core::models::{CanonicalSession, PowerClass};
use charge_core::time_utils::TimezoneHandler;

use crate::analyzer::session_efficiency;

const ERROR_MARKERS: &[&str] = &["error", "fault", "fail", "abort"];
const COMPLETION_MARKERS: &[&str] = &["complet", "success", "finish", "done", "charged"];

/// `true` when `status` reads like a failed session.
pub fn is_error_status(status: &str) -> bool {
    let lower = status.to_lowercase();
    ERROR_MARKERS.iter().any(|m| lower.contains(m))
}

/// `true` when `status` reads like a completed session.
pub fn is_completed_status(status: &str) -> bool {
    let lower = status.to_lowercase();
    COMPLETION_MARKERS.iter().any(|m| lower.contains(m))
}

// ── SessionStats ──────────────────────────────────────────────────────────────

/// Running totals over a group of sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub count: usize,
    pub total_energy: f64,
    pub total_duration: f64,
    pub total_power: f64,
    /// Sum of per-session efficiencies (placeholders included).
    pub efficiency_sum: f64,
    pub error_count: usize,
    pub completed_count: usize,
}

impl SessionStats {
    pub fn add_session(&mut self, session: &CanonicalSession) {
        self.count += 1;
        self.total_energy += session.energy_delivered;
        self.total_duration += session.session_duration;
        self.total_power += session.power_rating;
        self.efficiency_sum += session_efficiency(session);
        if is_error_status(&session.status) {
            self.error_count += 1;
        }
        if is_completed_status(&session.status) {
            self.completed_count += 1;
        }
    }

    fn ratio(total: f64, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    pub fn mean_duration(&self) -> f64 {
        Self::ratio(self.total_duration, self.count)
    }

    pub fn mean_power(&self) -> f64 {
        Self::ratio(self.total_power, self.count)
    }

    /// Mean per-session efficiency; `0.0` for an empty group.
    pub fn mean_efficiency(&self) -> f64 {
        Self::ratio(self.efficiency_sum, self.count)
    }

    pub fn error_ratio(&self) -> f64 {
        Self::ratio(self.error_count as f64, self.count)
    }
}

impl<'a> FromIterator<&'a CanonicalSession> for SessionStats {
    fn from_iter<I: IntoIterator<Item = &'a CanonicalSession>>(iter: I) -> Self {
        let mut stats = SessionStats::default();
        for s in iter {
            stats.add_session(s);
        }
        stats
    }
}

// ── StationGroup ──────────────────────────────────────────────────────────────

/// All sessions of one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationGroup {
    pub station_id: String,
    /// First non-empty location seen for the station.
    pub location: Option<String>,
    pub stats: SessionStats,
}

// ── SessionAggregator ─────────────────────────────────────────────────────────

/// Stateless helper that groups sessions.
pub struct SessionAggregator;

impl SessionAggregator {
    /// Totals over every session.
    pub fn overall(sessions: &[CanonicalSession]) -> SessionStats {
        sessions.iter().collect()
    }

    /// One group per distinct station id, sorted by id.
    pub fn by_station(sessions: &[CanonicalSession]) -> Vec<StationGroup> {
        let mut groups: BTreeMap<&str, StationGroup> = BTreeMap::new();
        for s in sessions {
            let group = groups
                .entry(s.station_id.as_str())
                .or_insert_with(|| StationGroup {
                    station_id: s.station_id.clone(),
                    location: None,
                    stats: SessionStats::default(),
                });
            if group.location.is_none() {
                group.location = s.location.clone().filter(|l| !l.is_empty());
            }
            group.stats.add_session(s);
        }
        groups.into_values().collect()
    }

    /// Exactly 24 buckets indexed by local hour of day.
    pub fn by_hour(sessions: &[CanonicalSession], tz: &TimezoneHandler) -> Vec<SessionStats> {
        let mut hours = vec![SessionStats::default(); 24];
        for s in sessions {
            let hour = tz.local_hour(&s.timestamp) as usize;
            hours[hour.min(23)].add_session(s);
        }
        hours
    }

    /// One bucket per local `(year, month)` that has sessions, in calendar
    /// order.
    pub fn by_month(
        sessions: &[CanonicalSession],
        tz: &TimezoneHandler,
    ) -> Vec<((i32, u32), SessionStats)> {
        let mut months: BTreeMap<(i32, u32), SessionStats> = BTreeMap::new();
        for s in sessions {
            let date = tz.local_date(&s.timestamp);
            months
                .entry((date.year(), date.month()))
                .or_default()
                .add_session(s);
        }
        months.into_iter().collect()
    }

    /// One bucket per power class in [`PowerClass::ALL`] order.
    ///
    /// Sessions without a rating count as `default_power_kw`.
    pub fn by_power_class(
        sessions: &[CanonicalSession],
        default_power_kw: f64,
    ) -> Vec<(PowerClass, SessionStats)> {
        let mut classes: BTreeMap<PowerClass, SessionStats> = PowerClass::ALL
            .iter()
            .map(|c| (*c, SessionStats::default()))
            .collect();
        for s in sessions {
            let power = if s.power_rating > 0.0 {
                s.power_rating
            } else {
                default_power_kw
            };
            classes
                .entry(PowerClass::classify(power))
                .or_default()
                .add_session(s);
        }
        classes.into_iter().collect()
    }

    /// Session counts split into `(weekday, weekend)` by local date.
    pub fn weekday_weekend(sessions: &[CanonicalSession], tz: &TimezoneHandler) -> (usize, usize) {
        sessions.iter().fold((0, 0), |(weekday, weekend), s| {
            if tz.is_weekend(&s.timestamp) {
                (weekday, weekend + 1)
            } else {
                (weekday + 1, weekend)
            }
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
