//! The four analytic passes over a normalized session set.
//!
//! Each pass is independent and only reads the sessions: efficiency
//! statistics, station ranking, hourly and monthly patterns and power-class
//! shares.

use std::cmp::Ordering;

use charge_core::config::{AnalyzerConfig, PLACEHOLDER_EFFICIENCY};
use charge_core::formatting::percentage;
use charge_core::models::{
    CanonicalSession, EfficiencyRating, HourlyPoint, MonthlyPoint, MonthlyTrend, PerformerEntry,
    StationAggregate, StationIssue, StationTypeShare, Trends,
};
use charge_core::statistics::{endpoint_slope, percentile, round_to, sorted};
use tracing::debug;

use crate::aggregator::{SessionAggregator, SessionStats, StationGroup};

/// Stations listed as top performers / underperformers.
const RANKING_SIZE: usize = 3;
/// Stations below this efficiency may be listed as underperformers.
const UNDERPERFORMANCE_THRESHOLD: f64 = 80.0;
/// Error share above which a station is flagged for frequent errors.
const ERROR_RATIO_THRESHOLD: f64 = 0.10;
const SHORT_SESSION_MINUTES: f64 = 10.0;
const LONG_SESSION_MINUTES: f64 = 480.0;
/// Hours at or above this percentile of volume are peak hours.
const PEAK_PERCENTILE: f64 = 80.0;
const MAX_PEAK_HOURS: usize = 3;
/// Observed months needed before a monthly trend is reported.
const MIN_TREND_MONTHS: usize = 3;

// ── Efficiency ────────────────────────────────────────────────────────────────

/// Delivered energy as a share of what the rated power could deliver over the
/// session, clamped to `[0, 100]`.
///
/// Sessions with no power rating or no duration get
/// [`PLACEHOLDER_EFFICIENCY`]; that value is not a measurement.
pub fn session_efficiency(session: &CanonicalSession) -> f64 {
    if session.power_rating <= 0.0 || session.session_duration <= 0.0 {
        return PLACEHOLDER_EFFICIENCY;
    }
    let theoretical_max = session.power_rating * session.session_duration / 60.0;
    if theoretical_max <= 0.0 {
        return PLACEHOLDER_EFFICIENCY;
    }
    (session.energy_delivered / theoretical_max * 100.0).clamp(0.0, 100.0)
}

/// `true` when [`session_efficiency`] would return a computed value.
pub fn has_measured_efficiency(session: &CanonicalSession) -> bool {
    session.power_rating > 0.0 && session.session_duration > 0.0
}

/// Output of the efficiency pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencySummary {
    /// Mean per-session efficiency, placeholders included.
    pub average: f64,
    pub measured_sessions: usize,
    pub placeholder_sessions: usize,
}

// ── Station ranking ───────────────────────────────────────────────────────────

/// Output of the ranking pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRanking {
    /// Every station, best first.
    pub stations: Vec<StationAggregate>,
    pub top_performers: Vec<PerformerEntry>,
    pub underperformers: Vec<PerformerEntry>,
}

// ── SessionAnalyzer ───────────────────────────────────────────────────────────

/// Runs the analytic passes with one [`AnalyzerConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAnalyzer {
    config: AnalyzerConfig,
}

impl SessionAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Pass (a): arithmetic mean of per-session efficiency.
    pub fn efficiency(&self, sessions: &[CanonicalSession]) -> EfficiencySummary {
        let measured_sessions = sessions.iter().filter(|s| has_measured_efficiency(s)).count();
        let stats = SessionAggregator::overall(sessions);
        EfficiencySummary {
            average: stats.mean_efficiency(),
            measured_sessions,
            placeholder_sessions: sessions.len() - measured_sessions,
        }
    }

    /// Station efficiency from aggregated totals:
    /// `total_energy / (avg_power * avg_duration / 60 * sessions) * 100`.
    ///
    /// A station without a power rating is ranked as if it had
    /// `ranking_default_power_kw`; one without durations gets the placeholder.
    pub fn station_efficiency(&self, stats: &SessionStats) -> f64 {
        let avg_power = match stats.mean_power() {
            p if p > 0.0 => p,
            _ => self.config.ranking_default_power_kw,
        };
        let avg_duration = stats.mean_duration();
        if avg_duration <= 0.0 || stats.count == 0 {
            return PLACEHOLDER_EFFICIENCY;
        }
        let theoretical_max = avg_power * avg_duration / 60.0 * stats.count as f64;
        if theoretical_max <= 0.0 {
            return PLACEHOLDER_EFFICIENCY;
        }
        (stats.total_energy / theoretical_max * 100.0).clamp(0.0, 100.0)
    }

    /// First matching symptom for a low-efficiency station.
    pub fn diagnose(stats: &SessionStats) -> StationIssue {
        if stats.error_ratio() > ERROR_RATIO_THRESHOLD {
            StationIssue::FrequentErrors
        } else if stats.mean_duration() < SHORT_SESSION_MINUTES {
            StationIssue::PrematureEnd
        } else if stats.mean_duration() > LONG_SESSION_MINUTES {
            StationIssue::LongSessions
        } else {
            StationIssue::Degradation
        }
    }

    /// Pass (b): rank stations by aggregated efficiency.
    pub fn rank_stations(&self, sessions: &[CanonicalSession]) -> StationRanking {
        let mut scored: Vec<(StationGroup, f64)> = SessionAggregator::by_station(sessions)
            .into_iter()
            .map(|group| {
                let eff = self.station_efficiency(&group.stats);
                (group, eff)
            })
            .collect();

        // Best first; equal efficiencies fall back to station id.
        scored.sort_by(|(a, ea), (b, eb)| {
            eb.partial_cmp(ea)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.station_id.cmp(&b.station_id))
        });

        let stations: Vec<StationAggregate> = scored
            .iter()
            .map(|(group, eff)| self.to_aggregate(group, *eff))
            .collect();

        let top_performers = stations
            .iter()
            .take(RANKING_SIZE)
            .map(|s| performer(s, None))
            .collect();

        let mut ascending: Vec<&(StationGroup, f64)> = scored.iter().collect();
        ascending.sort_by(|(a, ea), (b, eb)| {
            ea.partial_cmp(eb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.station_id.cmp(&b.station_id))
        });
        let underperformers = ascending
            .into_iter()
            .filter(|(_, eff)| *eff < UNDERPERFORMANCE_THRESHOLD)
            .take(RANKING_SIZE)
            .map(|(group, eff)| {
                let aggregate = self.to_aggregate(group, *eff);
                performer(&aggregate, Some(Self::diagnose(&group.stats)))
            })
            .collect();

        debug!("Ranked {} stations", stations.len());

        StationRanking {
            stations,
            top_performers,
            underperformers,
        }
    }

    fn to_aggregate(&self, group: &StationGroup, efficiency: f64) -> StationAggregate {
        let issue = (efficiency < UNDERPERFORMANCE_THRESHOLD).then(|| Self::diagnose(&group.stats));
        StationAggregate {
            id: group.station_id.clone(),
            location: group
                .location
                .clone()
                .unwrap_or_else(|| group.station_id.clone()),
            sessions: group.stats.count,
            total_energy: group.stats.total_energy,
            avg_duration: round_to(group.stats.mean_duration(), 1),
            avg_power: round_to(group.stats.mean_power(), 1),
            error_ratio: round_to(group.stats.error_ratio(), 3),
            efficiency: round_to(efficiency, 1),
            rating: EfficiencyRating::from_efficiency(efficiency),
            issue,
        }
    }

    /// Pass (c): volume and efficiency per local hour, peak hours, the
    /// weekend/weekday ratio and the monthly series.
    pub fn hourly_patterns(&self, sessions: &[CanonicalSession]) -> Trends {
        let tz = &self.config.timezone;
        let hours = SessionAggregator::by_hour(sessions, tz);

        let hourly: Vec<HourlyPoint> = hours
            .iter()
            .enumerate()
            .map(|(hour, stats)| HourlyPoint {
                hour: hour as u32,
                efficiency: round_to(stats.mean_efficiency(), 1),
                sessions: stats.count,
            })
            .collect();

        // Percentile over all 24 buckets, empty hours included.
        let counts = sorted(hourly.iter().map(|p| p.sessions as f64));
        let threshold = percentile(&counts, PEAK_PERCENTILE);

        let mut peaks: Vec<&HourlyPoint> = hourly
            .iter()
            .filter(|p| p.sessions > 0 && p.sessions as f64 >= threshold)
            .collect();
        peaks.sort_by(|a, b| b.sessions.cmp(&a.sessions).then(a.hour.cmp(&b.hour)));
        let peak_hours = peaks
            .into_iter()
            .take(MAX_PEAK_HOURS)
            .map(|p| format!("{:02}:00", p.hour))
            .collect();

        let (weekday, weekend) = SessionAggregator::weekday_weekend(sessions, tz);
        let weekend_ratio = if weekday == 0 {
            1.0
        } else {
            round_to(weekend as f64 / weekday as f64, 2)
        };

        let (monthly, monthly_trend) = self.monthly_patterns(sessions);

        Trends {
            hourly,
            peak_hours,
            weekend_ratio,
            monthly,
            monthly_trend,
        }
    }

    /// Sessions, delivered energy and mean efficiency per local month, plus
    /// the per-month change once [`MIN_TREND_MONTHS`] months are observed.
    pub fn monthly_patterns(
        &self,
        sessions: &[CanonicalSession],
    ) -> (Vec<MonthlyPoint>, Option<MonthlyTrend>) {
        let months = SessionAggregator::by_month(sessions, &self.config.timezone);

        let trend = (months.len() >= MIN_TREND_MONTHS).then(|| {
            let series = |f: fn(&SessionStats) -> f64| -> f64 {
                let values: Vec<f64> = months.iter().map(|(_, stats)| f(stats)).collect();
                round_to(endpoint_slope(&values), 2)
            };
            MonthlyTrend {
                sessions_per_month: series(|s| s.count as f64),
                energy_per_month: series(|s| s.total_energy),
                efficiency_per_month: series(SessionStats::mean_efficiency),
            }
        });
        if let Some(t) = &trend {
            debug!(
                "Monthly trend over {} months: {:+} sessions/month",
                months.len(),
                t.sessions_per_month
            );
        }

        let points = months
            .into_iter()
            .map(|((year, month), stats)| MonthlyPoint {
                month: format!("{:04}-{:02}", year, month),
                sessions: stats.count,
                energy: stats.total_energy,
                efficiency: round_to(stats.mean_efficiency(), 1),
            })
            .collect();
        (points, trend)
    }

    /// Pass (d): share of sessions and mean efficiency per power class.
    pub fn power_classes(&self, sessions: &[CanonicalSession]) -> Vec<StationTypeShare> {
        let total = sessions.len() as f64;
        SessionAggregator::by_power_class(sessions, self.config.classification_default_power_kw)
            .into_iter()
            .map(|(class, stats)| StationTypeShare {
                name: class.name().to_string(),
                value: percentage(stats.count as f64, total, 1),
                efficiency: round_to(stats.mean_efficiency(), 1),
                color: class.color().to_string(),
            })
            .collect()
    }
}

fn performer(station: &StationAggregate, issue: Option<StationIssue>) -> PerformerEntry {
    PerformerEntry {
        id: station.id.clone(),
        efficiency: station.efficiency,
        location: station.location.clone(),
        issue,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
