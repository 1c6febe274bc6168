use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Raw input ─────────────────────────────────────────────────────────────────

/// A single cell value exactly as an ingestion adapter extracted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Numeric cell (spreadsheets only; delimited text is always `Text`).
    Number(f64),
    /// Textual cell, untrimmed.
    Text(String),
    /// Blank cell.
    Empty,
}

impl RawValue {
    /// `true` for blank cells and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    /// Render the value as trimmed text (`""` for blank cells).
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

/// One input row: header → value, in the column order of the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(header, value)` pairs.
    pub fn from_pairs<H, V>(pairs: impl IntoIterator<Item = (H, V)>) -> Self
    where
        H: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: RawValue) {
        self.cells.push((header.into(), value));
    }

    pub fn cells(&self) -> &[(String, RawValue)] {
        &self.cells
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ── Canonical schema ──────────────────────────────────────────────────────────

/// The normalized attributes every session record exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    StationId,
    Timestamp,
    EnergyDelivered,
    SessionDuration,
    PowerRating,
    Status,
    /// Optional display attribute; not part of the required set.
    Location,
}

impl CanonicalField {
    /// The six fields checked for presence before normalization.
    pub const REQUIRED: [CanonicalField; 6] = [
        CanonicalField::StationId,
        CanonicalField::Timestamp,
        CanonicalField::EnergyDelivered,
        CanonicalField::SessionDuration,
        CanonicalField::PowerRating,
        CanonicalField::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::StationId => "station_id",
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::EnergyDelivered => "energy_delivered",
            CanonicalField::SessionDuration => "session_duration",
            CanonicalField::PowerRating => "power_rating",
            CanonicalField::Status => "status",
            CanonicalField::Location => "location",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cleaned charging session.
///
/// `station_id` is never empty and `timestamp` is always a valid instant;
/// rows that cannot satisfy both never become a `CanonicalSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSession {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    /// kWh, `>= 0`.
    pub energy_delivered: f64,
    /// Minutes, `>= 0`.
    pub session_duration: f64,
    /// kW; `0` when the source had no usable rating.
    pub power_rating: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Non-fatal diagnostics raised while normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaWarning {
    /// No header in the first row matched any alias of `field`.
    MissingField { field: CanonicalField },
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaWarning::MissingField { field } => {
                write!(f, "no column found for '{}'; values default", field)
            }
        }
    }
}

/// Completeness grade of the canonical fields across all raw rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// `>= 95%` complete.
    Excellent,
    /// `>= 85%` complete.
    Good,
    /// `>= 70%` complete.
    Fair,
    /// Below 70%.
    Poor,
}

impl DataQuality {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            DataQuality::Excellent
        } else if score >= 0.85 {
            DataQuality::Good
        } else if score >= 0.70 {
            DataQuality::Fair
        } else {
            DataQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataQuality::Excellent => "excellent",
            DataQuality::Good => "good",
            DataQuality::Fair => "fair",
            DataQuality::Poor => "poor",
        }
    }
}

// ── Derived aggregates ────────────────────────────────────────────────────────

/// Coarse label attached to a station from its aggregated efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl EfficiencyRating {
    pub fn from_efficiency(efficiency: f64) -> Self {
        if efficiency >= 90.0 {
            EfficiencyRating::Excellent
        } else if efficiency >= 80.0 {
            EfficiencyRating::Good
        } else if efficiency >= 60.0 {
            EfficiencyRating::Fair
        } else {
            EfficiencyRating::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EfficiencyRating::Excellent => "excellent",
            EfficiencyRating::Good => "good",
            EfficiencyRating::Fair => "fair",
            EfficiencyRating::Poor => "poor",
        }
    }
}

/// Heuristic explanation for a low-efficiency station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationIssue {
    #[serde(rename = "frequent errors")]
    FrequentErrors,
    #[serde(rename = "sessions ending prematurely")]
    PrematureEnd,
    #[serde(rename = "unusually long sessions")]
    LongSessions,
    #[serde(rename = "performance degradation")]
    Degradation,
}

impl StationIssue {
    pub fn label(&self) -> &'static str {
        match self {
            StationIssue::FrequentErrors => "frequent errors",
            StationIssue::PrematureEnd => "sessions ending prematurely",
            StationIssue::LongSessions => "unusually long sessions",
            StationIssue::Degradation => "performance degradation",
        }
    }
}

/// Charger class derived from a session's power rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PowerClass {
    /// `<= 22 kW`
    Level2,
    /// `> 22 kW` and `<= 150 kW`
    DcFast,
    /// `> 150 kW`
    UltraFast,
}

impl PowerClass {
    /// Every class in display order.
    pub const ALL: [PowerClass; 3] = [PowerClass::Level2, PowerClass::DcFast, PowerClass::UltraFast];

    pub fn classify(power_kw: f64) -> Self {
        if power_kw <= 22.0 {
            PowerClass::Level2
        } else if power_kw <= 150.0 {
            PowerClass::DcFast
        } else {
            PowerClass::UltraFast
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerClass::Level2 => "Level 2",
            PowerClass::DcFast => "DC Fast",
            PowerClass::UltraFast => "Ultra Fast",
        }
    }

    /// Fixed chart colour.
    pub fn color(&self) -> &'static str {
        match self {
            PowerClass::Level2 => "#3b82f6",
            PowerClass::DcFast => "#10b981",
            PowerClass::UltraFast => "#f59e0b",
        }
    }
}

/// Statistics for all sessions sharing one `station_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationAggregate {
    pub id: String,
    pub location: String,
    pub sessions: usize,
    pub total_energy: f64,
    pub avg_duration: f64,
    pub avg_power: f64,
    /// Share of sessions whose status looks like an error, `0.0..=1.0`.
    pub error_ratio: f64,
    pub efficiency: f64,
    pub rating: EfficiencyRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<StationIssue>,
}

// ── AnalysisResult ────────────────────────────────────────────────────────────

/// Inclusive calendar span covered by the sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_stations: usize,
    pub total_sessions: usize,
    pub date_range: DateRange,
    pub total_energy: f64,
    pub average_efficiency: f64,
    /// Percentage of sessions whose status reports completion.
    pub completion_rate: f64,
    pub data_quality: DataQuality,
    /// Sessions with both power and duration, i.e. a computed efficiency.
    pub measured_sessions: usize,
    /// Sessions that fell back to the placeholder efficiency.
    pub placeholder_sessions: usize,
}

/// One station in a ranking list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformerEntry {
    pub id: String,
    pub efficiency: f64,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<StationIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub top_performers: Vec<PerformerEntry>,
    pub underperformers: Vec<PerformerEntry>,
    pub stations: Vec<StationAggregate>,
}

/// Volume and mean efficiency for one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub hour: u32,
    pub efficiency: f64,
    pub sessions: usize,
}

/// Volume, energy and mean efficiency for one local calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    /// `"YYYY-MM"`.
    pub month: String,
    pub sessions: usize,
    pub energy: f64,
    pub efficiency: f64,
}

/// Change per month from the first to the last observed month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    pub sessions_per_month: f64,
    pub energy_per_month: f64,
    pub efficiency_per_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    pub hourly: Vec<HourlyPoint>,
    /// `"HH:00"` labels in descending-volume order.
    pub peak_hours: Vec<String>,
    pub weekend_ratio: f64,
    /// Observed months in calendar order; months without sessions are absent.
    #[serde(default)]
    pub monthly: Vec<MonthlyPoint>,
    /// Only present with at least three observed months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_trend: Option<MonthlyTrend>,
}

/// Share of sessions in one power class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationTypeShare {
    pub name: String,
    /// Percentage of all sessions.
    pub value: f64,
    pub efficiency: f64,
    pub color: String,
}

/// The engine's sole output for one analysed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Stable identifier derived from the file name and session set.
    pub id: String,
    pub file_name: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub performance: Performance,
    pub trends: Trends,
    pub station_types: Vec<StationTypeShare>,
    #[serde(default)]
    pub warnings: Vec<SchemaWarning>,
}
