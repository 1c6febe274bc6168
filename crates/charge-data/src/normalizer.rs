//! Raw rows → canonical sessions.

use charge_core::coercion::{coerce_duration, coerce_number, coerce_timestamp};
use charge_core::error::{AnalyticsError, Result};
use charge_core::fields::ColumnMap;
use charge_core::models::{CanonicalField, CanonicalSession, DataQuality, RawRow, SchemaWarning};
use charge_core::time_utils::TimezoneHandler;
use tracing::{debug, warn};

const REQUIRED_WEIGHT: f64 = 0.7;
const OPTIONAL_WEIGHT: f64 = 0.3;

const IDENTITY_FIELDS: [CanonicalField; 2] = [CanonicalField::StationId, CanonicalField::Timestamp];
const MEASURE_FIELDS: [CanonicalField; 4] = [
    CanonicalField::EnergyDelivered,
    CanonicalField::SessionDuration,
    CanonicalField::PowerRating,
    CanonicalField::Status,
];

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizationReport {
    /// Surviving sessions, in input order.
    pub sessions: Vec<CanonicalSession>,
    pub warnings: Vec<SchemaWarning>,
    pub rows_read: usize,
    /// Rows without a station id or a valid timestamp.
    pub rows_dropped: usize,
    pub quality_score: f64,
    pub quality: DataQuality,
}

/// Applies field resolution and scalar coercion to raw rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowNormalizer {
    tz: TimezoneHandler,
}

impl RowNormalizer {
    pub fn new(tz: TimezoneHandler) -> Self {
        Self { tz }
    }

    /// Required fields absent from the first row's headers, as warnings.
    pub fn check_schema(rows: &[RawRow]) -> Vec<SchemaWarning> {
        let Some(first) = rows.first() else {
            return Vec::new();
        };
        ColumnMap::for_row(first)
            .missing_required()
            .into_iter()
            .map(|field| SchemaWarning::MissingField { field })
            .collect()
    }

    /// Normalize one row; `None` when it has no station id or no valid
    /// timestamp.
    pub fn normalize_row(&self, row: &RawRow) -> Option<CanonicalSession> {
        self.normalize_mapped(&ColumnMap::for_row(row), row)
    }

    /// Like [`normalize_row`](Self::normalize_row), with columns already
    /// resolved for the row's layout.
    pub fn normalize_mapped(&self, columns: &ColumnMap, row: &RawRow) -> Option<CanonicalSession> {
        let station_id = columns.value(row, CanonicalField::StationId)?.to_text();
        if station_id.is_empty() {
            return None;
        }
        let timestamp = coerce_timestamp(columns.value(row, CanonicalField::Timestamp), &self.tz)?;

        let energy_delivered =
            coerce_number(columns.value(row, CanonicalField::EnergyDelivered), 0.0).max(0.0);
        let session_duration =
            coerce_duration(columns.value(row, CanonicalField::SessionDuration), 0.0).max(0.0);
        let power_rating =
            coerce_number(columns.value(row, CanonicalField::PowerRating), 0.0).max(0.0);
        let status = columns
            .value(row, CanonicalField::Status)
            .map(|v| v.to_text())
            .unwrap_or_else(|| "unknown".to_string());
        let location = columns.value(row, CanonicalField::Location).map(|v| v.to_text());

        Some(CanonicalSession {
            station_id,
            timestamp,
            energy_delivered,
            session_duration,
            power_rating,
            status,
            location,
        })
    }

    /// Normalize every row of `file_name`.
    ///
    /// Missing columns only produce warnings. Fails with
    /// [`AnalyticsError::EmptyDataset`] when no row survives.
    pub fn normalize(&self, file_name: &str, rows: &[RawRow]) -> Result<NormalizationReport> {
        let warnings = Self::check_schema(rows);
        for w in &warnings {
            warn!("{}: {}", file_name, w);
        }

        let columns = rows.first().map(ColumnMap::for_row).unwrap_or_default();
        let sessions: Vec<CanonicalSession> = rows
            .iter()
            .filter_map(|row| self.normalize_mapped(&columns, row))
            .collect();
        let rows_dropped = rows.len() - sessions.len();

        if sessions.is_empty() {
            let reason = if rows.is_empty() {
                format!("{} contains no data rows", file_name)
            } else {
                format!(
                    "none of the {} rows in {} had both a station id and a valid timestamp",
                    rows.len(),
                    file_name
                )
            };
            return Err(AnalyticsError::EmptyDataset(reason));
        }
        if rows_dropped > 0 {
            warn!(
                "{}: dropped {} of {} rows without station id or valid timestamp",
                file_name,
                rows_dropped,
                rows.len()
            );
        }

        let quality_score = completeness_score(&columns, rows);
        debug!(
            "{}: normalized {} sessions, completeness {:.3}",
            file_name,
            sessions.len(),
            quality_score
        );

        Ok(NormalizationReport {
            sessions,
            warnings,
            rows_read: rows.len(),
            rows_dropped,
            quality_score,
            quality: DataQuality::from_score(quality_score),
        })
    }
}

/// Weighted share of canonical cells that are present and non-empty.
pub fn completeness_score(columns: &ColumnMap, rows: &[RawRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let filled = |fields: &[CanonicalField]| -> f64 {
        let hits = rows
            .iter()
            .flat_map(|row| fields.iter().map(move |f| columns.value(row, *f)))
            .filter(Option::is_some)
            .count();
        hits as f64 / (rows.len() * fields.len()) as f64
    };
    REQUIRED_WEIGHT * filled(&IDENTITY_FIELDS) + OPTIONAL_WEIGHT * filled(&MEASURE_FIELDS)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use charge_core::models::RawValue;
    use chrono::Timelike;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    fn full_row(station: &str, ts: &str) -> RawRow {
        row(&[
            ("station_id", station),
            ("timestamp", ts),
            ("energy_delivered", "20"),
            ("session_duration", "30"),
            ("power_rating", "50"),
            ("status", "completed"),
        ])
    }

    #[test]
    fn test_normalize_row_full() {
        let s = RowNormalizer::default()
            .normalize_row(&full_row("S1", "2024-01-15T10:00:00Z"))
            .unwrap();
        assert_eq!(s.station_id, "S1");
        assert_eq!(s.timestamp.hour(), 10);
        assert_eq!(s.energy_delivered, 20.0);
        assert_eq!(s.session_duration, 30.0);
        assert_eq!(s.power_rating, 50.0);
        assert_eq!(s.status, "completed");
        assert!(s.location.is_none());
    }

    #[test]
    fn test_normalize_row_defaults() {
        let s = RowNormalizer::default()
            .normalize_row(&row(&[("Station", "S1"), ("Date", "2024-01-15")]))
            .unwrap();
        assert_eq!(s.energy_delivered, 0.0);
        assert_eq!(s.session_duration, 0.0);
        assert_eq!(s.power_rating, 0.0);
        assert_eq!(s.status, "unknown");
    }

    #[test]
    fn test_normalize_row_clamps_negatives() {
        let s = RowNormalizer::default()
            .normalize_row(&row(&[
                ("station", "S1"),
                ("start", "2024-01-15 10:00"),
                ("energy", "-4"),
                ("duration", "-10"),
                ("power", "-7"),
            ]))
            .unwrap();
        assert_eq!(s.energy_delivered, 0.0);
        assert_eq!(s.session_duration, 0.0);
        assert_eq!(s.power_rating, 0.0);
    }

    #[test]
    fn test_normalize_row_duration_string_and_location() {
        let s = RowNormalizer::default()
            .normalize_row(&row(&[
                ("station", "S1"),
                ("start_time", "2024-01-15 10:00"),
                ("charging_time", "1h 30m"),
                ("city", "Oslo"),
            ]))
            .unwrap();
        assert_eq!(s.session_duration, 90.0);
        assert_eq!(s.location.as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_normalize_row_numeric_station_id() {
        let mut r = RawRow::new();
        r.push("station_id", RawValue::Number(42.0));
        r.push("timestamp", RawValue::Text("2024-01-15".to_string()));
        let s = RowNormalizer::default().normalize_row(&r).unwrap();
        assert_eq!(s.station_id, "42");
    }

    #[test]
    fn test_rows_without_station_or_timestamp_are_dropped() {
        let rows = vec![
            full_row("S1", "2024-01-15T10:00:00Z"),
            full_row("", "2024-01-15T10:00:00Z"),
            full_row("S3", "not a date"),
        ];
        let report = RowNormalizer::default().normalize("a.csv", &rows).unwrap();
        assert_eq!(report.sessions.len(), 1);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_dropped, 2);
        assert!(report
            .sessions
            .iter()
            .all(|s| !s.station_id.is_empty()));
    }

    #[test]
    fn test_all_timestamps_unparseable_is_empty_dataset() {
        let rows = vec![full_row("S1", "soon"), full_row("S2", "")];
        let err = RowNormalizer::default().normalize("a.csv", &rows).unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyDataset(_)));
    }

    #[test]
    fn test_no_rows_is_empty_dataset() {
        let err = RowNormalizer::default().normalize("a.csv", &[]).unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn test_missing_columns_warn_but_proceed() {
        let rows = vec![row(&[("station", "S1"), ("date", "2024-01-15")])];
        let report = RowNormalizer::default().normalize("a.csv", &rows).unwrap();
        let missing: Vec<CanonicalField> = report
            .warnings
            .iter()
            .map(|w| match w {
                SchemaWarning::MissingField { field } => *field,
            })
            .collect();
        assert_eq!(
            missing,
            vec![
                CanonicalField::EnergyDelivered,
                CanonicalField::SessionDuration,
                CanonicalField::PowerRating,
                CanonicalField::Status,
            ]
        );
        assert_eq!(report.sessions.len(), 1);
    }

    #[test]
    fn test_quality_grades() {
        let complete = vec![full_row("S1", "2024-01-15T10:00:00Z")];
        let report = RowNormalizer::default().normalize("a.csv", &complete).unwrap();
        assert!((report.quality_score - 1.0).abs() < 1e-9);
        assert_eq!(report.quality, DataQuality::Excellent);

        // identity only: 0.7 * 1 + 0.3 * 0
        let sparse = vec![row(&[("station", "S1"), ("date", "2024-01-15")])];
        let report = RowNormalizer::default().normalize("a.csv", &sparse).unwrap();
        assert!((report.quality_score - 0.7).abs() < 1e-9);
        assert_eq!(report.quality, DataQuality::Fair);
    }

    #[test]
    fn test_charging_time_column_is_not_taken_as_start() {
        let rows = vec![
            row(&[
                ("Station", "S1"),
                ("Session Start", "2024-01-15 08:30"),
                ("Charging Time", "45"),
                ("Energy", "18"),
            ]),
            row(&[
                ("Station", "S2"),
                ("Session Start", "2024-01-15 09:15"),
                ("Charging Time", "1:30"),
                ("Energy", "30"),
            ]),
        ];
        let report = RowNormalizer::default().normalize("a.csv", &rows).unwrap();
        assert_eq!(report.sessions.len(), 2);
        assert_eq!(report.sessions[0].timestamp.hour(), 8);
        assert_eq!(report.sessions[0].session_duration, 45.0);
        assert_eq!(report.sessions[1].session_duration, 90.0);
        assert_eq!(report.sessions[1].energy_delivered, 30.0);
    }

    #[test]
    fn test_large_export_resolves_columns_once() {
        let rows: Vec<RawRow> = (0..50_000)
            .map(|i| {
                let station = format!("S{}", i % 40);
                let ts = format!("2024-01-{:02} {:02}:00", i % 28 + 1, i % 24);
                full_row(&station, &ts)
            })
            .collect();
        let started = std::time::Instant::now();
        let report = RowNormalizer::default().normalize("big.csv", &rows).unwrap();
        assert_eq!(report.sessions.len(), 50_000);
        assert!((report.quality_score - 1.0).abs() < 1e-9);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_naive_timestamps_use_configured_zone() {
        let normalizer = RowNormalizer::new(TimezoneHandler::new("Europe/Berlin"));
        let s = normalizer
            .normalize_row(&full_row("S1", "2024-07-01 12:00:00"))
            .unwrap();
        // CEST is UTC+2.
        assert_eq!(s.timestamp.hour(), 10);
    }
}
