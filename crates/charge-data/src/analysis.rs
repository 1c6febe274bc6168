//! Analysis pipeline: adapter → normalizer → filter → analytic passes →
//! [`AnalysisResult`].

use std::path::Path;

use chrono::{DateTime, Utc};
use charge_core::config::{AnalyzerConfig, SessionFilter};
use charge_core::error::{AnalyticsError, Result};
use charge_core::formatting::percentage;
use charge_core::models::{
    AnalysisResult, CanonicalSession, DataQuality, DateRange, Performance, RawRow, SchemaWarning,
    Summary,
};
use charge_core::statistics::round_to;
use tracing::{debug, info};

use crate::aggregator::SessionAggregator;
use crate::analyzer::SessionAnalyzer;
use crate::normalizer::RowNormalizer;
use crate::reader::{read_rows, ExportFormat};

// ── Options ───────────────────────────────────────────────────────────────────

/// Everything one run needs besides the input itself.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub config: AnalyzerConfig,
    pub filter: SessionFilter,
}

// ── ReportAssembler ───────────────────────────────────────────────────────────

/// Combines the analytic passes into one [`AnalysisResult`].
///
/// Pure with respect to its inputs: the same sessions, warnings and
/// `generated_at` always produce an identical result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler {
    analyzer: SessionAnalyzer,
}

impl ReportAssembler {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            analyzer: SessionAnalyzer::new(config),
        }
    }

    pub fn assemble(
        &self,
        file_name: &str,
        sessions: &[CanonicalSession],
        warnings: Vec<SchemaWarning>,
        data_quality: DataQuality,
        generated_at: DateTime<Utc>,
    ) -> Result<AnalysisResult> {
        let date_range = self.date_range(sessions).ok_or_else(|| {
            AnalyticsError::EmptyDataset(format!("{} has no sessions to analyze", file_name))
        })?;

        let efficiency = self.analyzer.efficiency(sessions);
        let ranking = self.analyzer.rank_stations(sessions);
        let trends = self.analyzer.hourly_patterns(sessions);
        let station_types = self.analyzer.power_classes(sessions);

        let totals = SessionAggregator::overall(sessions);
        let summary = Summary {
            total_stations: ranking.stations.len(),
            total_sessions: totals.count,
            date_range,
            total_energy: totals.total_energy,
            average_efficiency: round_to(efficiency.average, 1),
            completion_rate: percentage(totals.completed_count as f64, totals.count as f64, 1),
            data_quality,
            measured_sessions: efficiency.measured_sessions,
            placeholder_sessions: efficiency.placeholder_sessions,
        };

        Ok(AnalysisResult {
            id: analysis_id(file_name, sessions),
            file_name: file_name.to_string(),
            generated_at,
            summary,
            performance: Performance {
                top_performers: ranking.top_performers,
                underperformers: ranking.underperformers,
                stations: ranking.stations,
            },
            trends,
            station_types,
            warnings,
        })
    }

    /// Local-date span of `sessions`; `None` when empty.
    fn date_range(&self, sessions: &[CanonicalSession]) -> Option<DateRange> {
        let tz = &self.analyzer.config().timezone;
        let first = sessions.iter().map(|s| s.timestamp).min()?;
        let last = sessions.iter().map(|s| s.timestamp).max()?;
        let start = tz.local_date(&first);
        let end = tz.local_date(&last);
        Some(DateRange {
            start,
            end,
            days: (end - start).num_days() + 1,
        })
    }
}

/// Initial state of the high half of [`analysis_id`].
const ID_HIGH_SEED: u32 = 0x9e37_79b9;

/// Stable identifier over the file name and every session's content.
///
/// Two CRC-32 (IEEE) digests of the same byte stream, one from the standard
/// initial state and one seeded, form the 64-bit id. Strings are written
/// NUL-terminated and numbers little-endian, so the id only depends on the
/// input and never on the toolchain.
pub fn analysis_id(file_name: &str, sessions: &[CanonicalSession]) -> String {
    let mut low = crc32fast::Hasher::new();
    let mut high = crc32fast::Hasher::new_with_initial(ID_HIGH_SEED);
    let mut feed = |bytes: &[u8]| {
        low.update(bytes);
        high.update(bytes);
    };

    feed(file_name.as_bytes());
    feed(&[0]);
    feed(&(sessions.len() as u64).to_le_bytes());
    for s in sessions {
        feed(s.station_id.as_bytes());
        feed(&[0]);
        feed(&s.timestamp.timestamp_millis().to_le_bytes());
        feed(&s.energy_delivered.to_le_bytes());
        feed(&s.session_duration.to_le_bytes());
        feed(&s.power_rating.to_le_bytes());
        feed(s.status.as_bytes());
        feed(&[0]);
    }

    let id = (u64::from(high.finalize()) << 32) | u64::from(low.finalize());
    format!("analysis-{:016x}", id)
}

/// Keep sessions passing `filter`.
///
/// Fails with [`AnalyticsError::EmptyDataset`] when a non-empty filter drops
/// every session.
pub fn apply_filter(
    sessions: Vec<CanonicalSession>,
    filter: &SessionFilter,
    config: &AnalyzerConfig,
) -> Result<Vec<CanonicalSession>> {
    if filter.is_empty() {
        return Ok(sessions);
    }
    let before = sessions.len();
    let kept: Vec<CanonicalSession> = sessions
        .into_iter()
        .filter(|s| filter.matches(s, &config.timezone))
        .collect();
    debug!("Filter ({}) kept {} of {} sessions", filter.describe(), kept.len(), before);
    if kept.is_empty() {
        return Err(AnalyticsError::EmptyDataset(format!(
            "filters ({}) removed all {} sessions",
            filter.describe(),
            before
        )));
    }
    Ok(kept)
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Analyze already-extracted rows.
pub fn analyze_rows(
    file_name: &str,
    rows: &[RawRow],
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisResult> {
    options.filter.validate()?;
    let report = RowNormalizer::new(options.config.timezone).normalize(file_name, rows)?;
    let sessions = apply_filter(report.sessions, &options.filter, &options.config)?;

    let result = ReportAssembler::new(options.config).assemble(
        file_name,
        &sessions,
        report.warnings,
        report.quality,
        generated_at,
    )?;
    info!(
        "{}: {} sessions across {} stations ({} rows dropped)",
        file_name, result.summary.total_sessions, result.summary.total_stations, report.rows_dropped
    );
    Ok(result)
}

/// Analyze the bytes of one export.
///
/// 1. Run the adapter for `format`.
/// 2. Normalize, filter and analyze via [`analyze_rows`].
pub fn analyze_export(
    file_name: &str,
    format: ExportFormat,
    bytes: Vec<u8>,
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> Result<AnalysisResult> {
    let rows = read_rows(file_name, format, bytes)?;
    analyze_rows(file_name, &rows, options, generated_at)
}

/// Read and analyze one file synchronously, stamped with the current time.
///
/// The format is decided from the extension before the file is opened.
pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<AnalysisResult> {
    let format = ExportFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| AnalyticsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    analyze_export(&display_name(path), format, bytes, options, Utc::now())
}

/// File name component of `path`, or the whole path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
