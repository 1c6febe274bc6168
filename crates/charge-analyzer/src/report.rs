//! Plain-text rendering of analysis results and the supported-formats table.

use std::fmt::Write as _;

use charge_core::formatting::{format_energy, format_number, format_percent, format_time};
use charge_core::models::{AnalysisResult, CanonicalField, PerformerEntry};
use charge_data::reader::ExportFormat;

// ── Analysis report ───────────────────────────────────────────────────────────

pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let s = &result.summary;

    let _ = writeln!(out, "=== {} ({}) ===", result.file_name, result.id);
    let _ = writeln!(
        out,
        "Generated {}",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push('\n');

    out.push_str("Summary\n");
    let rows = [
        ("Stations", s.total_stations.to_string()),
        ("Sessions", s.total_sessions.to_string()),
        (
            "Date range",
            format!(
                "{} to {} ({} day{})",
                s.date_range.start,
                s.date_range.end,
                s.date_range.days,
                if s.date_range.days == 1 { "" } else { "s" }
            ),
        ),
        ("Energy delivered", format_energy(s.total_energy)),
        ("Avg efficiency", format_percent(s.average_efficiency)),
        (
            "Measured",
            format!(
                "{} session{} ({} placeholder)",
                s.measured_sessions,
                if s.measured_sessions == 1 { "" } else { "s" },
                s.placeholder_sessions
            ),
        ),
        ("Completion rate", format_percent(s.completion_rate)),
        ("Data quality", s.data_quality.label().to_string()),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<18}{}", format!("{}:", label), value);
    }

    render_ranking(&mut out, "Top performers", &result.performance.top_performers);
    render_ranking(&mut out, "Underperformers", &result.performance.underperformers);

    if !result.performance.stations.is_empty() {
        out.push_str("\nStations\n");
        let _ = writeln!(
            out,
            "  {:<12} {:>8} {:>16} {:>10} {:>10} {:>8}  {}",
            "id", "sessions", "energy", "avg time", "avg power", "eff", "rating"
        );
        for st in &result.performance.stations {
            let _ = writeln!(
                out,
                "  {:<12} {:>8} {:>16} {:>10} {:>10} {:>8}  {}",
                st.id,
                st.sessions,
                format_energy(st.total_energy),
                format_time(st.avg_duration),
                format!("{} kW", format_number(st.avg_power, 1)),
                format_percent(st.efficiency),
                st.rating.label()
            );
        }
    }

    out.push_str("\nUsage patterns\n");
    let peaks = if result.trends.peak_hours.is_empty() {
        "none".to_string()
    } else {
        result.trends.peak_hours.join(", ")
    };
    let _ = writeln!(out, "  {:<18}{}", "Peak hours:", peaks);
    let _ = writeln!(
        out,
        "  {:<18}{}",
        "Weekend ratio:",
        format_number(result.trends.weekend_ratio, 2)
    );

    if !result.trends.monthly.is_empty() {
        out.push_str("\nMonthly\n");
        for m in &result.trends.monthly {
            let _ = writeln!(
                out,
                "  {:<8} {:>6} sessions {:>16}  efficiency {}",
                m.month,
                m.sessions,
                format_energy(m.energy),
                format_percent(m.efficiency)
            );
        }
        if let Some(t) = &result.trends.monthly_trend {
            let _ = writeln!(
                out,
                "  Trend: {:+} sessions, {:+} kWh, {:+} pts efficiency per month",
                t.sessions_per_month, t.energy_per_month, t.efficiency_per_month
            );
        }
    }

    if !result.station_types.is_empty() {
        out.push_str("\nStation types\n");
        for share in &result.station_types {
            let _ = writeln!(
                out,
                "  {:<12} {:>7} of sessions, efficiency {}",
                share.name,
                format_percent(share.value),
                format_percent(share.efficiency)
            );
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings\n");
        for w in &result.warnings {
            let _ = writeln!(out, "  - {}", w);
        }
    }

    out
}

fn render_ranking(out: &mut String, title: &str, entries: &[PerformerEntry]) {
    let _ = writeln!(out, "\n{}", title);
    if entries.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for (i, e) in entries.iter().enumerate() {
        let _ = write!(
            out,
            "  {}. {:<12} {:>7}  {}",
            i + 1,
            e.id,
            format_percent(e.efficiency),
            e.location
        );
        if let Some(issue) = e.issue {
            let _ = write!(out, "  ({})", issue.label());
        }
        out.push('\n');
    }
}

// ── Formats listing ───────────────────────────────────────────────────────────

/// Recognised extensions and, per canonical field, its header aliases.
pub fn render_formats() -> String {
    let mut out = String::new();
    out.push_str("Supported file extensions:\n");
    for ext in ExportFormat::supported_extensions() {
        let _ = writeln!(out, "  .{}", ext);
    }
    out.push_str("\nColumn aliases (matched as substrings of the normalized header):\n");
    for field in CanonicalField::all() {
        let required = if CanonicalField::REQUIRED.contains(&field) {
            ""
        } else {
            " (optional)"
        };
        let _ = writeln!(
            out,
            "  {:<18}{}{}",
            field.as_str(),
            field.aliases().join(", "),
            required
        );
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
