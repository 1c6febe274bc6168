use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{AnalyzerConfig, SessionFilter, DEFAULT_RETENTION};
use crate::error::{AnalyticsError, Result};
use crate::time_utils::{resolve_timezone, TimezoneHandler};

const APP_DIR: &str = ".charge-analyzer";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Analyze EV charging-session exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "charge-analyzer",
    about = "Efficiency, ranking and usage analytics for EV charging-session exports",
    version
)]
pub struct Settings {
    /// Export files or directories to analyze
    #[arg(value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Timezone used for naive timestamps and hour-of-day buckets
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Only include sessions on or after this local date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Only include sessions on or before this local date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Only include these station ids (repeatable)
    #[arg(long = "station")]
    pub stations: Vec<String>,

    /// Only include sessions whose location contains this text (repeatable)
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Save results to the result store
    #[arg(long)]
    pub save: bool,

    /// Result store directory
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Number of saved results to keep (1-1000)
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub retain: u32,

    /// List supported file formats and column aliases, then exit
    #[arg(long)]
    pub list_formats: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.charge-analyzer/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain: Option<u32>,
}

impl LastUsedParams {
    /// `~/.charge-analyzer/last_used.json`
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&home_dir())
    }

    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR).join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Write via a temp file and rename, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn clear_at(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments, merging last-used values for anything not
    /// given explicitly, and persist the merged values.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument
    /// list and config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("could not clear {}: {}", config_path.display(), e);
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // clap ids are field names, not flag spellings.
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output") {
            if let Some(v) = last.output {
                settings.output = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "retain") {
            if let Some(v) = last.retain {
                settings.retain = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        if let Err(e) = LastUsedParams::from(&settings).save_to(config_path) {
            tracing::debug!("could not persist last-used params: {}", e);
        }

        settings
    }

    /// Resolve `"auto"` timezone and apply `--debug`.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        settings.timezone = resolve_timezone(&settings.timezone);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The resolved `--timezone`; an unknown zone is a config error.
    fn analysis_timezone(&self) -> Result<String> {
        let name = resolve_timezone(&self.timezone);
        if !TimezoneHandler::validate_timezone(&name) {
            return Err(AnalyticsError::Config(format!("unknown timezone \"{}\"", name)));
        }
        Ok(name)
    }

    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        Ok(AnalyzerConfig::with_timezone(&self.analysis_timezone()?))
    }

    /// The session filter described by `--start-date`, `--end-date`,
    /// `--station` and `--location`, validated. Dates are local to
    /// `--timezone`, so the zone is checked too.
    pub fn session_filter(&self) -> Result<SessionFilter> {
        self.analysis_timezone()?;
        let filter = SessionFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            stations: trimmed(&self.stations),
            locations: trimmed(&self.locations),
        };
        filter.validate()?;
        Ok(filter)
    }

    /// `--store-dir`, or `~/.charge-analyzer/results`.
    pub fn store_path(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(APP_DIR).join("results"))
    }

    pub fn retention(&self) -> usize {
        usize::try_from(self.retain).unwrap_or(DEFAULT_RETENTION)
    }

    pub fn wants_json(&self) -> bool {
        self.output == "json"
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            timezone: Some(s.timezone.clone()),
            output: Some(s.output.clone()),
            retain: Some(s.retain),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
