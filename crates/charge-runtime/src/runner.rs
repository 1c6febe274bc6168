//! Async front end to the analysis pipeline.
//!
//! File contents are loaded with `tokio::fs` and the CPU-bound pipeline runs
//! on the blocking pool, so several exports can be analysed concurrently
//! from one tokio runtime. Successful results are handed to an optional
//! injected [`ResultStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use charge_core::error::{AnalyticsError, Result};
use charge_core::models::AnalysisResult;
use charge_data::analysis::{analyze_export, display_name, AnalysisOptions};
use charge_data::reader::ExportFormat;
use chrono::Utc;

use crate::store::ResultStore;

// ── FileOutcome ───────────────────────────────────────────────────────────────

/// Result of analysing one input of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<AnalysisResult>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

// ── AnalysisRunner ────────────────────────────────────────────────────────────

/// Runs the pipeline for one or many files.
///
/// Cheap to clone; clones share the options and the store.
#[derive(Clone)]
pub struct AnalysisRunner {
    options: Arc<AnalysisOptions>,
    store: Option<Arc<dyn ResultStore>>,
}

impl AnalysisRunner {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options: Arc::new(options),
            store: None,
        }
    }

    /// Put every successful result into `store`.
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Analyse one file.
    ///
    /// The extension is checked before any I/O. A store failure fails the
    /// file even though the analysis itself succeeded.
    pub async fn analyze_path(&self, path: &Path) -> Result<AnalysisResult> {
        let format = ExportFormat::from_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AnalyticsError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("read {} bytes from {}", bytes.len(), path.display());

        let file_name = display_name(path);
        let options = Arc::clone(&self.options);
        let store = self.store.clone();
        let generated_at = Utc::now();

        tokio::task::spawn_blocking(move || -> Result<AnalysisResult> {
            let result = analyze_export(&file_name, format, bytes, &options, generated_at)?;
            if let Some(store) = store {
                store.put(result.clone())?;
            }
            Ok(result)
        })
        .await
        .map_err(|e| AnalyticsError::Task(format!("{}: {}", path.display(), e)))?
    }

    /// Analyse every path concurrently, one task per file.
    ///
    /// Outcomes are returned in input order and never short-circuit: a
    /// failing file does not affect the others.
    pub async fn analyze_many(&self, paths: Vec<PathBuf>) -> Vec<FileOutcome> {
        tracing::info!("analysing {} file(s)", paths.len());

        let handles: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let runner = self.clone();
                let task_path = path.clone();
                let handle = tokio::spawn(async move { runner.analyze_path(&task_path).await });
                (path, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AnalyticsError::Task(format!("{}: {}", path.display(), e))),
            };
            if let Err(e) = &result {
                tracing::warn!("{}: {}", path.display(), e);
            }
            outcomes.push(FileOutcome { path, result });
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        tracing::info!("finished {} file(s), {} failed", outcomes.len(), failed);
        outcomes
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryResultStore};
    use charge_core::config::SessionFilter;
    use tempfile::TempDir;

    const EXPORT: &str = "station_id,timestamp,energy_delivered,session_duration,power_rating,status\n\
S1,2024-01-15T08:00:00Z,20,30,50,completed\n\
S2,2024-01-15T09:00:00Z,5,60,22,error\n";

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_analyze_path_success() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "fleet.csv", EXPORT);
        let result = AnalysisRunner::new(AnalysisOptions::default())
            .analyze_path(&path)
            .await
            .unwrap();
        assert_eq!(result.file_name, "fleet.csv");
        assert_eq!(result.summary.total_sessions, 2);
        assert_eq!(result.summary.total_stations, 2);
    }

    #[tokio::test]
    async fn test_unsupported_extension_checked_before_read() {
        let result = AnalysisRunner::new(AnalysisOptions::default())
            .analyze_path(Path::new("/does/not/exist/report.pdf"))
            .await;
        assert!(matches!(
            result,
            Err(AnalyticsError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_file_read_error() {
        let dir = TempDir::new().unwrap();
        let result = AnalysisRunner::new(AnalysisOptions::default())
            .analyze_path(&dir.path().join("absent.csv"))
            .await;
        assert!(matches!(result, Err(AnalyticsError::FileRead { .. })));
    }

    #[tokio::test]
    async fn test_analyze_many_reports_each_file() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.csv", EXPORT);
        let empty = write(&dir, "empty.csv", "station_id,timestamp\n");
        let other = write(&dir, "other.tsv", &EXPORT.replace(',', "\t"));

        let outcomes = AnalysisRunner::new(AnalysisOptions::default())
            .analyze_many(vec![good.clone(), empty.clone(), other.clone()])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].path, good);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].path, empty);
        assert!(matches!(
            outcomes[1].result,
            Err(AnalyticsError::EmptyDataset(_))
        ));
        assert_eq!(outcomes[2].path, other);
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn test_results_go_to_injected_store() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "fleet.csv", EXPORT);
        let store = Arc::new(MemoryResultStore::new(5));
        let runner = AnalysisRunner::new(AnalysisOptions::default()).with_store(store.clone());

        let result = runner.analyze_path(&path).await.unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&result.id).unwrap(), Some(result));
    }

    #[tokio::test]
    async fn test_failed_files_are_not_stored() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path().join("results"), 5).unwrap());
        let bad = write(&dir, "bad.csv", "station_id,timestamp\nS1,never\n");
        let runner = AnalysisRunner::new(AnalysisOptions::default()).with_store(store.clone());

        let outcomes = runner.analyze_many(vec![bad]).await;
        assert!(!outcomes[0].is_ok());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_filter_options_are_applied() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "fleet.csv", EXPORT);
        let options = AnalysisOptions {
            filter: SessionFilter {
                stations: vec!["s2".to_string()],
                ..SessionFilter::default()
            },
            ..AnalysisOptions::default()
        };
        let result = AnalysisRunner::new(options).analyze_path(&path).await.unwrap();
        assert_eq!(result.summary.total_sessions, 1);
        assert_eq!(result.performance.stations[0].id, "S2");
    }
}
