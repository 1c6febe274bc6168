//! Bounded storage for finished analysis results.
//!
//! The engine never touches a store; the [`crate::runner::AnalysisRunner`]
//! receives one by injection and puts every successful result into it.
//! Two implementations are provided:
//!
//! - [`MemoryResultStore`] keeps results in a FIFO queue.
//! - [`JsonFileStore`] writes one pretty-printed JSON document per result
//!   and prunes the oldest files beyond its retention bound.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use charge_core::error::{AnalyticsError, Result};
use charge_core::models::AnalysisResult;

// ── ResultStore ───────────────────────────────────────────────────────────────

/// Retention-bounded collection of [`AnalysisResult`]s keyed by id.
///
/// Putting a result whose id is already stored replaces the older copy.
pub trait ResultStore: Send + Sync {
    fn put(&self, result: AnalysisResult) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<AnalysisResult>>;

    /// Stored results, oldest first.
    fn list(&self) -> Result<Vec<AnalysisResult>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn lock_poisoned() -> AnalyticsError {
    AnalyticsError::Task("result store lock poisoned".to_string())
}

// ── MemoryResultStore ─────────────────────────────────────────────────────────

/// In-process store; evicts the oldest result once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryResultStore {
    capacity: usize,
    results: Mutex<VecDeque<AnalysisResult>>,
}

impl MemoryResultStore {
    /// `capacity` is raised to 1 when zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, result: AnalysisResult) -> Result<()> {
        let mut results = self.results.lock().map_err(|_| lock_poisoned())?;
        results.retain(|r| r.id != result.id);
        while results.len() >= self.capacity {
            if let Some(evicted) = results.pop_front() {
                tracing::debug!("evicting {} from memory store", evicted.id);
            }
        }
        results.push_back(result);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<AnalysisResult>> {
        let results = self.results.lock().map_err(|_| lock_poisoned())?;
        Ok(results.iter().find(|r| r.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<AnalysisResult>> {
        let results = self.results.lock().map_err(|_| lock_poisoned())?;
        Ok(results.iter().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.results.lock().map_err(|_| lock_poisoned())?.len())
    }
}

// ── JsonFileStore ─────────────────────────────────────────────────────────────

/// One `<generated-at>-<id>.json` file per result under a directory.
///
/// File names start with a sortable UTC stamp, so lexical order is
/// chronological order.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    retention: usize,
    // Serializes put/prune against concurrent runner tasks.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, retention: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| AnalyticsError::FileRead {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            retention: retention.max(1),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(result: &AnalysisResult) -> String {
        format!(
            "{}-{}.json",
            result.generated_at.format("%Y%m%dT%H%M%S%.3fZ"),
            result.id
        )
    }

    /// Stored files sorted oldest first.
    fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn entries_for(&self, id: &str) -> Result<Vec<PathBuf>> {
        let suffix = format!("-{}.json", id);
        Ok(self
            .entries()?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(&suffix))
            })
            .collect())
    }

    fn load(path: &Path) -> Result<AnalysisResult> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalyticsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn prune(&self) -> Result<usize> {
        let files = self.entries()?;
        let excess = files.len().saturating_sub(self.retention);
        for path in files.iter().take(excess) {
            std::fs::remove_file(path)?;
            tracing::debug!("pruned stored result {}", path.display());
        }
        Ok(excess)
    }
}

impl ResultStore for JsonFileStore {
    fn put(&self, result: AnalysisResult) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| lock_poisoned())?;

        for stale in self.entries_for(&result.id)? {
            std::fs::remove_file(stale)?;
        }

        let path = self.dir.join(Self::file_name(&result));
        let json = serde_json::to_string_pretty(&result)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &path)?;
        tracing::info!("saved analysis {} to {}", result.id, path.display());

        let pruned = self.prune()?;
        if pruned > 0 {
            tracing::info!("pruned {} stored result(s) beyond retention {}", pruned, self.retention);
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<AnalysisResult>> {
        match self.entries_for(id)?.last() {
            Some(path) => Self::load(path).map(Some),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<AnalysisResult>> {
        self.entries()?.iter().map(|p| Self::load(p)).collect()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use charge_core::models::{DataQuality, DateRange, Performance, Summary, Trends};
    use chrono::{NaiveDate, TimeZone as _, Utc};
    use tempfile::TempDir;

    fn result(id: &str, minute: u32) -> AnalysisResult {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        AnalysisResult {
            id: id.to_string(),
            file_name: format!("{}.csv", id),
            generated_at: Utc.with_ymd_and_hms(2024, 7, 1, 12, minute, 0).unwrap(),
            summary: Summary {
                total_stations: 1,
                total_sessions: 1,
                date_range: DateRange {
                    start: day,
                    end: day,
                    days: 1,
                },
                total_energy: 20.0,
                average_efficiency: 80.0,
                completion_rate: 100.0,
                data_quality: DataQuality::Excellent,
                measured_sessions: 1,
                placeholder_sessions: 0,
            },
            performance: Performance {
                top_performers: vec![],
                underperformers: vec![],
                stations: vec![],
            },
            trends: Trends {
                hourly: vec![],
                peak_hours: vec![],
                weekend_ratio: 1.0,
                monthly: vec![],
                monthly_trend: None,
            },
            station_types: vec![],
            warnings: vec![],
        }
    }

    fn ids(results: &[AnalysisResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_memory_store_fifo_retention() {
        let store = MemoryResultStore::new(2);
        store.put(result("a", 1)).unwrap();
        store.put(result("b", 2)).unwrap();
        store.put(result("c", 3)).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(ids(&store.list().unwrap()), vec!["b", "c"]);
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("c").unwrap().unwrap().file_name, "c.csv");
    }

    #[test]
    fn test_memory_store_replaces_same_id() {
        let store = MemoryResultStore::new(3);
        store.put(result("a", 1)).unwrap();
        store.put(result("b", 2)).unwrap();
        store.put(result("a", 3)).unwrap();
        assert_eq!(ids(&store.list().unwrap()), vec!["b", "a"]);
        assert_eq!(store.get("a").unwrap(), Some(result("a", 3)));
    }

    #[test]
    fn test_memory_store_zero_capacity_keeps_one() {
        let store = MemoryResultStore::new(0);
        assert_eq!(store.capacity(), 1);
        assert!(store.is_empty().unwrap());
        store.put(result("a", 1)).unwrap();
        store.put(result("b", 2)).unwrap();
        assert_eq!(ids(&store.list().unwrap()), vec!["b"]);
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("results"), 5).unwrap();
        let original = result("a", 1);
        store.put(original.clone()).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(original));
        assert!(store.get("missing").unwrap().is_none());
        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_json_store_prunes_oldest() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path(), 2).unwrap();
        store.put(result("c", 3)).unwrap();
        store.put(result("a", 1)).unwrap();
        store.put(result("b", 2)).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(ids(&store.list().unwrap()), vec!["b", "c"]);
    }

    #[test]
    fn test_json_store_replaces_same_id() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path(), 5).unwrap();
        store.put(result("a", 1)).unwrap();
        store.put(result("a", 4)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        let stored = store.get("a").unwrap().unwrap();
        assert_eq!(stored.generated_at, Utc.with_ymd_and_hms(2024, 7, 1, 12, 4, 0).unwrap());
    }

    #[test]
    fn test_json_store_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let store = JsonFileStore::open(dir.path(), 5).unwrap();
        assert!(store.is_empty().unwrap());
    }
}
