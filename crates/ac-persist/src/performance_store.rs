//! File-backed `performance_metrics` store (spec §6 "Persistence layout").
//!
//! Rows are keyed by `server_id`, not `learner_id` — the one table in §6
//! that carries no learner-identifying data, so it is stored as plain JSON
//! rather than through [`crate::crypto::Cipher`], matching
//! `ac-sessions::store::SessionStore`'s whole-file-JSON discipline instead
//! of the encrypted-row one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::model::PerformanceMetricRow;
use ac_domain::{Error, Result};
use parking_lot::RwLock;

pub struct PerformanceStore {
    path: PathBuf,
    rows: RwLock<HashMap<String, PerformanceMetricRow>>,
}

impl PerformanceStore {
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("performance_metrics.json");

        let rows = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    pub fn insert(&self, row: PerformanceMetricRow) {
        self.rows.write().insert(row.metric_id.clone(), row);
    }

    pub fn for_server(&self, server_id: &str) -> Vec<PerformanceMetricRow> {
        self.rows
            .read()
            .values()
            .filter(|r| r.server_id == server_id)
            .cloned()
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        let rows = self.rows.read();
        let json = serde_json::to_string_pretty(&*rows)?;
        std::fs::write(&self.path, json).map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{AccessLevel, RowMetadata};
    use chrono::Utc;
    use tempfile::tempdir;

    fn row(id: &str) -> PerformanceMetricRow {
        PerformanceMetricRow {
            metric_id: id.into(),
            server_id: "server-a".into(),
            metric_type: "p95_end_to_end_ms".into(),
            value: 18.4,
            timestamp: Utc::now(),
            metadata: RowMetadata {
                data_type: "performance_metric".into(),
                access_level: AccessLevel::Public,
                retention_until: None,
            },
        }
    }

    #[test]
    fn flush_then_reload_is_plaintext() {
        let dir = tempdir().unwrap();
        let store = PerformanceStore::new(dir.path()).unwrap();
        store.insert(row("m-1"));
        store.flush().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("performance_metrics.json")).unwrap();
        assert!(raw.contains("server-a"), "not learner-identifying, stored plain");

        let reloaded = PerformanceStore::new(dir.path()).unwrap();
        assert_eq!(reloaded.for_server("server-a").len(), 1);
    }
}
