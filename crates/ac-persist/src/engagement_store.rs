//! File-backed `engagement_data` store (spec §6 "Persistence layout").
//!
//! Same encrypted-row discipline as [`crate::assessment_store::AssessmentStore`]
//! — `track_engagement` samples carry `learner_id`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::model::EngagementDataRow;
use ac_domain::{Error, Result};
use parking_lot::RwLock;

use crate::crypto::Cipher;

pub struct EngagementStore {
    path: PathBuf,
    cipher: Cipher,
    rows: RwLock<HashMap<String, EngagementDataRow>>,
}

impl EngagementStore {
    pub fn new(state_path: &Path, cipher: Cipher) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("engagement_data.enc");

        let rows = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            let mut map = HashMap::new();
            for line in raw.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match cipher.decrypt_json::<EngagementDataRow>(line) {
                    Ok(row) => {
                        map.insert(row.engagement_id.clone(), row);
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping undecryptable engagement row"),
                }
            }
            map
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cipher,
            rows: RwLock::new(rows),
        })
    }

    pub fn insert(&self, row: EngagementDataRow) {
        self.rows.write().insert(row.engagement_id.clone(), row);
    }

    pub fn for_learner(&self, learner_id: &str) -> Vec<EngagementDataRow> {
        self.rows
            .read()
            .values()
            .filter(|r| r.learner_id == learner_id)
            .cloned()
            .collect()
    }

    /// Mean `engagement_score` across a learner's recorded samples, used by
    /// `DynamicStats.engagement_trend` refresh on reconnect.
    pub fn mean_engagement(&self, learner_id: &str) -> Option<f64> {
        let samples = self.for_learner(learner_id);
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().map(|r| r.engagement_score).sum::<f64>() / samples.len() as f64)
    }

    pub fn flush(&self) -> Result<()> {
        let rows = self.rows.read();
        let mut buf = String::new();
        for row in rows.values() {
            buf.push_str(&self.cipher.encrypt_json(row)?);
            buf.push('\n');
        }
        std::fs::write(&self.path, buf).map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{AccessLevel, RowMetadata};
    use chrono::Utc;
    use tempfile::tempdir;

    fn row(id: &str, score: f64) -> EngagementDataRow {
        EngagementDataRow {
            engagement_id: id.into(),
            learner_id: "l-1".into(),
            session_id: "s-1".into(),
            interaction: serde_json::json!({ "event": "click" }),
            engagement_score: score,
            timestamp: Utc::now(),
            metadata: RowMetadata {
                data_type: "engagement_sample".into(),
                access_level: AccessLevel::Educational,
                retention_until: None,
            },
        }
    }

    #[test]
    fn mean_engagement_averages_samples() {
        let dir = tempdir().unwrap();
        let store = EngagementStore::new(dir.path(), Cipher::from_secret(b"k")).unwrap();
        store.insert(row("e-1", 0.8));
        store.insert(row("e-2", 0.6));
        let mean = store.mean_engagement("l-1").unwrap();
        assert!((mean - 0.7).abs() < 1e-9);
    }

    #[test]
    fn missing_learner_has_no_mean() {
        let dir = tempdir().unwrap();
        let store = EngagementStore::new(dir.path(), Cipher::from_secret(b"k")).unwrap();
        assert!(store.mean_engagement("ghost").is_none());
    }
}
