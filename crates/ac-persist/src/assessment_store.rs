//! File-backed `assessment_results` store (spec §6 "Persistence layout").
//!
//! Same whole-file-JSON, encrypt-each-row discipline as [`crate::learner_store::LearnerStore`]
//! — this table carries `learner_id` on every row, so it gets the same
//! treatment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::model::AssessmentResultRow;
use ac_domain::{Error, Result};
use parking_lot::RwLock;

use crate::crypto::Cipher;

pub struct AssessmentStore {
    path: PathBuf,
    cipher: Cipher,
    rows: RwLock<HashMap<String, AssessmentResultRow>>,
}

impl AssessmentStore {
    pub fn new(state_path: &Path, cipher: Cipher) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("assessment_results.enc");

        let rows = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            let mut map = HashMap::new();
            for line in raw.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match cipher.decrypt_json::<AssessmentResultRow>(line) {
                    Ok(row) => {
                        map.insert(row.assessment_id.clone(), row);
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping undecryptable assessment row"),
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

    pub fn insert(&self, row: AssessmentResultRow) {
        self.rows.write().insert(row.assessment_id.clone(), row);
    }

    pub fn for_learner(&self, learner_id: &str) -> Vec<AssessmentResultRow> {
        self.rows
            .read()
            .values()
            .filter(|r| r.learner_id == learner_id)
            .cloned()
            .collect()
    }

    pub fn for_session(&self, session_id: &str) -> Vec<AssessmentResultRow> {
        self.rows
            .read()
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
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

    fn row(id: &str) -> AssessmentResultRow {
        AssessmentResultRow {
            assessment_id: id.into(),
            learner_id: "l-1".into(),
            session_id: "s-1".into(),
            assessment_type: "quiz".into(),
            result: serde_json::json!({ "score": 0.9 }),
            timestamp: Utc::now(),
            metadata: RowMetadata {
                data_type: "assessment_result".into(),
                access_level: AccessLevel::Restricted,
                retention_until: None,
            },
        }
    }

    #[test]
    fn round_trips_encrypted_and_queryable_by_learner() {
        let dir = tempdir().unwrap();
        let store = AssessmentStore::new(dir.path(), Cipher::from_secret(b"k")).unwrap();
        store.insert(row("a-1"));
        store.flush().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("assessment_results.enc")).unwrap();
        assert!(!raw.contains("l-1"));

        let reloaded = AssessmentStore::new(dir.path(), Cipher::from_secret(b"k")).unwrap();
        assert_eq!(reloaded.for_learner("l-1").len(), 1);
        assert_eq!(reloaded.for_session("s-1").len(), 1);
    }
}
