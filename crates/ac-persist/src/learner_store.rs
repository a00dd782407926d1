//! File-backed `LearnerRecord` store (spec §6 "learner_models" table).
//!
//! Adapted from the gateway's `SessionStore`: whole-file JSON load on
//! start, whole-file JSON write on flush, an `RwLock<HashMap<_,_>>` in
//! between. Rows are additionally passed through [`Cipher`] before
//! touching disk, since `LearnerRecord` carries the identifying
//! `learner_id` this table is the one place encryption-at-rest applies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::model::LearnerRecord;
use ac_domain::{Error, Result};
use parking_lot::RwLock;

use crate::crypto::Cipher;

pub struct LearnerStore {
    path: PathBuf,
    cipher: Cipher,
    records: RwLock<HashMap<String, LearnerRecord>>,
}

impl LearnerStore {
    pub fn new(state_path: &Path, cipher: Cipher) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("learner_models.enc");

        let records = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            let mut map = HashMap::new();
            for line in raw.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match cipher.decrypt_json::<LearnerRecord>(line) {
                    Ok(record) => {
                        map.insert(record.learner_id.clone(), record);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping undecryptable learner row");
                    }
                }
            }
            map
        } else {
            HashMap::new()
        };

        tracing::info!(learners = records.len(), path = %path.display(), "learner store loaded");

        Ok(Self {
            path,
            cipher,
            records: RwLock::new(records),
        })
    }

    pub fn get(&self, learner_id: &str) -> Option<LearnerRecord> {
        self.records.read().get(learner_id).cloned()
    }

    pub fn upsert(&self, record: LearnerRecord) {
        self.records.write().insert(record.learner_id.clone(), record);
    }

    pub fn flush(&self) -> Result<()> {
        let records = self.records.read();
        let mut buf = String::new();
        for record in records.values() {
            buf.push_str(&self.cipher.encrypt_json(record)?);
            buf.push('\n');
        }
        std::fs::write(&self.path, buf).map_err(Error::Io)?;
        Ok(())
    }
}
