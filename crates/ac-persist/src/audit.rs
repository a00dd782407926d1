//! Append-only audit log (spec §3 `AuditRecord`, §4.2/§6 "audit_logging_enabled").
//!
//! Adapted from `TranscriptWriter`'s append-one-JSON-line-per-event
//! discipline. Sequence numbers are assigned by an in-process atomic
//! counter seeded from the highest sequence already on disk, so restarts
//! don't reuse numbers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ac_domain::model::{AuditEventKind, AuditRecord};
use ac_domain::trace::TraceEvent;
use ac_domain::{Error, Result};
use chrono::Utc;

pub struct AuditSink {
    path: PathBuf,
    next_sequence: AtomicU64,
    anonymise_key: Option<Vec<u8>>,
}

impl AuditSink {
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("audit.jsonl");

        let mut last_sequence = 0u64;
        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            for line in raw.lines().rev() {
                if line.trim().is_empty() {
                    continue;
                }
                if let Ok(record) = serde_json::from_str::<AuditRecord>(line) {
                    last_sequence = record.sequence;
                    break;
                }
            }
        }

        Ok(Self {
            path,
            next_sequence: AtomicU64::new(last_sequence + 1),
            anonymise_key: None,
        })
    }

    /// Anonymise the `learner_id` slot of every record written from this
    /// point on, keyed the same way the Learner Registry derives
    /// `LearnerRecord::anonymised_id` (spec §4.2). Once set, `record` never
    /// writes a raw learner_id to disk.
    pub fn with_anonymisation(mut self, key: Vec<u8>) -> Self {
        self.anonymise_key = Some(key);
        self
    }

    /// Append one audit record, stamping it with the next sequence number
    /// and the current time.
    pub fn record(
        &self,
        session_id: Option<String>,
        learner_id: Option<String>,
        event_kind: AuditEventKind,
        success: bool,
        detail: serde_json::Value,
    ) -> Result<AuditRecord> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let learner_id = match (&self.anonymise_key, learner_id) {
            (Some(key), Some(raw)) => Some(ac_sessions::anonymise_learner_id(&raw, key)),
            (_, other) => other,
        };
        let record = AuditRecord {
            sequence,
            session_id,
            learner_id,
            event_kind,
            success,
            timestamp: Utc::now(),
            detail,
        };

        let line = serde_json::to_string(&record)?;
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(Error::Io)?;
        file.write_all(line.as_bytes()).map_err(Error::Io)?;
        file.write_all(b"\n").map_err(Error::Io)?;

        TraceEvent::AuditWritten {
            sequence,
            event_kind: format!("{event_kind:?}"),
            success,
        }
        .emit();

        Ok(record)
    }

    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(Error::Io)?;
        let mut records = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sequence_numbers_are_monotonic() {
        let dir = tempdir().unwrap();
        let sink = AuditSink::new(dir.path()).unwrap();
        let a = sink
            .record(Some("s1".into()), Some("l1".into()), AuditEventKind::Access, true, serde_json::json!({}))
            .unwrap();
        let b = sink
            .record(Some("s1".into()), Some("l1".into()), AuditEventKind::Modify, true, serde_json::json!({}))
            .unwrap();
        assert_eq!(b.sequence, a.sequence + 1);
    }

    #[test]
    fn sequence_resumes_after_restart() {
        let dir = tempdir().unwrap();
        {
            let sink = AuditSink::new(dir.path()).unwrap();
            sink.record(None, None, AuditEventKind::Access, true, serde_json::json!({})).unwrap();
            sink.record(None, None, AuditEventKind::Access, true, serde_json::json!({})).unwrap();
        }
        let sink2 = AuditSink::new(dir.path()).unwrap();
        let next = sink2
            .record(None, None, AuditEventKind::Access, true, serde_json::json!({}))
            .unwrap();
        assert_eq!(next.sequence, 3);
    }

    #[test]
    fn read_all_returns_appended_records_in_order() {
        let dir = tempdir().unwrap();
        let sink = AuditSink::new(dir.path()).unwrap();
        sink.record(None, None, AuditEventKind::Access, true, serde_json::json!({})).unwrap();
        sink.record(None, None, AuditEventKind::Error, false, serde_json::json!({"code": "x"})).unwrap();

        let all = sink.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sequence, 1);
        assert!(!all[1].success);
    }

    #[test]
    fn anonymisation_replaces_raw_learner_id() {
        let dir = tempdir().unwrap();
        let sink = AuditSink::new(dir.path()).unwrap().with_anonymisation(b"secret".to_vec());
        let record = sink
            .record(Some("s1".into()), Some("learner-42".into()), AuditEventKind::Access, true, serde_json::json!({}))
            .unwrap();
        let expected = ac_sessions::anonymise_learner_id("learner-42", b"secret");
        assert_eq!(record.learner_id, Some(expected));

        let on_disk = sink.read_all().unwrap();
        assert_ne!(on_disk[0].learner_id.as_deref(), Some("learner-42"));
    }

    #[test]
    fn anonymisation_disabled_keeps_raw_learner_id() {
        let dir = tempdir().unwrap();
        let sink = AuditSink::new(dir.path()).unwrap();
        let record = sink
            .record(Some("s1".into()), Some("learner-42".into()), AuditEventKind::Access, true, serde_json::json!({}))
            .unwrap();
        assert_eq!(record.learner_id.as_deref(), Some("learner-42"));
    }
}
