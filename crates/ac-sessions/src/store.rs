//! In-memory session store, flushed to a JSON file.
//!
//! Adapted from the gateway's `SessionStore` (`sessions.json` under the
//! state dir). Keyed by `session_id` rather than a routing key — routing
//! from `(learner_id, channel)` to a `session_id` is the registry's job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::model::SessionRecord;
use ac_domain::{Error, Result};
use chrono::Utc;
use parking_lot::RwLock;

pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;

        let sessions_path = state_path.join("sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
        })
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn insert(&self, session: SessionRecord) {
        self.sessions.write().insert(session.session_id.clone(), session);
    }

    /// Apply `f` to the stored record, if present, bumping `last_event_at`.
    pub fn update<F>(&self, session_id: &str, f: F) -> Option<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut sessions = self.sessions.write();
        let record = sessions.get_mut(session_id)?;
        f(record);
        record.last_event_at = Utc::now();
        Some(record.clone())
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.write().remove(session_id)
    }

    pub fn list(&self) -> Vec<SessionRecord> {
        self.sessions.read().values().cloned().collect()
    }

    /// Session IDs idle past `idle_minutes` as of `now`.
    pub fn idle_session_ids(&self, idle_minutes: u32, now: chrono::DateTime<Utc>) -> Vec<String> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.idle_for(now).as_secs() >= u64::from(idle_minutes) * 60)
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        let sessions = self.sessions.read();
        let json = serde_json::to_string_pretty(&*sessions)?;
        std::fs::write(&self.sessions_path, json).map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{AdaptationSensitivity, LearningEvent, SessionConfiguration, SessionCounters};
    use tempfile::tempdir;

    fn session(id: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: id.into(),
            learner_id: "l1".into(),
            channel: "web".into(),
            created_at: now,
            last_event_at: now,
            configuration: SessionConfiguration {
                learning_domain: "algebra".into(),
                target_learning_event: LearningEvent::Mastery,
                adaptation_sensitivity: AdaptationSensitivity::Medium,
                difficulty: 0.5,
                support_level: "standard".into(),
            },
            current_event: LearningEvent::Introduction,
            progress: 0.0,
            counters: SessionCounters::default(),
        }
    }

    #[test]
    fn insert_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.insert(session("s1"));
        assert!(store.get("s1").is_some());
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn flush_then_reload() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.insert(session("s1"));
        store.flush().unwrap();

        let reloaded = SessionStore::new(dir.path()).unwrap();
        assert!(reloaded.get("s1").is_some());
    }

    #[test]
    fn update_bumps_last_event_at() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let mut s = session("s1");
        s.last_event_at = Utc::now() - chrono::Duration::hours(1);
        store.insert(s);

        let updated = store
            .update("s1", |rec| rec.progress = 0.5)
            .expect("session exists");
        assert_eq!(updated.progress, 0.5);
        assert!(updated.idle_for(Utc::now()).as_secs() < 5);
    }
}
