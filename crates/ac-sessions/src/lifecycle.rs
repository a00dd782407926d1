//! Idle-timeout eviction.
//!
//! Narrowed from the gateway's `LifecycleManager` (daily reset + idle
//! timeout + per-channel/per-type overrides) down to the one rule spec
//! §4.6 names: a session idle past `session_idle_timeout_minutes` is
//! closed (summarised and dropped from the store), not reset in place.

use ac_domain::model::SessionRecord;
use chrono::{DateTime, Utc};

pub struct IdleMonitor {
    idle_minutes: u32,
}

impl IdleMonitor {
    pub fn new(idle_minutes: u32) -> Self {
        Self { idle_minutes }
    }

    pub fn is_idle(&self, session: &SessionRecord, now: DateTime<Utc>) -> bool {
        session.idle_for(now).as_secs() >= u64::from(self.idle_minutes) * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::model::{AdaptationSensitivity, LearningEvent, SessionConfiguration, SessionCounters};
    use chrono::Duration;

    fn record(last_event_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            session_id: "s1".into(),
            learner_id: "l1".into(),
            channel: "web".into(),
            created_at: last_event_at,
            last_event_at,
            configuration: SessionConfiguration {
                learning_domain: "algebra".into(),
                target_learning_event: LearningEvent::Mastery,
                adaptation_sensitivity: AdaptationSensitivity::Medium,
                difficulty: 0.5,
                support_level: "standard".into(),
            },
            current_event: LearningEvent::Introduction,
            progress: 0.2,
            counters: SessionCounters::default(),
        }
    }

    #[test]
    fn not_idle_before_timeout() {
        let monitor = IdleMonitor::new(60);
        let now = Utc::now();
        let session = record(now - Duration::minutes(30));
        assert!(!monitor.is_idle(&session, now));
    }

    #[test]
    fn idle_after_timeout() {
        let monitor = IdleMonitor::new(60);
        let now = Utc::now();
        let session = record(now - Duration::minutes(61));
        assert!(monitor.is_idle(&session, now));
    }
}
