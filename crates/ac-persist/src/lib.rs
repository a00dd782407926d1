//! Persistence layer (spec §6 "Persistence layout"): the encrypted learner
//! table and the append-only audit sink. Session state itself is owned by
//! `ac-sessions::SessionStore` — this crate covers the two tables that
//! need encryption-at-rest or strict append-only ordering.

pub mod assessment_store;
pub mod audit;
pub mod crypto;
pub mod engagement_store;
pub mod learner_store;
pub mod performance_store;

pub use assessment_store::AssessmentStore;
pub use audit::AuditSink;
pub use crypto::Cipher;
pub use engagement_store::EngagementStore;
pub use learner_store::LearnerStore;
pub use performance_store::PerformanceStore;
