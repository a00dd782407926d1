//! Session key derivation.
//!
//! Narrowed from the gateway's multi-scope `sessionKey` model (per-peer,
//! per-channel-peer, group/channel, thread overrides) down to the one
//! dimension the adaptation core's invariant actually needs: at most one
//! active `SessionRecord` per `(learner_id, channel)` (spec §3).

/// Stable routing key for a learner's session on a given channel.
pub fn compute_session_key(learner_id: &str, channel: &str) -> String {
    format!("learner:{learner_id}:{channel}")
}
