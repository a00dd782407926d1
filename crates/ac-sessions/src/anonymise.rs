//! k-anonymity for the Learner Registry (spec §4.2).
//!
//! Direct identifiers never leave the registry: `learner_id` is hashed
//! (keyed, so the mapping can't be inverted by an observer without the
//! process secret) down to a 16-hex-character `anonymised_id`, the same
//! value `LearnerRecord::anonymised_id` carries. Age is generalised to one
//! of five buckets rather than reported as a raw value.
//!
//! The keyed-hash construction mirrors the gateway's `token_eq` constant-time
//! comparison (`Sha256::digest`), swapped here for an HMAC since the goal is
//! a keyed one-way map rather than a comparison.

use ac_domain::model::AgeBucket;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derive the stable 16-hex-character anonymised ID for a learner.
///
/// `key` is a process secret (spec §4.2): same `learner_id` + same `key`
/// always yields the same `anonymised_id`, but the mapping cannot be
/// reversed without it.
pub fn anonymise_learner_id(learner_id: &str, key: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(learner_id.as_bytes());
    let digest = mac.finalize().into_bytes();
    hex::encode(&digest[..8])
}

/// Generalise a raw age in years to one of the five k-anonymity buckets
/// spec §4.2 names.
pub fn age_bucket(age_years: u32) -> AgeBucket {
    match age_years {
        0..=17 => AgeBucket::Under18,
        18..=24 => AgeBucket::From18To24,
        25..=34 => AgeBucket::From25To34,
        35..=49 => AgeBucket::From35To49,
        _ => AgeBucket::From50Plus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_key() {
        let a = anonymise_learner_id("learner-42", b"secret");
        let b = anonymise_learner_id("learner-42", b"secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn differs_across_keys() {
        let a = anonymise_learner_id("learner-42", b"secret-a");
        let b = anonymise_learner_id("learner-42", b"secret-b");
        assert_ne!(a, b);
    }

    #[test]
    fn differs_across_learners() {
        let a = anonymise_learner_id("learner-1", b"secret");
        let b = anonymise_learner_id("learner-2", b"secret");
        assert_ne!(a, b);
    }

    #[test]
    fn age_bucket_boundaries() {
        assert_eq!(age_bucket(17), AgeBucket::Under18);
        assert_eq!(age_bucket(18), AgeBucket::From18To24);
        assert_eq!(age_bucket(34), AgeBucket::From25To34);
        assert_eq!(age_bucket(49), AgeBucket::From35To49);
        assert_eq!(age_bucket(50), AgeBucket::From50Plus);
    }
}
