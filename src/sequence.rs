use num_bigint::BigUint;
use tracing::{info, warn};

use crate::codec::{PriorCrl, decode_crl_number_extension};

/// Next CRL number to emit, and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceState {
    pub next: BigUint,
    /// Number carried by the prior CRL, when one was continued from.
    pub previous: Option<BigUint>,
}

impl Default for SequenceState {
    fn default() -> Self {
        SequenceTracker::initial()
    }
}

/// Continues the CRL number sequence from a previously issued CRL
pub struct SequenceTracker;

impl SequenceTracker {
    /// Starting point when no CRL was issued before for this issuer.
    pub fn initial() -> SequenceState {
        SequenceState {
            next: BigUint::from(1u32),
            previous: None,
        }
    }

    /// One more than the prior CRL's number.
    ///
    /// Prior CRLs without a readable CRL number extension restart the
    /// sequence at `fallback` instead of failing.
    pub fn from_prior(prior: &PriorCrl, fallback: &SequenceState) -> SequenceState {
        match decode_crl_number_extension(prior) {
            Some(number) => {
                let next = &number + 1u32;
                info!("continuing CRL sequence of {} at {}", prior.issuer, next);
                SequenceState {
                    next,
                    previous: Some(number),
                }
            }
            None => {
                warn!(
                    "prior CRL from {} has no usable CRL number, starting at {}",
                    prior.issuer, fallback.next
                );
                SequenceState {
                    next: fallback.next.clone(),
                    previous: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn prior(extension: Option<Vec<u8>>) -> PriorCrl {
        PriorCrl {
            der: Vec::new(),
            issuer: "CN=My Test Ca".to_string(),
            issuer_der: Vec::new(),
            this_update: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            next_update: None,
            entries: Vec::new(),
            crl_number_extension: extension,
        }
    }

    #[test]
    fn test_initial_is_one() {
        assert_eq!(SequenceTracker::initial().next, BigUint::from(1u32));
        assert_eq!(SequenceState::default(), SequenceTracker::initial());
    }

    #[test]
    fn test_from_prior_increments() {
        let value = yasna::construct_der(|w| w.write_u64(5));
        let state = SequenceTracker::from_prior(&prior(Some(value)), &SequenceTracker::initial());
        assert_eq!(state.next, BigUint::from(6u32));
        assert_eq!(state.previous, Some(BigUint::from(5u32)));
    }

    #[test]
    fn test_from_prior_without_extension_starts_at_one() {
        let state = SequenceTracker::from_prior(&prior(None), &SequenceTracker::initial());
        assert_eq!(state.next, BigUint::from(1u32));
        assert_eq!(state.previous, None);
    }

    #[test]
    fn test_from_prior_with_garbage_starts_at_one() {
        let state = SequenceTracker::from_prior(
            &prior(Some(b"garbage".to_vec())),
            &SequenceTracker::initial(),
        );
        assert_eq!(state, SequenceTracker::initial());
    }

    #[test]
    fn test_from_prior_without_extension_uses_fallback() {
        let fallback = SequenceState {
            next: BigUint::from(10u32),
            previous: None,
        };
        let state = SequenceTracker::from_prior(&prior(None), &fallback);
        assert_eq!(state.next, BigUint::from(10u32));
        assert_eq!(state.previous, None);
    }

    #[test]
    fn test_from_prior_handles_numbers_beyond_u64() {
        let big = BigUint::from(u64::MAX) * 16u32;
        let value = yasna::construct_der(|w| w.write_bigint_bytes(&big.to_bytes_be(), true));
        let state = SequenceTracker::from_prior(&prior(Some(value)), &SequenceTracker::initial());
        assert_eq!(state.next, big + 1u32);
    }
}
