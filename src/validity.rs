use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::codec::PriorCrl;
use crate::error::{CrlError, CrlResult};

/// The `thisUpdate`/`nextUpdate` interval of a CRL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub effective_date: DateTime<Utc>,
    pub period_days: i64,
    pub next_update: DateTime<Utc>,
}

impl ValidityWindow {
    /// Fails with [`CrlError::InvalidValidityWindow`] when the next update
    /// precedes the effective date.
    pub fn validate(&self) -> CrlResult<()> {
        if self.next_update < self.effective_date {
            return Err(CrlError::InvalidValidityWindow {
                effective: self.effective_date,
                detail: format!("next update {} precedes it", self.next_update),
            });
        }
        Ok(())
    }
}

/// Derives validity windows from an effective date and a period, or the other way round
pub struct ValidityWindowCalculator;

impl ValidityWindowCalculator {
    /// Window of `period_days` whole days starting at `effective_date`.
    ///
    /// Fails with [`CrlError::InvalidValidityWindow`] when the next update
    /// falls outside the representable date range.
    pub fn from_period(
        effective_date: DateTime<Utc>,
        period_days: i64,
    ) -> CrlResult<ValidityWindow> {
        let next_update = Duration::try_days(period_days)
            .and_then(|period| effective_date.checked_add_signed(period))
            .ok_or_else(|| CrlError::InvalidValidityWindow {
                effective: effective_date,
                detail: format!("a period of {period_days} days is out of range"),
            })?;
        Ok(ValidityWindow {
            effective_date,
            period_days,
            next_update,
        })
    }

    /// Window with an explicitly chosen next update; the period is back-computed
    /// as the whole number of days between the two dates.
    pub fn with_next_update(
        effective_date: DateTime<Utc>,
        next_update: DateTime<Utc>,
    ) -> ValidityWindow {
        ValidityWindow {
            effective_date,
            period_days: (next_update - effective_date).num_days(),
            next_update,
        }
    }

    /// Period of a prior CRL in whole days, used as the default for the next one.
    ///
    /// `None` when the prior has no next update or its window is inverted.
    pub fn period_from_prior(prior: &PriorCrl) -> Option<i64> {
        let next_update = prior.next_update?;
        if next_update < prior.this_update {
            warn!(
                "prior CRL from {} has next update {} before this update {}, ignoring its period",
                prior.issuer, next_update, prior.this_update
            );
            return None;
        }
        Some((next_update - prior.this_update).num_days())
    }
}
