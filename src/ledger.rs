use std::collections::BTreeMap;
use std::collections::btree_map::{Entry, Values};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use tracing::debug;

use crate::reason::RevocationReason;

/// Represents a single revoked certificate entry in a CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    /// The serial number of the revoked certificate.
    pub serial_number: BigUint,
    /// The date and time when the certificate was revoked.
    pub revocation_date: DateTime<Utc>,
    pub reason: RevocationReason,
}

impl RevocationRecord {
    pub fn new(
        serial_number: BigUint,
        revocation_date: DateTime<Utc>,
        reason: RevocationReason,
    ) -> Self {
        Self {
            serial_number,
            revocation_date,
            reason,
        }
    }
}

/// Outcome of putting a record into the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    Admitted,
    /// The serial was already present; the ledger was left untouched.
    AlreadyRevoked,
    /// The serial was present and its record was swapped for the new one.
    Replaced,
}

/// Revoked certificates of one CRL-building session, keyed by serial number.
///
/// Holds at most one record per serial. Iteration is always in ascending
/// serial order so the same contents always produce the same CRL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevocationLedger {
    records: BTreeMap<BigUint, RevocationRecord>,
}

impl RevocationLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a revocation unless the serial is already present.
    pub fn admit(
        &mut self,
        serial: BigUint,
        revocation_date: DateTime<Utc>,
        reason: RevocationReason,
    ) -> AdmissionResult {
        match self.records.entry(serial) {
            Entry::Occupied(entry) => {
                debug!("serial {} already revoked, ignoring", entry.key());
                AdmissionResult::AlreadyRevoked
            }
            Entry::Vacant(entry) => {
                let serial_number = entry.key().clone();
                entry.insert(RevocationRecord::new(serial_number, revocation_date, reason));
                AdmissionResult::Admitted
            }
        }
    }

    /// Adds a revocation, swapping out any record with the same serial.
    ///
    /// Only meant for refreshing from a re-imported CRL.
    pub fn admit_or_replace(
        &mut self,
        serial: BigUint,
        revocation_date: DateTime<Utc>,
        reason: RevocationReason,
    ) -> AdmissionResult {
        let record = RevocationRecord::new(serial.clone(), revocation_date, reason);
        match self.records.insert(serial, record) {
            Some(_) => AdmissionResult::Replaced,
            None => AdmissionResult::Admitted,
        }
    }

    /// Bulk-loads records, applying the same uniqueness rule as [`admit`](Self::admit).
    ///
    /// Returns the serials that were skipped because they were already present.
    pub fn seed<I>(&mut self, entries: I) -> Vec<BigUint>
    where
        I: IntoIterator<Item = RevocationRecord>,
    {
        let mut skipped = Vec::new();
        for record in entries {
            let serial = record.serial_number.clone();
            if self.admit(record.serial_number, record.revocation_date, record.reason)
                == AdmissionResult::AlreadyRevoked
            {
                skipped.push(serial);
            }
        }
        skipped
    }

    /// Serial-ascending view of the records. Does not mutate the ledger and
    /// may be called, or cloned, as often as needed.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            inner: self.records.values(),
        }
    }

    /// Whether the serial has a record.
    pub fn contains(&self, serial: &BigUint) -> bool {
        self.records.contains_key(serial)
    }

    /// The record for a serial, if revoked.
    pub fn get(&self, serial: &BigUint) -> Option<&RevocationRecord> {
        self.records.get(serial)
    }

    /// Number of revoked serials.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Lazy iterator over ledger records in ascending serial order
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    inner: Values<'a, BigUint, RevocationRecord>,
}

impl<'a> Iterator for Snapshot<'a> {
    type Item = &'a RevocationRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Snapshot<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for Snapshot<'_> {}
