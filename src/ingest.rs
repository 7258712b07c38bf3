use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use openssl::x509::X509Ref;
use tracing::{debug, info, warn};

use crate::certificate::{IssuerContext, describe_name, serial_of};
use crate::codec::{EntryReason, PriorCrl, decode_certificate, decode_crl};
use crate::error::{CrlError, CrlResult};
use crate::keystore::KeystoreLookup;
use crate::ledger::{AdmissionResult, RevocationLedger, RevocationRecord};
use crate::reason::RevocationReason;
use crate::sequence::{SequenceState, SequenceTracker};
use crate::validity::ValidityWindowCalculator;
use crate::verify::Verifier;

/// A certificate that passed the issuer check and is not yet revoked.
///
/// Only the controller hands these out, so holding one means the
/// certificate was verified. The caller collects a reason and a date and
/// passes it back to [`IngestionController::revoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationCandidate {
    serial: BigUint,
    subject: String,
}

impl RevocationCandidate {
    pub fn serial(&self) -> &BigUint {
        &self.serial
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Why an entry of an imported CRL did not make it into the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    InvalidReasonCode(i64),
    /// The reason code extension could not be decoded.
    MalformedReasonCode,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub serial: BigUint,
    pub cause: SkipCause,
}

/// Result of a bulk CRL import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub issuer: String,
    /// Number of records now in the ledger from this CRL.
    pub loaded: usize,
    pub skipped: Vec<SkippedEntry>,
    pub sequence: SequenceState,
    /// Validity period of the imported CRL, if it had a next update.
    pub period_days: Option<i64>,
}

/// Admits revocations from certificate files, keystore entries and
/// previously issued CRLs, always verifying against the issuer first.
pub struct IngestionController<V> {
    issuer: IssuerContext,
    verifier: V,
    ledger: RevocationLedger,
    sequence: SequenceState,
    /// Where the sequence restarts when an imported CRL carries no number.
    initial_sequence: SequenceState,
    prior_period_days: Option<i64>,
}

impl<V: Verifier> IngestionController<V> {
    pub fn new(issuer: IssuerContext, verifier: V, sequence: SequenceState) -> Self {
        Self {
            issuer,
            verifier,
            ledger: RevocationLedger::new(),
            initial_sequence: sequence.clone(),
            sequence,
            prior_period_days: None,
        }
    }

    pub fn issuer(&self) -> &IssuerContext {
        &self.issuer
    }

    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    pub fn sequence(&self) -> &SequenceState {
        &self.sequence
    }

    /// Period of the last imported CRL, used as the default for the new one.
    pub fn prior_period_days(&self) -> Option<i64> {
        self.prior_period_days
    }

    /// Path 1: a certificate read from a file, DER or PEM.
    pub fn candidate_from_bytes(&self, bytes: &[u8]) -> CrlResult<RevocationCandidate> {
        let cert = decode_certificate(bytes).inspect_err(|e| {
            warn!("rejected certificate file: {}", e);
        })?;
        self.candidate_from_certificate(&cert)
    }

    /// Path 2: a certificate selected from a keystore.
    pub fn candidate_from_keystore(
        &self,
        keystore: &dyn KeystoreLookup,
        alias: &str,
    ) -> CrlResult<RevocationCandidate> {
        let cert = keystore.certificate(alias).inspect_err(|e| {
            warn!("keystore lookup for {} failed: {}", alias, e);
        })?;
        self.candidate_from_certificate(&cert)
    }

    /// Common gate: issuer signature first, then the duplicate check.
    pub fn candidate_from_certificate(&self, cert: &X509Ref) -> CrlResult<RevocationCandidate> {
        let subject = describe_name(cert);
        if let Err(e) = self
            .verifier
            .verify_certificate(cert, self.issuer.public_key())
        {
            warn!("certificate {} not signed by {}: {}", subject, self.issuer.subject(), e);
            return Err(e.into());
        }

        let serial = serial_of(cert)?;
        if self.ledger.contains(&serial) {
            info!("certificate {} with serial {} is already revoked", subject, serial);
            return Err(CrlError::DuplicateRevocation { serial });
        }

        debug!("certificate {} with serial {} accepted as candidate", subject, serial);
        Ok(RevocationCandidate { serial, subject })
    }

    /// Adds a verified candidate to the ledger.
    pub fn revoke(
        &mut self,
        candidate: RevocationCandidate,
        revocation_date: DateTime<Utc>,
        reason: RevocationReason,
    ) -> CrlResult<AdmissionResult> {
        match self
            .ledger
            .admit(candidate.serial.clone(), revocation_date, reason)
        {
            AdmissionResult::AlreadyRevoked => Err(CrlError::DuplicateRevocation {
                serial: candidate.serial,
            }),
            result => {
                info!(
                    "revoked {} (serial {}) reason {}",
                    candidate.subject, candidate.serial, reason
                );
                Ok(result)
            }
        }
    }

    /// Path 3: a whole CRL whose entries replace the current ledger.
    ///
    /// On any decode or verification failure the ledger is left as it was.
    pub fn import_crl(&mut self, bytes: &[u8]) -> CrlResult<ImportReport> {
        let crl = decode_crl(bytes).inspect_err(|e| {
            warn!("rejected CRL file: {}", e);
        })?;
        self.import_decoded(&crl)
    }

    fn import_decoded(&mut self, crl: &PriorCrl) -> CrlResult<ImportReport> {
        self.verify_crl(crl)?;

        let (records, mut skipped) = admissible_records(crl);
        let mut ledger = RevocationLedger::new();
        skipped.extend(ledger.seed(records).into_iter().map(|serial| {
            warn!("duplicate serial {} in CRL from {}", serial, crl.issuer);
            SkippedEntry {
                serial,
                cause: SkipCause::Duplicate,
            }
        }));

        self.ledger = ledger;
        self.sequence = SequenceTracker::from_prior(crl, &self.initial_sequence);
        self.prior_period_days = ValidityWindowCalculator::period_from_prior(crl);

        info!(
            "imported {} revoked entries from {} ({} skipped)",
            self.ledger.len(),
            crl.issuer,
            skipped.len()
        );
        Ok(ImportReport {
            issuer: crl.issuer.clone(),
            loaded: self.ledger.len(),
            skipped,
            sequence: self.sequence.clone(),
            period_days: self.prior_period_days,
        })
    }

    /// Re-reads a CRL on top of the current ledger: its entries overwrite
    /// records with the same serial, entries added since are kept.
    pub fn refresh_from_crl(&mut self, bytes: &[u8]) -> CrlResult<ImportReport> {
        let crl = decode_crl(bytes)?;
        self.verify_crl(&crl)?;

        let (records, skipped) = admissible_records(&crl);
        let loaded = records.len();
        for record in records {
            self.ledger.admit_or_replace(
                record.serial_number,
                record.revocation_date,
                record.reason,
            );
        }
        self.sequence = SequenceTracker::from_prior(&crl, &self.initial_sequence);
        self.prior_period_days = ValidityWindowCalculator::period_from_prior(&crl);

        info!("refreshed {} revoked entries from {}", loaded, crl.issuer);
        Ok(ImportReport {
            issuer: crl.issuer.clone(),
            loaded,
            skipped,
            sequence: self.sequence.clone(),
            period_days: self.prior_period_days,
        })
    }

    pub fn clear(&mut self) {
        self.ledger.clear();
    }

    fn verify_crl(&self, crl: &PriorCrl) -> CrlResult<()> {
        self.verifier
            .verify_crl(crl, self.issuer.public_key())
            .map_err(|e| {
                warn!("CRL from {} not signed by {}: {}", crl.issuer, self.issuer.subject(), e);
                CrlError::from(e)
            })
    }
}

/// Splits CRL entries into ledger records and entries with unknown reasons.
fn admissible_records(crl: &PriorCrl) -> (Vec<RevocationRecord>, Vec<SkippedEntry>) {
    let mut records = Vec::with_capacity(crl.entries.len());
    let mut skipped = Vec::new();
    for entry in &crl.entries {
        match entry.to_record() {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("skipping serial {} from {}: {}", entry.serial, crl.issuer, e);
                let cause = match entry.reason {
                    EntryReason::Code(code) => SkipCause::InvalidReasonCode(code),
                    _ => SkipCause::MalformedReasonCode,
                };
                skipped.push(SkippedEntry {
                    serial: entry.serial.clone(),
                    cause,
                });
            }
        }
    }
    (records, skipped)
}
