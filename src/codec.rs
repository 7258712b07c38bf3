//! Decoding of certificates and CRLs handed to the engine, DER or PEM.

use chrono::{DateTime, TimeZone, Utc};
use num_bigint::BigUint;
use openssl::x509::{X509, X509Crl, X509Ref};
use tracing::{debug, warn};
use x509_parser::prelude::*;

use crate::certificate::serial_of;
use crate::error::{CrlError, CrlResult};
use crate::ledger::RevocationRecord;
use crate::reason::RevocationReason;

pub(crate) const OID_CRL_NUMBER: &str = "2.5.29.20";
pub(crate) const OID_REASON_CODE: &str = "2.5.29.21";

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// The `reasonCode` extension of a CRL entry as it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryReason {
    Absent,
    Code(i64),
    /// The extension is present but is not a DER ENUMERATED.
    Malformed(String),
}

impl EntryReason {
    /// The decoded code, if there is one.
    pub fn code(&self) -> Option<i64> {
        match self {
            EntryReason::Code(code) => Some(*code),
            _ => None,
        }
    }
}

/// A revoked entry as found in a decoded CRL, reason still unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRevokedEntry {
    pub serial: BigUint,
    pub revocation_date: DateTime<Utc>,
    pub reason: EntryReason,
}

impl RawRevokedEntry {
    /// Converts to a ledger record, defaulting to `Unspecified` when no reason
    /// was given and failing on malformed extensions or codes outside the
    /// closed set.
    pub fn to_record(&self) -> CrlResult<RevocationRecord> {
        let reason = match &self.reason {
            EntryReason::Absent => RevocationReason::Unspecified,
            EntryReason::Code(code) => RevocationReason::from_code(*code)?,
            EntryReason::Malformed(cause) => return Err(CrlError::Decode(cause.clone())),
        };
        Ok(RevocationRecord::new(
            self.serial.clone(),
            self.revocation_date,
            reason,
        ))
    }
}

/// A decoded CRL, usually the one issued before the CRL being built.
///
/// Only [`decode_crl`] produces one, so the entries always come from the
/// same bytes whose signature gets verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorCrl {
    pub(crate) der: Vec<u8>,
    pub(crate) issuer: String,
    pub(crate) issuer_der: Vec<u8>,
    pub(crate) this_update: DateTime<Utc>,
    pub(crate) next_update: Option<DateTime<Utc>>,
    pub(crate) entries: Vec<RawRevokedEntry>,
    pub(crate) crl_number_extension: Option<Vec<u8>>,
}

impl PriorCrl {
    /// The CRL exactly as it was read, DER encoded.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    pub fn entries(&self) -> &[RawRevokedEntry] {
        &self.entries
    }

    /// Raw value of the CRL number extension, not yet decoded.
    pub fn crl_number_extension(&self) -> Option<&[u8]> {
        self.crl_number_extension.as_deref()
    }
}

/// Decodes a certificate from DER or PEM bytes.
pub fn decode_certificate(bytes: &[u8]) -> CrlResult<X509> {
    let cert = if is_pem(bytes) {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    };
    cert.map_err(|e| CrlError::Decode(format!("not a certificate: {e}")))
}

/// Decodes a CRL from DER or PEM bytes.
pub fn decode_crl(bytes: &[u8]) -> CrlResult<PriorCrl> {
    let der = if is_pem(bytes) {
        X509Crl::from_pem(bytes)
            .and_then(|crl| crl.to_der())
            .map_err(|e| CrlError::Decode(format!("not a PEM CRL: {e}")))?
    } else {
        bytes.to_vec()
    };
    parse_crl_der(der)
}

fn parse_crl_der(der: Vec<u8>) -> CrlResult<PriorCrl> {
    let (_, crl) = CertificateRevocationList::from_der(&der)
        .map_err(|e| CrlError::Decode(format!("CRL parsing failed: {e}")))?;

    let issuer = crl.tbs_cert_list.issuer.to_string();
    let issuer_der = crl.tbs_cert_list.issuer.as_raw().to_vec();
    let this_update = asn1_time_to_utc(crl.last_update())?;
    let next_update = crl.next_update().map(asn1_time_to_utc).transpose()?;

    let mut entries = Vec::new();
    for revoked in crl.iter_revoked_certificates() {
        let serial = BigUint::from_bytes_be(revoked.raw_serial());
        let reason = match revoked
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == OID_REASON_CODE)
        {
            Some(ext) => decode_reason_code(ext.value).unwrap_or_else(|cause| {
                warn!("entry {} of {} has a malformed reason code", serial, issuer);
                EntryReason::Malformed(cause)
            }),
            None => EntryReason::Absent,
        };
        entries.push(RawRevokedEntry {
            serial,
            revocation_date: asn1_time_to_utc(revoked.revocation_date)?,
            reason,
        });
    }

    let crl_number_extension = crl
        .extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == OID_CRL_NUMBER)
        .map(|ext| ext.value.to_vec());

    debug!(
        "decoded CRL from {} with {} revoked entries",
        issuer,
        entries.len()
    );

    Ok(PriorCrl {
        der,
        issuer,
        issuer_der,
        this_update,
        next_update,
        entries,
        crl_number_extension,
    })
}

/// Decodes the CRL number extension of a CRL.
///
/// Returns `None` when the extension is absent or does not hold a
/// non-negative INTEGER.
pub fn decode_crl_number_extension(crl: &PriorCrl) -> Option<BigUint> {
    let value = crl.crl_number_extension.as_ref()?;
    match yasna::parse_der(value, |reader| reader.read_bigint_bytes()) {
        Ok((bytes, true)) => Some(BigUint::from_bytes_be(&bytes)),
        Ok((_, false)) => {
            warn!("CRL number extension of {} is negative", crl.issuer);
            None
        }
        Err(e) => {
            warn!("malformed CRL number extension in {}: {}", crl.issuer, e);
            None
        }
    }
}

/// File name under which the last CRL issued by `ca` is kept next to its
/// keystore: the CA serial in lower-case hexadecimal without leading zeros,
/// followed by `.db`.
pub fn prior_crl_file_name(ca: &X509Ref) -> CrlResult<String> {
    Ok(format!("{}.db", serial_of(ca)?.to_str_radix(16)))
}

fn decode_reason_code(value: &[u8]) -> Result<EntryReason, String> {
    yasna::parse_der(value, |reader| reader.read_enum())
        .map(EntryReason::Code)
        .map_err(|e| format!("malformed reason code extension: {e}"))
}

fn asn1_time_to_utc(time: ASN1Time) -> CrlResult<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| CrlError::Decode(format!("time out of range: {time}")))
}

fn is_pem(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PEM_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior_with_extension(value: Option<Vec<u8>>) -> PriorCrl {
        PriorCrl {
            der: Vec::new(),
            issuer: "CN=Test".to_string(),
            issuer_der: Vec::new(),
            this_update: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            next_update: None,
            entries: Vec::new(),
            crl_number_extension: value,
        }
    }

    #[test]
    fn test_decode_crl_number() {
        let value = yasna::construct_der(|w| w.write_u64(41));
        let crl = prior_with_extension(Some(value));
        assert_eq!(decode_crl_number_extension(&crl), Some(BigUint::from(41u32)));
    }

    #[test]
    fn test_decode_crl_number_absent() {
        assert_eq!(decode_crl_number_extension(&prior_with_extension(None)), None);
    }

    #[test]
    fn test_decode_crl_number_malformed() {
        let crl = prior_with_extension(Some(vec![0x04, 0x01, 0xff]));
        assert_eq!(decode_crl_number_extension(&crl), None);
    }

    #[test]
    fn test_decode_crl_number_negative() {
        let value = yasna::construct_der(|w| w.write_i64(-3));
        let crl = prior_with_extension(Some(value));
        assert_eq!(decode_crl_number_extension(&crl), None);
    }

    #[test]
    fn test_raw_entry_defaults_to_unspecified() {
        let entry = RawRevokedEntry {
            serial: BigUint::from(5u32),
            revocation_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            reason: EntryReason::Absent,
        };
        assert_eq!(
            entry.to_record().unwrap().reason,
            RevocationReason::Unspecified
        );
    }

    #[test]
    fn test_raw_entry_with_unknown_reason_is_rejected() {
        let entry = RawRevokedEntry {
            serial: BigUint::from(5u32),
            revocation_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            reason: EntryReason::Code(7),
        };
        assert!(matches!(
            entry.to_record(),
            Err(CrlError::InvalidReasonCode(7))
        ));
    }

    #[test]
    fn test_reason_code_must_be_enumerated() {
        // INTEGER 1 where an ENUMERATED is expected
        assert!(decode_reason_code(&[0x02, 0x01, 0x01]).is_err());
        assert_eq!(
            decode_reason_code(&[0x0a, 0x01, 0x01]),
            Ok(EntryReason::Code(1))
        );

        let entry = RawRevokedEntry {
            serial: BigUint::from(5u32),
            revocation_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            reason: EntryReason::Malformed("bad".to_string()),
        };
        assert!(matches!(entry.to_record(), Err(CrlError::Decode(_))));
        assert_eq!(entry.reason.code(), None);
    }

    #[test]
    fn test_decode_invalid_data() {
        assert!(matches!(
            decode_crl(b"not-a-valid-der"),
            Err(CrlError::Decode(_))
        ));
        assert!(matches!(
            decode_certificate(b"not-a-valid-der"),
            Err(CrlError::Decode(_))
        ));
    }

    #[test]
    fn test_pem_detection_skips_leading_whitespace() {
        assert!(is_pem(b"\n  -----BEGIN X509 CRL-----"));
        assert!(!is_pem(&[0x30, 0x82, 0x01]));
        assert!(!is_pem(b""));
    }
}
