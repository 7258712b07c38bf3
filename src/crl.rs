use chrono::{DateTime, Datelike, Utc};
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::X509Crl;
use tracing::{debug, info};
use yasna::Tag;
use yasna::models::ObjectIdentifier;
use yasna::tags::{TAG_BITSTRING, TAG_GENERALIZEDTIME, TAG_UTCTIME};

use crate::assembler::CrlSpecification;
use crate::certificate::{KeyAlgorithm, SignatureAlgorithm};
use crate::error::{CrlResult, SigningError};
use crate::reason::RevocationReason;

const OID_AUTHORITY_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 35];
const OID_CRL_NUMBER: &[u64] = &[2, 5, 29, 20];
const OID_REASON_CODE: &[u64] = &[2, 5, 29, 21];

/// Encodes a [`CrlSpecification`] and signs it with the issuer's private key.
pub trait CrlSigner {
    fn assemble_and_sign(&self, spec: &CrlSpecification) -> Result<SignedCrl, SigningError>;
}

/// A finished, signed CRL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCrl {
    der: Vec<u8>,
}

impl SignedCrl {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// PEM encoding with the `X509 CRL` label.
    pub fn to_pem(&self) -> CrlResult<Vec<u8>> {
        let crl = X509Crl::from_der(&self.der)?;
        Ok(crl.to_pem()?)
    }
}

/// Builds RFC 5280 v2 CRLs in DER and signs them with OpenSSL.
///
/// The produced CRL carries the authority key identifier and CRL number
/// extensions, and a reason code on every entry whose reason is not
/// `Unspecified`.
pub struct OpensslCrlSigner {
    key: PKey<Private>,
}

impl OpensslCrlSigner {
    /// # Arguments
    ///
    /// * `key` - The private key of the issuing certificate authority.
    pub fn new(key: PKey<Private>) -> Self {
        Self { key }
    }
}

impl CrlSigner for OpensslCrlSigner {
    fn assemble_and_sign(&self, spec: &CrlSpecification) -> Result<SignedCrl, SigningError> {
        let key_algorithm = KeyAlgorithm::of(&self.key)
            .ok_or_else(|| SigningError("unsupported signing key type".to_string()))?;
        if !spec.algorithm.is_compatible_with(key_algorithm) {
            return Err(SigningError(format!(
                "{} cannot sign with a {} key",
                spec.algorithm, key_algorithm
            )));
        }

        let tbs = encode_tbs(spec);
        debug!("encoded TBSCertList of {} bytes", tbs.len());

        // Sign the TBS
        let mut signer = match spec.algorithm.digest() {
            Some(digest) => Signer::new(digest, &self.key)?,
            None => Signer::new_without_digest(&self.key)?,
        };
        let signature = signer.sign_oneshot_to_vec(&tbs)?;

        // Final CRL
        let der = yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_der(&tbs);
                write_algorithm_identifier(writer.next(), spec.algorithm);

                // Signature Value
                writer
                    .next()
                    .write_tagged_implicit(TAG_BITSTRING, |writer| {
                        // First byte is the number of unused bits (0 in this case)
                        let mut bit_string = vec![0u8];
                        bit_string.extend_from_slice(&signature);
                        writer.write_bytes(&bit_string);
                    });
            });
        });

        info!(
            "signed CRL number {} for {} with {} revoked entries",
            spec.crl_number,
            spec.issuer,
            spec.records.len()
        );
        Ok(SignedCrl { der })
    }
}

fn encode_tbs(spec: &CrlSpecification) -> Vec<u8> {
    let authority_key_identifier = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_tagged_implicit(Tag::context(0), |writer| {
                    writer.write_bytes(&spec.authority_key_id);
                });
        });
    });
    let crl_number = yasna::construct_der(|writer| {
        writer.write_bigint_bytes(&spec.crl_number.to_bytes_be(), true);
    });

    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_u8(1); // Version v2

            write_algorithm_identifier(writer.next(), spec.algorithm);

            // Issuer, copied from the CA subject
            writer.next().write_der(&spec.issuer_name_der);

            // thisUpdate and nextUpdate
            write_time(writer.next(), &spec.this_update);
            write_time(writer.next(), &spec.next_update);

            // Revoked Certificates, absent when there are none
            if !spec.records.is_empty() {
                writer.next().write_sequence_of(|writer| {
                    for record in &spec.records {
                        writer.next().write_sequence(|writer| {
                            writer
                                .next()
                                .write_bigint_bytes(&record.serial_number.to_bytes_be(), true);
                            write_time(writer.next(), &record.revocation_date);
                            if record.reason != RevocationReason::Unspecified {
                                let reason = yasna::construct_der(|writer| {
                                    writer.write_enum(i64::from(record.reason.code()));
                                });
                                writer.next().write_sequence(|writer| {
                                    write_extension(writer.next(), OID_REASON_CODE, &reason);
                                });
                            }
                        });
                    }
                });
            }

            // crlExtensions [0] EXPLICIT
            writer.next().write_tagged(Tag::context(0), |writer| {
                writer.write_sequence(|writer| {
                    write_extension(
                        writer.next(),
                        OID_AUTHORITY_KEY_IDENTIFIER,
                        &authority_key_identifier,
                    );
                    write_extension(writer.next(), OID_CRL_NUMBER, &crl_number);
                });
            });
        });
    })
}

/// Non-critical extension: OID followed by the DER value wrapped in an OCTET STRING.
fn write_extension(writer: yasna::DERWriter, oid: &[u64], value: &[u8]) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
        writer.next().write_bytes(value);
    });
}

fn write_algorithm_identifier(writer: yasna::DERWriter, algorithm: SignatureAlgorithm) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(algorithm.oid()));
        if algorithm.has_null_parameters() {
            writer.next().write_null();
        }
    });
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 section 5.1.2.4).
fn write_time(writer: yasna::DERWriter, time: &DateTime<Utc>) {
    if (1950..2050).contains(&time.year()) {
        let time_str = time.format("%y%m%d%H%M%SZ").to_string();
        writer.write_tagged_implicit(TAG_UTCTIME, |writer| {
            writer.write_bytes(time_str.as_bytes());
        });
    } else {
        let time_str = time.format("%Y%m%d%H%M%SZ").to_string();
        writer.write_tagged_implicit(TAG_GENERALIZEDTIME, |writer| {
            writer.write_bytes(time_str.as_bytes());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time_der(time: DateTime<Utc>) -> Vec<u8> {
        yasna::construct_der(|writer| write_time(writer, &time))
    }

    #[test]
    fn test_write_time_uses_utc_time_before_2050() {
        let der = time_der(Utc.with_ymd_and_hms(2024, 7, 29, 14, 16, 55).unwrap());
        assert_eq!(der[0], 0x17);
        assert_eq!(&der[2..], b"240729141655Z");
    }

    #[test]
    fn test_write_time_uses_generalized_time_from_2050() {
        let der = time_der(Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(der[0], 0x18);
        assert_eq!(&der[2..], b"20500101000000Z");
    }

    #[test]
    fn test_rsa_algorithm_identifier_has_null() {
        let der = yasna::construct_der(|writer| {
            write_algorithm_identifier(
                writer,
                SignatureAlgorithm::Rsa(crate::certificate::HashAlg::SHA256),
            )
        });
        assert_eq!(&der[der.len() - 2..], &[0x05, 0x00]);

        let der = yasna::construct_der(|writer| {
            write_algorithm_identifier(writer, SignatureAlgorithm::Ed25519)
        });
        assert_eq!(der, vec![0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    }
}
