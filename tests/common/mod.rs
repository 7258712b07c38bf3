#![allow(dead_code)]

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};
use openssl::x509::{X509, X509NameBuilder};
use tracing_subscriber::EnvFilter;
use yasna::{DERWriter, Tag};
use yasna::models::ObjectIdentifier;
use yasna::tags::{TAG_BITSTRING, TAG_UTCTIME};

use crl_assembler::assembler::CrlAssembler;
use crl_assembler::certificate::{HashAlg, IssuerContext, SignatureAlgorithm};
use crl_assembler::crl::{CrlSigner, OpensslCrlSigner};
use crl_assembler::ledger::RevocationRecord;
use crl_assembler::validity::ValidityWindowCalculator;
use num_bigint::BigUint;

static INIT: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

/// Defines what type of key a test certificate gets
#[derive(Clone, Copy)]
pub enum KeyType {
    RSA2048,
    P256,
    Ed25519,
}

/// Holds a generated certificate and its private key
#[derive(Clone)]
pub struct TestCert {
    pub x509: X509,
    pub pkey: PKey<Private>,
}

impl TestCert {
    pub fn issuer(&self) -> IssuerContext {
        IssuerContext::new(self.x509.clone()).expect("issuer context")
    }

    pub fn pem(&self) -> Vec<u8> {
        self.x509.to_pem().expect("certificate pem")
    }

    pub fn der(&self) -> Vec<u8> {
        self.x509.to_der().expect("certificate der")
    }
}

fn select_key(key_type: KeyType) -> PKey<Private> {
    match key_type {
        KeyType::P256 => {
            let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
            PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
        }
        KeyType::Ed25519 => PKey::generate_ed25519().unwrap(),
        KeyType::RSA2048 => PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
    }
}

fn select_hash(pkey: &PKey<Private>) -> MessageDigest {
    match pkey.id() {
        Id::ED25519 => MessageDigest::null(),
        _ => MessageDigest::sha256(),
    }
}

fn build(
    common_name: &str,
    serial: u32,
    key_type: KeyType,
    is_ca: bool,
    signer: Option<&TestCert>,
) -> TestCert {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    name_builder
        .append_entry_by_nid(Nid::ORGANIZATIONNAME, "my org")
        .unwrap();
    let name = name_builder.build();

    let pkey = select_key(key_type);
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    match signer {
        Some(signer) => builder.set_issuer_name(signer.x509.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }

    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(ski).unwrap();
    } else {
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
    }

    let signing_key = signer.map(|s| &s.pkey).unwrap_or(&pkey);
    builder
        .sign(signing_key, select_hash(signing_key))
        .unwrap();
    TestCert {
        x509: builder.build(),
        pkey,
    }
}

/// Self signed CA certificate that may sign certificates and CRLs.
pub fn ca(common_name: &str, key_type: KeyType) -> TestCert {
    build(common_name, 1, key_type, true, None)
}

/// End entity certificate with a fixed serial, signed by `signer`.
pub fn leaf(common_name: &str, serial: u32, signer: &TestCert) -> TestCert {
    build(common_name, serial, KeyType::P256, false, Some(signer))
}

/// A revoked entry for [`raw_crl`], the reason code is written as is.
pub struct RawEntry {
    pub serial: u32,
    pub revocation_date: DateTime<Utc>,
    /// DER value of the reason code extension.
    pub reason_value: Option<Vec<u8>>,
}

impl RawEntry {
    /// Entry with the reason written as an ENUMERATED, whatever its value.
    pub fn new(serial: u32, revocation_date: DateTime<Utc>, reason_code: Option<i64>) -> Self {
        Self {
            serial,
            revocation_date,
            reason_value: reason_code.map(|code| yasna::construct_der(|w| w.write_enum(code))),
        }
    }

    /// Entry whose reason code extension carries arbitrary bytes.
    pub fn with_reason_value(serial: u32, revocation_date: DateTime<Utc>, value: Vec<u8>) -> Self {
        Self {
            serial,
            revocation_date,
            reason_value: Some(value),
        }
    }
}

/// Hand rolled CRL so tests can produce content the library refuses to
/// write: unknown or malformed reason codes, or a missing CRL number.
pub fn raw_crl(
    signer: &TestCert,
    entries: &[RawEntry],
    crl_number: Option<u64>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
) -> Vec<u8> {
    let (sig_oid, with_null): (&[u64], bool) = match signer.pkey.id() {
        Id::RSA => (&[1, 2, 840, 113549, 1, 1, 11], true),
        Id::EC => (&[1, 2, 840, 10045, 4, 3, 2], false),
        _ => panic!("raw_crl supports RSA and EC signers"),
    };
    let issuer = signer.x509.subject_name().to_der().unwrap();

    let tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_u8(1);
            write_alg(writer.next(), sig_oid, with_null);
            writer.next().write_der(&issuer);
            write_time(writer.next(), &this_update);
            if let Some(next_update) = &next_update {
                write_time(writer.next(), next_update);
            }
            if !entries.is_empty() {
                writer.next().write_sequence_of(|writer| {
                    for entry in entries {
                        writer.next().write_sequence(|writer| {
                            writer.next().write_u32(entry.serial);
                            write_time(writer.next(), &entry.revocation_date);
                            if let Some(value) = &entry.reason_value {
                                writer.next().write_sequence(|writer| {
                                    writer.next().write_sequence(|writer| {
                                        writer
                                            .next()
                                            .write_oid(&ObjectIdentifier::from_slice(&[2, 5, 29, 21]));
                                        writer.next().write_bytes(value);
                                    });
                                });
                            }
                        });
                    }
                });
            }
            if let Some(number) = crl_number {
                let value = yasna::construct_der(|w| w.write_u64(number));
                writer.next().write_tagged(Tag::context(0), |writer| {
                    writer.write_sequence(|writer| {
                        writer.next().write_sequence(|writer| {
                            writer
                                .next()
                                .write_oid(&ObjectIdentifier::from_slice(&[2, 5, 29, 20]));
                            writer.next().write_bytes(&value);
                        });
                    });
                });
            }
        });
    });

    let mut sig = Signer::new(MessageDigest::sha256(), &signer.pkey).unwrap();
    sig.update(&tbs).unwrap();
    let signature = sig.sign_to_vec().unwrap();

    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            write_alg(writer.next(), sig_oid, with_null);
            writer.next().write_tagged_implicit(TAG_BITSTRING, |writer| {
                let mut bit_string = vec![0u8];
                bit_string.extend_from_slice(&signature);
                writer.write_bytes(&bit_string);
            });
        });
    })
}

/// CRL issued by `ca` through the library, DER encoded.
pub fn issue_crl(
    ca: &TestCert,
    records: &[RevocationRecord],
    crl_number: u64,
    this_update: DateTime<Utc>,
    period_days: i64,
) -> Vec<u8> {
    let issuer = ca.issuer();
    let window =
        ValidityWindowCalculator::from_period(this_update, period_days).expect("validity window");
    let algorithm = SignatureAlgorithm::default_for(issuer.key_algorithm(), HashAlg::SHA256);
    let spec = CrlAssembler::new(&issuer)
        .assemble(&window, &BigUint::from(crl_number), records, algorithm)
        .expect("assemble CRL");
    OpensslCrlSigner::new(ca.pkey.clone())
        .assemble_and_sign(&spec)
        .expect("sign CRL")
        .into_der()
}

fn write_alg(writer: DERWriter, oid: &[u64], with_null: bool) {
    writer.write_sequence(|writer| {
        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
        if with_null {
            writer.next().write_null();
        }
    });
}

fn write_time(writer: DERWriter, time: &DateTime<Utc>) {
    let time_str = time.format("%y%m%d%H%M%SZ").to_string();
    writer.write_tagged_implicit(TAG_UTCTIME, |writer| {
        writer.write_bytes(time_str.as_bytes());
    });
}
