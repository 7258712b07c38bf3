use std::fmt;

use num_bigint::BigUint;
use openssl::hash::{MessageDigest, hash};
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, Id, PKey, PKeyRef, Public};
use openssl::x509::{X509, X509Ref};
use serde::Deserialize;
use x509_parser::parse_x509_certificate;

use crate::error::{CrlError, CrlResult};

/// Family of the issuer key, which decides the usable signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Ed25519,
}

impl KeyAlgorithm {
    /// Returns `None` for key types no CRL signature algorithm is defined for here.
    pub fn of<T: HasPublic>(pkey: &PKeyRef<T>) -> Option<Self> {
        match pkey.id() {
            Id::RSA => Some(KeyAlgorithm::Rsa),
            Id::EC => Some(KeyAlgorithm::Ec),
            Id::ED25519 => Some(KeyAlgorithm::Ed25519),
            _ => None,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ec => "EC",
            KeyAlgorithm::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

/// Defines which hash algorithm to be used in CRL signing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlg {
    SHA1,
    #[default]
    SHA256,
    SHA384,
    SHA512,
}

impl HashAlg {
    pub fn digest(self) -> MessageDigest {
        match self {
            HashAlg::SHA1 => MessageDigest::sha1(),
            HashAlg::SHA256 => MessageDigest::sha256(),
            HashAlg::SHA384 => MessageDigest::sha384(),
            HashAlg::SHA512 => MessageDigest::sha512(),
        }
    }
}

/// Signature algorithm used for the CRL signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Rsa(HashAlg),
    Ecdsa(HashAlg),
    Ed25519,
}

impl SignatureAlgorithm {
    /// The algorithm picked when the operator does not choose one.
    pub fn default_for(key: KeyAlgorithm, hash: HashAlg) -> Self {
        match key {
            KeyAlgorithm::Rsa => SignatureAlgorithm::Rsa(hash),
            KeyAlgorithm::Ec => SignatureAlgorithm::Ecdsa(hash),
            KeyAlgorithm::Ed25519 => SignatureAlgorithm::Ed25519,
        }
    }

    /// All algorithms that can be used with a key of the given family.
    pub fn for_key(key: KeyAlgorithm) -> Vec<Self> {
        let hashes = [HashAlg::SHA1, HashAlg::SHA256, HashAlg::SHA384, HashAlg::SHA512];
        match key {
            KeyAlgorithm::Rsa => hashes.into_iter().map(SignatureAlgorithm::Rsa).collect(),
            KeyAlgorithm::Ec => hashes.into_iter().map(SignatureAlgorithm::Ecdsa).collect(),
            KeyAlgorithm::Ed25519 => vec![SignatureAlgorithm::Ed25519],
        }
    }

    pub fn key_algorithm(self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::Rsa(_) => KeyAlgorithm::Rsa,
            SignatureAlgorithm::Ecdsa(_) => KeyAlgorithm::Ec,
            SignatureAlgorithm::Ed25519 => KeyAlgorithm::Ed25519,
        }
    }

    pub fn is_compatible_with(self, key: KeyAlgorithm) -> bool {
        self.key_algorithm() == key
    }

    /// Digest fed to the signer, `None` for algorithms that hash internally.
    pub fn digest(self) -> Option<MessageDigest> {
        match self {
            SignatureAlgorithm::Rsa(hash) | SignatureAlgorithm::Ecdsa(hash) => Some(hash.digest()),
            SignatureAlgorithm::Ed25519 => None,
        }
    }

    pub fn oid(self) -> &'static [u64] {
        match self {
            SignatureAlgorithm::Rsa(HashAlg::SHA1) => &[1, 2, 840, 113549, 1, 1, 5],
            SignatureAlgorithm::Rsa(HashAlg::SHA256) => &[1, 2, 840, 113549, 1, 1, 11],
            SignatureAlgorithm::Rsa(HashAlg::SHA384) => &[1, 2, 840, 113549, 1, 1, 12],
            SignatureAlgorithm::Rsa(HashAlg::SHA512) => &[1, 2, 840, 113549, 1, 1, 13],
            SignatureAlgorithm::Ecdsa(HashAlg::SHA1) => &[1, 2, 840, 10045, 4, 1],
            SignatureAlgorithm::Ecdsa(HashAlg::SHA256) => &[1, 2, 840, 10045, 4, 3, 2],
            SignatureAlgorithm::Ecdsa(HashAlg::SHA384) => &[1, 2, 840, 10045, 4, 3, 3],
            SignatureAlgorithm::Ecdsa(HashAlg::SHA512) => &[1, 2, 840, 10045, 4, 3, 4],
            SignatureAlgorithm::Ed25519 => &[1, 3, 101, 112],
        }
    }

    /// RSA algorithm identifiers carry explicit NULL parameters, ECDSA and
    /// EdDSA ones carry none.
    pub fn has_null_parameters(self) -> bool {
        matches!(self, SignatureAlgorithm::Rsa(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            SignatureAlgorithm::Rsa(HashAlg::SHA1) => "sha1WithRSAEncryption",
            SignatureAlgorithm::Rsa(HashAlg::SHA256) => "sha256WithRSAEncryption",
            SignatureAlgorithm::Rsa(HashAlg::SHA384) => "sha384WithRSAEncryption",
            SignatureAlgorithm::Rsa(HashAlg::SHA512) => "sha512WithRSAEncryption",
            SignatureAlgorithm::Ecdsa(HashAlg::SHA1) => "ecdsa-with-SHA1",
            SignatureAlgorithm::Ecdsa(HashAlg::SHA256) => "ecdsa-with-SHA256",
            SignatureAlgorithm::Ecdsa(HashAlg::SHA384) => "ecdsa-with-SHA384",
            SignatureAlgorithm::Ecdsa(HashAlg::SHA512) => "ecdsa-with-SHA512",
            SignatureAlgorithm::Ed25519 => "ED25519",
        }
    }

    /// Looks an algorithm up by the name OpenSSL prints for it.
    pub fn from_name(name: &str) -> Option<Self> {
        [KeyAlgorithm::Rsa, KeyAlgorithm::Ec, KeyAlgorithm::Ed25519]
            .into_iter()
            .flat_map(SignatureAlgorithm::for_key)
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The certificate authority a CRL is built for.
///
/// Candidates and imported CRLs are verified against its public key and its
/// subject becomes the issuer of the new CRL.
pub struct IssuerContext {
    certificate: X509,
    public_key: PKey<Public>,
    key_algorithm: KeyAlgorithm,
}

impl IssuerContext {
    pub fn new(certificate: X509) -> CrlResult<Self> {
        let public_key = certificate.public_key()?;
        let key_algorithm = KeyAlgorithm::of(&public_key).ok_or(CrlError::UnsupportedKey)?;
        Ok(Self {
            certificate,
            public_key,
            key_algorithm,
        })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    pub fn public_key(&self) -> &PKeyRef<Public> {
        &self.public_key
    }

    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }

    /// DER encoding of the subject name, used verbatim as the CRL issuer.
    pub fn subject_name_der(&self) -> CrlResult<Vec<u8>> {
        Ok(self.certificate.subject_name().to_der()?)
    }

    /// Readable subject, e.g. `CN=My Test Ca, O=my org`.
    pub fn subject(&self) -> String {
        describe_name(&self.certificate)
    }

    pub fn common_name(&self) -> Option<String> {
        get_clean_subject_name(&self.certificate)
    }

    pub fn serial_number(&self) -> CrlResult<BigUint> {
        serial_of(&self.certificate)
    }

    /// Key identifier for the authority key identifier extension: the
    /// subject key identifier when the CA carries one, otherwise the SHA-1
    /// of the subject public key bits (RFC 5280 section 4.2.1.2, method 1).
    pub fn key_identifier(&self) -> CrlResult<Vec<u8>> {
        if let Some(ski) = self.certificate.subject_key_id() {
            return Ok(ski.as_slice().to_vec());
        }
        let der = self.certificate.to_der()?;
        let (_, parsed) =
            parse_x509_certificate(&der).map_err(|e| CrlError::Decode(e.to_string()))?;
        let digest = hash(
            MessageDigest::sha1(),
            &parsed.public_key().subject_public_key.data,
        )?;
        Ok(digest.to_vec())
    }
}

/// Serial number of a certificate as an unsigned big integer.
pub fn serial_of(cert: &X509Ref) -> CrlResult<BigUint> {
    let bytes = cert.serial_number().to_bn()?.to_vec();
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Readable subject of a certificate, entries joined the way OpenSSL prints them.
pub fn describe_name(cert: &X509Ref) -> String {
    cert.subject_name()
        .entries()
        .filter_map(|entry| {
            let key = entry.object().nid().short_name().ok()?;
            let value = entry.data().as_utf8().ok()?;
            Some(format!("{key}={value}"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn get_clean_subject_name(x509: &X509Ref) -> Option<String> {
    let subject_name = x509.subject_name();
    let entry = subject_name.entries_by_nid(Nid::COMMONNAME).next()?;
    entry.data().as_utf8().ok().map(|data| data.to_string())
}
