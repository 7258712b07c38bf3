use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use thiserror::Error;

use crate::certificate::{KeyAlgorithm, SignatureAlgorithm};

/// A certificate or CRL did not verify against the issuer public key.
///
/// Signature mismatch, unsupported algorithm and malformed input all end up
/// here; callers only need to know the candidate was rejected and why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("verification against the issuer key failed: {0}")]
pub struct VerificationFailure(pub String);

/// The encode-and-sign collaborator could not produce a CRL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("CRL signing failed: {0}")]
pub struct SigningError(pub String);

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        SigningError(err.to_string())
    }
}

/// Errors raised while collecting revocations and assembling a CRL
#[derive(Error, Debug)]
pub enum CrlError {
    #[error("certificate with serial {serial} is already revoked")]
    DuplicateRevocation { serial: BigUint },

    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("invalid validity window starting {effective}: {detail}")]
    InvalidValidityWindow {
        effective: DateTime<Utc>,
        detail: String,
    },

    #[error("invalid revocation reason code: {0}")]
    InvalidReasonCode(i64),

    #[error("CRL number must be a positive integer")]
    InvalidCrlNumber,

    #[error("signature algorithm {algorithm} cannot be used with a {key} key")]
    IncompatibleAlgorithm {
        algorithm: SignatureAlgorithm,
        key: KeyAlgorithm,
    },

    #[error("unsupported issuer key type")]
    UnsupportedKey,

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("no certificate found for keystore alias {0}")]
    KeystoreEntryNotFound(String),

    #[error("the CRL session is closed")]
    SessionClosed,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<openssl::error::ErrorStack> for CrlError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        CrlError::Decode(err.to_string())
    }
}

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;
