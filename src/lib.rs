//! # CRL-Assembler
//!
//! ## Description
//!
//! The engine behind "sign a new CRL" in a certificate-management tool, built on the
//! OpenSSL crate for signature checks and signing and on yasna for the DER encoding.
//!
//! It takes care of:
//! - Collecting revoked certificates from certificate files, keystore entries and
//!   previously issued CRLs
//! - Verifying every certificate and CRL against the issuing CA before it is accepted
//! - Keeping exactly one entry per serial number, ordered by serial number
//! - Continuing the CRL number from the last CRL issued by the CA
//! - Computing `thisUpdate`/`nextUpdate` from an effective date and a period
//! - Encoding and signing an X.509 v2 CRL with the authority key identifier and
//!   CRL number extensions and a reason code per entry
//!
//! File choosers, dialogs and keystore file formats are left to the caller.
//!
//! ## Building a CRL that continues from the previous one
//! ```rust,no_run
//! use chrono::Utc;
//! use crl_assembler::certificate::IssuerContext;
//! use crl_assembler::config::CrlSettings;
//! use crl_assembler::crl::OpensslCrlSigner;
//! use crl_assembler::reason::RevocationReason;
//! use crl_assembler::session::{CrlSession, FinalizeRequest};
//! use crl_assembler::verify::OpensslVerifier;
//! use openssl::pkey::PKey;
//! use openssl::x509::X509;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ca = X509::from_pem(&std::fs::read("ca_cert.pem")?)?;
//! let ca_key = PKey::private_key_from_pem(&std::fs::read("ca_pkey.pem")?)?;
//! let issuer = IssuerContext::new(ca)?;
//!
//! let prior = std::fs::read("previous.crl")?;
//! let (mut session, report) =
//!     CrlSession::continue_from(issuer, OpensslVerifier, CrlSettings::load()?, &prior)?;
//! println!("{} entries carried over, next number {}", report.loaded, report.sequence.next);
//!
//! // a certificate picked by the operator
//! let candidate = session.candidate_from_bytes(&std::fs::read("leaf_cert.pem")?)?;
//! session.revoke(candidate, Utc::now(), RevocationReason::KeyCompromise)?;
//!
//! let signer = OpensslCrlSigner::new(ca_key);
//! let crl = session.finalize(FinalizeRequest::new(Utc::now()), &signer)?;
//! std::fs::write("new.crl", crl.to_pem()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every rejected candidate comes back as a [`CrlError`](error::CrlError):
//!
//! | error | when | effect |
//! | --------------------- | ----------------------------------------------- | ------------------------------ |
//! | DuplicateRevocation | the serial is already in the list | candidate ignored |
//! | Verification | not signed by the CA | candidate or CRL ignored |
//! | Decode | bytes are not a certificate or CRL | candidate or CRL ignored |
//! | InvalidReasonCode | an imported entry has an unknown or malformed reason | that entry is skipped |
//! | InvalidValidityWindow | next update before the effective date, or a period out of range | finalize refused |
//! | InvalidCrlNumber | CRL number below 1 | finalize refused |
//! | IncompatibleAlgorithm | algorithm does not match the CA key | finalize refused |
//! | Signing | the signer failed | session ends |
//!
//! ## Config
//!
//! [`CrlSettings`](config::CrlSettings) is read from `config/crl.*` and `CRL_*` environment variables
//! | keyword | description | default |
//! | ------------------- | ---------------------------------------------------- | ------- |
//! | default_period_days | validity period when there is no prior CRL | 30 |
//! | default_crl_number | number of the first CRL issued for a CA | 1 |
//! | hash | hash of the default signature algorithm: sha1, sha256, sha384, sha512 | sha256 |

pub mod assembler;
pub mod certificate;
pub mod codec;
pub mod config;
pub mod crl;
pub mod error;
pub mod ingest;
pub mod keystore;
pub mod ledger;
pub mod reason;
pub mod sequence;
pub mod session;
pub mod validity;
pub mod verify;

pub use error::{CrlError, CrlResult};
