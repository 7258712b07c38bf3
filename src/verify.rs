use openssl::pkey::{PKeyRef, Public};
use openssl::x509::{X509Crl, X509Ref};
use tracing::debug;

use crate::codec::PriorCrl;
use crate::error::VerificationFailure;

/// Checks that revocation material was signed by the issuing authority.
///
/// Implementations are pure: they never touch a ledger, they only answer
/// whether the signature verifies under `issuer_key`.
pub trait Verifier {
    fn verify_certificate(
        &self,
        cert: &X509Ref,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure>;

    fn verify_crl(
        &self,
        crl: &PriorCrl,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure>;
}

/// [`Verifier`] backed by OpenSSL signature checks
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslVerifier;

impl Verifier for OpensslVerifier {
    fn verify_certificate(
        &self,
        cert: &X509Ref,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure> {
        match cert.verify(issuer_key) {
            Ok(true) => {
                debug!("[OK] certificate signature verification passed");
                Ok(())
            }
            Ok(false) => Err(VerificationFailure(
                "certificate was not signed by the issuer".to_string(),
            )),
            Err(e) => Err(VerificationFailure(e.to_string())),
        }
    }

    fn verify_crl(
        &self,
        crl: &PriorCrl,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure> {
        let parsed = X509Crl::from_der(&crl.der).map_err(|e| VerificationFailure(e.to_string()))?;
        match parsed.verify(issuer_key) {
            Ok(true) => {
                debug!("[OK] CRL signature verification passed");
                Ok(())
            }
            Ok(false) => Err(VerificationFailure(format!(
                "CRL from {} was not signed by the issuer",
                crl.issuer
            ))),
            Err(e) => Err(VerificationFailure(e.to_string())),
        }
    }
}

impl<V: Verifier + ?Sized> Verifier for &V {
    fn verify_certificate(
        &self,
        cert: &X509Ref,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure> {
        (**self).verify_certificate(cert, issuer_key)
    }

    fn verify_crl(
        &self,
        crl: &PriorCrl,
        issuer_key: &PKeyRef<Public>,
    ) -> Result<(), VerificationFailure> {
        (**self).verify_crl(crl, issuer_key)
    }
}
