use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use tracing::{info, warn};

use crate::certificate::{IssuerContext, SignatureAlgorithm};
use crate::crl::{CrlSigner, SignedCrl};
use crate::error::{CrlError, CrlResult};
use crate::ledger::RevocationRecord;
use crate::validity::ValidityWindow;

/// Everything needed to encode and sign a CRL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlSpecification {
    /// Readable issuer subject, for logs and display.
    pub issuer: String,
    /// DER encoded issuer name.
    pub issuer_name_der: Vec<u8>,
    pub authority_key_id: Vec<u8>,
    pub this_update: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub crl_number: BigUint,
    /// Revoked entries in ascending serial order.
    pub records: Vec<RevocationRecord>,
    pub algorithm: SignatureAlgorithm,
}

/// Checks the finalize preconditions and hands the result to a [`CrlSigner`].
pub struct CrlAssembler<'a> {
    issuer: &'a IssuerContext,
}

impl<'a> CrlAssembler<'a> {
    pub fn new(issuer: &'a IssuerContext) -> Self {
        Self { issuer }
    }

    /// Builds the specification of the CRL to sign.
    ///
    /// Fails without side effects when the CRL number is zero, the window is
    /// inverted, or the algorithm does not fit the issuer key.
    pub fn assemble<'r, I>(
        &self,
        window: &ValidityWindow,
        crl_number: &BigUint,
        records: I,
        algorithm: SignatureAlgorithm,
    ) -> CrlResult<CrlSpecification>
    where
        I: IntoIterator<Item = &'r RevocationRecord>,
    {
        if *crl_number < BigUint::from(1u32) {
            return Err(CrlError::InvalidCrlNumber);
        }
        window.validate()?;
        let key = self.issuer.key_algorithm();
        if !algorithm.is_compatible_with(key) {
            return Err(CrlError::IncompatibleAlgorithm { algorithm, key });
        }

        Ok(CrlSpecification {
            issuer: self.issuer.subject(),
            issuer_name_der: self.issuer.subject_name_der()?,
            authority_key_id: self.issuer.key_identifier()?,
            this_update: window.effective_date,
            next_update: window.next_update,
            crl_number: crl_number.clone(),
            records: records.into_iter().cloned().collect(),
            algorithm,
        })
    }

    /// Calls the signer once; a failure is returned as is.
    pub fn sign(&self, spec: &CrlSpecification, signer: &dyn CrlSigner) -> CrlResult<SignedCrl> {
        match signer.assemble_and_sign(spec) {
            Ok(crl) => {
                info!(
                    "assembled CRL number {} for {}",
                    spec.crl_number, spec.issuer
                );
                Ok(crl)
            }
            Err(e) => {
                warn!("signing CRL number {} failed: {}", spec.crl_number, e);
                Err(e.into())
            }
        }
    }
}
