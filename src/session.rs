use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use tracing::{info, warn};

use crate::assembler::{CrlAssembler, CrlSpecification};
use crate::certificate::{IssuerContext, SignatureAlgorithm};
use crate::config::CrlSettings;
use crate::crl::{CrlSigner, SignedCrl};
use crate::error::{CrlError, CrlResult};
use crate::ingest::{ImportReport, IngestionController, RevocationCandidate};
use crate::keystore::KeystoreLookup;
use crate::ledger::{AdmissionResult, RevocationLedger};
use crate::reason::RevocationReason;
use crate::sequence::SequenceState;
use crate::validity::{ValidityWindow, ValidityWindowCalculator};
use crate::verify::Verifier;

/// Where a CRL-building session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Ingesting,
    Finalizing,
    Assembled,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Assembled | SessionState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    Default,
    PeriodDays(i64),
    NextUpdate(DateTime<Utc>),
}

/// Operator input for finishing a session.
///
/// Fields left unset fall back to the session's defaults: the period of the
/// prior CRL (or the configured period), the continued CRL number, and the
/// configured hash with the issuer's key family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeRequest {
    effective_date: DateTime<Utc>,
    validity: Validity,
    crl_number: Option<BigUint>,
    algorithm: Option<SignatureAlgorithm>,
}

impl FinalizeRequest {
    pub fn new(effective_date: DateTime<Utc>) -> Self {
        Self {
            effective_date,
            validity: Validity::Default,
            crl_number: None,
            algorithm: None,
        }
    }

    pub fn period_days(mut self, days: i64) -> Self {
        self.validity = Validity::PeriodDays(days);
        self
    }

    /// Explicit next update; overrides any period.
    pub fn next_update(mut self, next_update: DateTime<Utc>) -> Self {
        self.validity = Validity::NextUpdate(next_update);
        self
    }

    pub fn crl_number(mut self, crl_number: BigUint) -> Self {
        self.crl_number = Some(crl_number);
        self
    }

    pub fn algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
}

/// One run of building a CRL for an issuer.
///
/// `Empty -> Ingesting -> Finalizing -> Assembled`, with `Cancelled`
/// reachable from every state but `Assembled`. Terminal sessions refuse
/// further work with [`CrlError::SessionClosed`].
pub struct CrlSession<V> {
    ingestion: IngestionController<V>,
    settings: CrlSettings,
    state: SessionState,
    assembled: Option<CrlSpecification>,
}

impl<V: Verifier> CrlSession<V> {
    pub fn new(issuer: IssuerContext, verifier: V, settings: CrlSettings) -> Self {
        let sequence = SequenceState {
            next: BigUint::from(settings.default_crl_number),
            previous: None,
        };
        Self {
            ingestion: IngestionController::new(issuer, verifier, sequence),
            settings,
            state: SessionState::Empty,
            assembled: None,
        }
    }

    /// Starts a session that continues from the last CRL issued for this CA.
    ///
    /// The prior CRL must verify against the issuer; its entries seed the
    /// ledger, its number continues the sequence and its period becomes the
    /// default period.
    pub fn continue_from(
        issuer: IssuerContext,
        verifier: V,
        settings: CrlSettings,
        prior: &[u8],
    ) -> CrlResult<(Self, ImportReport)> {
        let mut session = Self::new(issuer, verifier, settings);
        let report = session.ingestion.import_crl(prior)?;
        session.state = SessionState::Ingesting;
        Ok((session, report))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn issuer(&self) -> &IssuerContext {
        self.ingestion.issuer()
    }

    pub fn ledger(&self) -> &RevocationLedger {
        self.ingestion.ledger()
    }

    pub fn sequence(&self) -> &SequenceState {
        self.ingestion.sequence()
    }

    pub fn settings(&self) -> &CrlSettings {
        &self.settings
    }

    /// Specification of the CRL once the session is `Assembled`.
    pub fn assembled(&self) -> Option<&CrlSpecification> {
        self.assembled.as_ref()
    }

    /// Period offered to the operator before any choice is made.
    pub fn default_period_days(&self) -> i64 {
        self.ingestion
            .prior_period_days()
            .unwrap_or(self.settings.default_period_days)
    }

    pub fn default_window(&self, effective_date: DateTime<Utc>) -> CrlResult<ValidityWindow> {
        ValidityWindowCalculator::from_period(effective_date, self.default_period_days())
    }

    pub fn default_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::default_for(self.issuer().key_algorithm(), self.settings.hash)
    }

    pub fn candidate_from_bytes(&self, bytes: &[u8]) -> CrlResult<RevocationCandidate> {
        self.ensure_open()?;
        self.ingestion.candidate_from_bytes(bytes)
    }

    pub fn candidate_from_keystore(
        &self,
        keystore: &dyn KeystoreLookup,
        alias: &str,
    ) -> CrlResult<RevocationCandidate> {
        self.ensure_open()?;
        self.ingestion.candidate_from_keystore(keystore, alias)
    }

    pub fn revoke(
        &mut self,
        candidate: RevocationCandidate,
        revocation_date: DateTime<Utc>,
        reason: RevocationReason,
    ) -> CrlResult<AdmissionResult> {
        self.ensure_open()?;
        let result = self.ingestion.revoke(candidate, revocation_date, reason)?;
        self.state = SessionState::Ingesting;
        Ok(result)
    }

    pub fn import_crl(&mut self, bytes: &[u8]) -> CrlResult<ImportReport> {
        self.ensure_open()?;
        let report = self.ingestion.import_crl(bytes)?;
        self.state = SessionState::Ingesting;
        Ok(report)
    }

    pub fn refresh_from_crl(&mut self, bytes: &[u8]) -> CrlResult<ImportReport> {
        self.ensure_open()?;
        let report = self.ingestion.refresh_from_crl(bytes)?;
        self.state = SessionState::Ingesting;
        Ok(report)
    }

    /// Assembles and signs the CRL.
    ///
    /// Precondition failures leave the session as it was so the operator can
    /// correct the input. A signing failure ends the session.
    pub fn finalize(
        &mut self,
        request: FinalizeRequest,
        signer: &dyn CrlSigner,
    ) -> CrlResult<SignedCrl> {
        self.ensure_open()?;
        let resume = self.state;
        self.state = SessionState::Finalizing;

        let spec = match self.prepare(&request) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("CRL assembly rejected: {}", e);
                self.state = resume;
                return Err(e);
            }
        };

        let assembler = CrlAssembler::new(self.ingestion.issuer());
        match assembler.sign(&spec, signer) {
            Ok(crl) => {
                self.state = SessionState::Assembled;
                self.assembled = Some(spec);
                Ok(crl)
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    /// Resolves the request against the session defaults and checks it.
    fn prepare(&self, request: &FinalizeRequest) -> CrlResult<CrlSpecification> {
        let window = match request.validity {
            Validity::Default => self.default_window(request.effective_date)?,
            Validity::PeriodDays(days) => {
                ValidityWindowCalculator::from_period(request.effective_date, days)?
            }
            Validity::NextUpdate(next_update) => {
                ValidityWindowCalculator::with_next_update(request.effective_date, next_update)
            }
        };
        let crl_number = request
            .crl_number
            .clone()
            .unwrap_or_else(|| self.ingestion.sequence().next.clone());
        let algorithm = request
            .algorithm
            .unwrap_or_else(|| self.default_algorithm());

        CrlAssembler::new(self.ingestion.issuer()).assemble(
            &window,
            &crl_number,
            self.ingestion.ledger().snapshot(),
            algorithm,
        )
    }

    /// Drops everything collected so far. No effect once `Assembled`.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Assembled {
            info!("CRL session for {} cancelled", self.issuer().subject());
            self.discard();
        }
    }

    fn discard(&mut self) {
        self.ingestion.clear();
        self.assembled = None;
        self.state = SessionState::Cancelled;
    }

    fn ensure_open(&self) -> CrlResult<()> {
        if self.state.is_terminal() {
            return Err(CrlError::SessionClosed);
        }
        Ok(())
    }
}
