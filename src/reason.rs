use std::fmt;
use std::str::FromStr;

use crate::error::{CrlError, CrlResult};

/// Reason a certificate was revoked, as carried in the `reasonCode` CRL entry
/// extension (RFC 5280 section 5.3.1). Code 7 is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RevocationReason {
    #[default]
    Unspecified,
    KeyCompromise,
    CACompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCRL,
    PrivilegeWithdrawn,
    AACompromise,
}

impl RevocationReason {
    /// Every reason in code order, for populating a chooser.
    pub const ALL: [RevocationReason; 10] = [
        RevocationReason::Unspecified,
        RevocationReason::KeyCompromise,
        RevocationReason::CACompromise,
        RevocationReason::AffiliationChanged,
        RevocationReason::Superseded,
        RevocationReason::CessationOfOperation,
        RevocationReason::CertificateHold,
        RevocationReason::RemoveFromCRL,
        RevocationReason::PrivilegeWithdrawn,
        RevocationReason::AACompromise,
    ];

    /// Looks up a reason by its code point.
    ///
    /// Fails with [`CrlError::InvalidReasonCode`] for 7 and anything outside 0..=10.
    pub fn from_code(code: i64) -> CrlResult<Self> {
        match code {
            0 => Ok(RevocationReason::Unspecified),
            1 => Ok(RevocationReason::KeyCompromise),
            2 => Ok(RevocationReason::CACompromise),
            3 => Ok(RevocationReason::AffiliationChanged),
            4 => Ok(RevocationReason::Superseded),
            5 => Ok(RevocationReason::CessationOfOperation),
            6 => Ok(RevocationReason::CertificateHold),
            8 => Ok(RevocationReason::RemoveFromCRL),
            9 => Ok(RevocationReason::PrivilegeWithdrawn),
            10 => Ok(RevocationReason::AACompromise),
            other => Err(CrlError::InvalidReasonCode(other)),
        }
    }

    /// The RFC 5280 code point written into the reasonCode extension.
    pub fn code(self) -> u8 {
        match self {
            RevocationReason::Unspecified => 0,
            RevocationReason::KeyCompromise => 1,
            RevocationReason::CACompromise => 2,
            RevocationReason::AffiliationChanged => 3,
            RevocationReason::Superseded => 4,
            RevocationReason::CessationOfOperation => 5,
            RevocationReason::CertificateHold => 6,
            RevocationReason::RemoveFromCRL => 8,
            RevocationReason::PrivilegeWithdrawn => 9,
            RevocationReason::AACompromise => 10,
        }
    }

    /// The RFC 5280 symbolic name, e.g. `keyCompromise`.
    pub fn name(self) -> &'static str {
        match self {
            RevocationReason::Unspecified => "unspecified",
            RevocationReason::KeyCompromise => "keyCompromise",
            RevocationReason::CACompromise => "cACompromise",
            RevocationReason::AffiliationChanged => "affiliationChanged",
            RevocationReason::Superseded => "superseded",
            RevocationReason::CessationOfOperation => "cessationOfOperation",
            RevocationReason::CertificateHold => "certificateHold",
            RevocationReason::RemoveFromCRL => "removeFromCRL",
            RevocationReason::PrivilegeWithdrawn => "privilegeWithdrawn",
            RevocationReason::AACompromise => "aACompromise",
        }
    }

    /// Looks up a reason by symbolic name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|reason| reason.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl FromStr for RevocationReason {
    type Err = CrlError;

    /// Accepts either a symbolic name or a numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(reason) = Self::from_name(s) {
            return Ok(reason);
        }
        match s.trim().parse::<i64>() {
            Ok(code) => Self::from_code(code),
            Err(_) => Err(CrlError::Decode(format!("unknown revocation reason: {s}"))),
        }
    }
}
