use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;

use crate::certificate::HashAlg;

/// Defaults applied when the operator leaves a field untouched
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrlSettings {
    /// Validity period in days when there is no prior CRL to copy it from.
    pub default_period_days: i64,
    /// CRL number of the first CRL issued for a CA.
    pub default_crl_number: u64,
    /// Hash used for the default signature algorithm.
    pub hash: HashAlg,
}

impl Default for CrlSettings {
    fn default() -> Self {
        Self {
            default_period_days: 30,
            default_crl_number: 1,
            hash: HashAlg::SHA256,
        }
    }
}

impl CrlSettings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        overrides: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("default_period_days", 30)?
            .set_default("default_crl_number", 1)?
            .set_default("hash", "sha256")?
            .add_source(File::with_name("config/crl").required(false));

        // Explicit overrides replace the environment so tests do not depend on it
        if let Some(vars) = overrides {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // e.g. CRL_DEFAULT_PERIOD_DAYS=7 or CRL_HASH=sha512
            builder = builder.add_source(
                Environment::with_prefix("CRL")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_period_days < 0 {
            return Err(ConfigError::Message(
                "default_period_days must not be negative".to_string(),
            ));
        }
        if self.default_crl_number == 0 {
            return Err(ConfigError::Message(
                "default_crl_number must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
