use std::collections::BTreeMap;

use openssl::x509::X509;

use crate::error::{CrlError, CrlResult};

/// Source of certificates selected by alias from an open keystore
pub trait KeystoreLookup {
    /// The certificate stored under `alias`, if any.
    fn certificate(&self, alias: &str) -> CrlResult<X509>;

    /// Every alias the keystore holds.
    fn aliases(&self) -> Vec<String>;
}

/// Alias to certificate map, for callers that already hold their certificates
#[derive(Clone, Default)]
pub struct MemoryKeystore {
    entries: BTreeMap<String, X509>,
}

impl MemoryKeystore {
    /// An empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a certificate under `alias`, replacing any previous one.
    pub fn insert(&mut self, alias: impl Into<String>, cert: X509) {
        self.entries.insert(alias.into(), cert);
    }

    /// Number of stored certificates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeystoreLookup for MemoryKeystore {
    fn certificate(&self, alias: &str) -> CrlResult<X509> {
        self.entries
            .get(alias)
            .cloned()
            .ok_or_else(|| CrlError::KeystoreEntryNotFound(alias.to_string()))
    }

    fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
