//! Service-pair shared keys

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use krb_crypto::SecretKey;

use crate::{KeyRegistry, StoreError};

/// The two service pairs that share a long-lived key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServicePair {
    /// Seals ticket-granting tickets (AS issues, TGS opens)
    #[serde(rename = "as-tgs")]
    AsTgs,
    /// Seals service tickets (TGS issues, FS opens)
    #[serde(rename = "tgs-fs")]
    TgsFs,
}

impl ServicePair {
    pub const ALL: [ServicePair; 2] = [ServicePair::AsTgs, ServicePair::TgsFs];

    pub fn name(self) -> &'static str {
        match self {
            ServicePair::AsTgs => "as-tgs",
            ServicePair::TgsFs => "tgs-fs",
        }
    }
}

impl std::fmt::Display for ServicePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable in-memory key set, built once at service startup.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyRegistry {
    keys: HashMap<ServicePair, SecretKey>,
}

impl StaticKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, pair: ServicePair, key: SecretKey) -> Self {
        self.keys.insert(pair, key);
        self
    }

    pub fn contains(&self, pair: ServicePair) -> bool {
        self.keys.contains_key(&pair)
    }
}

impl KeyRegistry for StaticKeyRegistry {
    fn shared_key(&self, pair: ServicePair) -> Result<SecretKey, StoreError> {
        self.keys
            .get(&pair)
            .cloned()
            .ok_or(StoreError::MissingSharedKey(pair.name()))
    }
}
