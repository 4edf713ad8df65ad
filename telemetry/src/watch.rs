//! Watch-list filters.
//!
//! Pure predicates over the operator's [`SubscriptionConfig`]. An empty list
//! never matches anything.

use std::collections::HashSet;

use crate::config::{SubscriptionConfig, ValidatorConfig};

#[derive(Clone, Debug, Default)]
pub struct WatchList {
    /// Lowercased chain names.
    chains: HashSet<String>,
    producers: Vec<String>,
    validators: Vec<ValidatorConfig>,
}

impl WatchList {
    pub fn new(cfg: &SubscriptionConfig) -> Self {
        Self {
            chains: cfg.chains.iter().map(|c| c.to_lowercase()).collect(),
            producers: cfg.producers.clone(),
            validators: cfg.validators.clone(),
        }
    }

    /// Case-insensitive membership of `chain` in the watched chains.
    pub fn is_chain_watched(&self, chain: &str) -> bool {
        self.chains.contains(&chain.to_lowercase())
    }

    /// `true` if `producer` starts with any watched prefix.
    pub fn is_producer_watched(&self, producer: &str) -> bool {
        self.producers
            .iter()
            .any(|prefix| producer.starts_with(prefix.as_str()))
    }

    /// Returns the configured name of the first validator whose address is
    /// exactly `address`. Validators configured with an empty name are
    /// treated as unnamed and never match.
    pub fn validator_name(&self, address: &str) -> Option<&str> {
        self.validators
            .iter()
            .find(|v| v.address == address)
            .map(|v| v.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

impl From<&SubscriptionConfig> for WatchList {
    fn from(cfg: &SubscriptionConfig) -> Self {
        WatchList::new(cfg)
    }
}
