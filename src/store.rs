use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::config::PortfolioConfig;
use crate::portfolio::PortfolioSimulator;

/// Owner-keyed registry of portfolio simulators. Each account sits behind
/// its own mutex, which gives the single-writer discipline the simulator
/// requires; different owners never contend.
pub struct PortfolioStore {
    accounts: DashMap<String, Arc<Mutex<PortfolioSimulator>>>,
    default_config: PortfolioConfig,
}

impl PortfolioStore {
    pub fn new(default_config: PortfolioConfig) -> Self {
        Self {
            accounts: DashMap::new(),
            default_config,
        }
    }

    /// Fetch the owner's account handle, creating a fresh one on first use.
    pub fn get(&self, owner_id: &str) -> Arc<Mutex<PortfolioSimulator>> {
        self.accounts
            .entry(owner_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(PortfolioSimulator::new(
                    owner_id,
                    self.default_config.clone(),
                )))
            })
            .clone()
    }

    /// Drop an owner's account entirely. Returns whether one existed.
    pub fn remove(&self, owner_id: &str) -> bool {
        self.accounts.remove(owner_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
