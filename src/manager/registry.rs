// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Registries of the load curves of every manager's adapters, by node key.

use std::collections::{BTreeMap, HashMap};

use crate::adapters::AdapterLoads;
use crate::Carrier;

/// The load curves of one manager's adapters.
///
/// Rebuilt for every pass, when the manager is set up.
#[derive(Clone, Debug)]
pub struct AdapterRegistry {
    carrier: Carrier,
    loads: HashMap<String, AdapterLoads>,
}

impl AdapterRegistry {
    pub fn new(carrier: Carrier) -> Self {
        Self {
            carrier,
            loads: HashMap::new(),
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub fn insert(&mut self, key: impl Into<String>, loads: AdapterLoads) {
        self.loads.insert(key.into(), loads);
    }

    pub fn get(&self, key: &str) -> Option<&AdapterLoads> {
        self.loads.get(key)
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// The node keys in the registry, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = self.loads.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }
}

/// The registries of all managers taking part in a pass.
#[derive(Clone, Debug, Default)]
pub struct RegistrySet {
    registries: BTreeMap<Carrier, AdapterRegistry>,
}

impl RegistrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, registry: AdapterRegistry) {
        self.registries.insert(registry.carrier(), registry);
    }

    pub fn get(&self, carrier: Carrier) -> Option<&AdapterRegistry> {
        self.registries.get(&carrier)
    }

    /// Returns the load curves of the `carrier` adapter of the given node.
    pub fn lookup(&self, carrier: Carrier, key: &str) -> Option<&AdapterLoads> {
        self.get(carrier).and_then(|registry| registry.get(key))
    }
}
