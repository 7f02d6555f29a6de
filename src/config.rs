// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains the configuration options for a dispatch pass.

use std::collections::BTreeMap;

use crate::dispatch::GroupBehavior;
use crate::storage_optimization::DEFAULT_LOOKBEHIND;
use crate::Carrier;

/// Configuration options for a dispatch pass.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchConfig {
    /// How many hours the storage optimization looks back from a peak for a
    /// frame to charge in.
    pub storage_lookbehind: usize,

    /// Carriers whose dispatch runs after electricity, with early hooks that
    /// run before the first static recalculation.
    pub reconciliation_carriers: Vec<Carrier>,

    /// Behavior of each flex group.  Groups not listed here use
    /// [`GroupBehavior::MeritOrder`].
    pub flex_group_behaviors: BTreeMap<String, GroupBehavior>,

    /// A user-defined order of dispatchable producers, by node key.  When
    /// unset, dispatchables are ranked by marginal costs.
    pub dispatchable_order: Option<Vec<String>>,

    /// A user-defined order of flex technologies, by node key.
    pub flex_order: Option<Vec<String>>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            storage_lookbehind: DEFAULT_LOOKBEHIND,
            reconciliation_carriers: vec![Carrier::Hydrogen],
            flex_group_behaviors: BTreeMap::new(),
            dispatchable_order: None,
            flex_order: None,
        }
    }
}
