// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The per-carrier context shared by all adapters of one manager.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::GroupBehavior;
use crate::curves::CurveLibrary;
use crate::{Carrier, DispatchConfig, GraphNode, NodeConfig};

/// Decides the order of participants of the same category.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Sorter {
    /// Ascending by marginal costs.
    #[default]
    MarginalCost,
    /// The listed node keys first, in the listed order, followed by all
    /// other nodes ascending by marginal costs.
    UserDefined(Vec<String>),
}

impl Sorter {
    /// Sorts `items` in place.  Sorting is stable.
    pub fn sort<T>(
        &self,
        items: &mut [T],
        key: impl Fn(&T) -> &str,
        marginal_costs: impl Fn(&T) -> f64,
    ) {
        match self {
            Sorter::MarginalCost => {
                items.sort_by(|a, b| marginal_costs(a).total_cmp(&marginal_costs(b)))
            }
            Sorter::UserDefined(order) => {
                let rank = |item: &T| {
                    order
                        .iter()
                        .position(|k| k == key(item))
                        .unwrap_or(order.len())
                };
                items.sort_by(|a, b| {
                    rank(a)
                        .cmp(&rank(b))
                        .then_with(|| marginal_costs(a).total_cmp(&marginal_costs(b)))
                });
            }
        }
    }
}

/// Everything the adapters of one carrier's dispatch share.
///
/// Read-only once built.
#[derive(Clone, Debug)]
pub struct Context {
    carrier: Carrier,
    curves: Rc<CurveLibrary>,
    dispatchable_sorter: Sorter,
    flex_sorter: Sorter,
    group_behaviors: BTreeMap<String, GroupBehavior>,
    storage_lookbehind: usize,
}

impl Context {
    /// Creates a context for `carrier` with the default configuration.
    pub fn new(carrier: Carrier, curves: Rc<CurveLibrary>) -> Self {
        Self::from_config(carrier, &DispatchConfig::default(), curves)
    }

    pub fn from_config(carrier: Carrier, config: &DispatchConfig, curves: Rc<CurveLibrary>) -> Self {
        let sorter = |order: &Option<Vec<String>>| {
            order
                .as_ref()
                .map_or(Sorter::MarginalCost, |o| Sorter::UserDefined(o.clone()))
        };
        Self {
            carrier,
            curves,
            dispatchable_sorter: sorter(&config.dispatchable_order),
            flex_sorter: sorter(&config.flex_order),
            group_behaviors: config.flex_group_behaviors.clone(),
            storage_lookbehind: config.storage_lookbehind,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// The name of the node attribute holding this carrier's configuration.
    pub fn config_attribute(&self) -> &'static str {
        self.carrier.config_attribute()
    }

    pub fn curves(&self) -> &Rc<CurveLibrary> {
        &self.curves
    }

    pub fn dispatchable_sorter(&self) -> &Sorter {
        &self.dispatchable_sorter
    }

    pub fn flex_sorter(&self) -> &Sorter {
        &self.flex_sorter
    }

    pub fn group_behavior(&self, group: &str) -> GroupBehavior {
        self.group_behaviors
            .get(group)
            .copied()
            .unwrap_or_default()
    }

    pub fn storage_lookbehind(&self) -> usize {
        self.storage_lookbehind
    }

    /// Returns the node's configuration for this context's carrier.
    pub fn node_config<'a>(&self, node: &'a GraphNode) -> Option<&'a NodeConfig> {
        node.configs.get(self.carrier).as_ref()
    }
}
