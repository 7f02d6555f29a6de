// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A graph of the technologies in an annual energy balance, and the energy
//! flows between them.

mod creation;
mod retrieval;
mod slots;
mod validation;

#[cfg(test)]
pub(crate) mod test_utils;

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};

use crate::carrier::PerCarrier;
use crate::NodeConfig;

pub use slots::{CurveSlot, NodeResults, ResultSlot, SiblingGrant, SlotWriter};

/// `GraphNode`s stored in the `DiGraph` can be addressed with `NodeIndex`es.
///
/// `NodeIndexMap` stores the corresponding `NodeIndex` for every node key.
pub(crate) type NodeIndexMap = HashMap<String, NodeIndex>;

/// Storage properties of a node, per unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageProperties {
    /// Storage volume per unit, in MWh.
    pub volume: f64,
    /// Share of the stored energy lost every hour.
    pub decay: f64,
}

/// A technology in the energy graph.
///
/// Values are the results of the static graph calculation, and are read-only
/// during a dispatch pass.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub key: String,
    /// Annual input demand, in MWh.
    pub demand: f64,
    pub number_of_units: f64,
    pub availability: f64,
    /// Input capacity per unit and carrier, in MW.
    pub input_capacities: PerCarrier<f64>,
    /// Output capacity per unit and carrier, in MW.
    pub output_capacities: PerCarrier<f64>,
    /// Share of the input demand taken in as each carrier.
    pub input_conversions: PerCarrier<f64>,
    /// Share of the input demand given out as each carrier.
    pub output_conversions: PerCarrier<f64>,
    /// In EUR/MWh.
    pub marginal_costs: f64,
    pub full_load_hours: f64,
    pub storage: Option<StorageProperties>,
    /// Dispatch configuration for each carrier the node takes part in.
    pub configs: PerCarrier<Option<NodeConfig>>,
}

impl GraphNode {
    /// Creates a node with a single available unit and no capacities,
    /// conversions or dispatch configuration.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            demand: 0.0,
            number_of_units: 1.0,
            availability: 1.0,
            input_capacities: PerCarrier::default(),
            output_capacities: PerCarrier::default(),
            input_conversions: PerCarrier::default(),
            output_conversions: PerCarrier::default(),
            marginal_costs: 0.0,
            full_load_hours: 0.0,
            storage: None,
            configs: PerCarrier::default(),
        }
    }
}

/// How the share of an edge is determined in the static calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Share,
    Flexible,
    InverseFlexible,
    Constant,
}

/// An energy flow of one carrier from a supplier to a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge {
    pub supplier: String,
    pub consumer: String,
    pub carrier: crate::Carrier,
    pub kind: EdgeKind,
    pub share: f64,
}

impl GraphEdge {
    pub fn new(
        supplier: impl Into<String>,
        consumer: impl Into<String>,
        carrier: crate::Carrier,
        kind: EdgeKind,
    ) -> Self {
        Self {
            supplier: supplier.into(),
            consumer: consumer.into(),
            carrier,
            kind,
            share: 0.0,
        }
    }
}

/// The energy graph: technologies, the flows between them, and the results
/// written to them by a dispatch pass.
pub struct EnergyGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    node_indices: NodeIndexMap,
    results: HashMap<NodeIndex, NodeResults>,
    /// Which node's adapter wrote each slot during the current pass.
    writers: HashMap<(NodeIndex, ResultSlot), String>,
    edge_writers: HashMap<EdgeIndex, String>,
}
