// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Results written to the nodes of an [`EnergyGraph`] by a dispatch pass.
//!
//! Results can only be written through a [`SlotWriter`], which is handed out
//! for one owning node.  Each slot can be written once per pass.  Writing to
//! the slots of another node requires an explicit [`SiblingGrant`] listing
//! the slots that may be written.

use std::collections::BTreeMap;
use std::fmt::Display;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::carrier::PerCarrier;
use crate::curves::Curve;
use crate::{Carrier, EnergyGraph, Error};

/// The named curves a dispatch pass writes to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurveSlot {
    Input(Carrier),
    Output(Carrier),
    Storage(Carrier),
}

impl Display for CurveSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveSlot::Input(carrier) => write!(f, "{}_input_curve", carrier),
            CurveSlot::Output(carrier) => write!(f, "{}_output_curve", carrier),
            CurveSlot::Storage(carrier) => write!(f, "{}_storage_curve", carrier),
        }
    }
}

/// A single result value of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultSlot {
    Demand(Carrier),
    FullLoadHours(Carrier),
    MarginalCosts(Carrier),
    MeritOrderPosition(Carrier),
    Curve(CurveSlot),
}

impl Display for ResultSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSlot::Demand(carrier) => write!(f, "{}_demand", carrier),
            ResultSlot::FullLoadHours(carrier) => write!(f, "{}_full_load_hours", carrier),
            ResultSlot::MarginalCosts(carrier) => write!(f, "{}_marginal_costs", carrier),
            ResultSlot::MeritOrderPosition(carrier) => {
                write!(f, "{}_merit_order_position", carrier)
            }
            ResultSlot::Curve(slot) => write!(f, "{}", slot),
        }
    }
}

/// The results of a dispatch pass for one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeResults {
    demand: PerCarrier<Option<f64>>,
    full_load_hours: PerCarrier<Option<f64>>,
    marginal_costs: PerCarrier<Option<f64>>,
    merit_order_position: PerCarrier<Option<usize>>,
    curves: BTreeMap<CurveSlot, Curve>,
}

impl NodeResults {
    /// Annual demand, in MWh, as determined by the carrier's dispatch.
    pub fn demand(&self, carrier: Carrier) -> Option<f64> {
        *self.demand.get(carrier)
    }

    pub fn full_load_hours(&self, carrier: Carrier) -> Option<f64> {
        *self.full_load_hours.get(carrier)
    }

    pub fn marginal_costs(&self, carrier: Carrier) -> Option<f64> {
        *self.marginal_costs.get(carrier)
    }

    pub fn merit_order_position(&self, carrier: Carrier) -> Option<usize> {
        *self.merit_order_position.get(carrier)
    }

    pub fn curve(&self, slot: CurveSlot) -> Option<&Curve> {
        self.curves.get(&slot)
    }

    /// Iterates over the written curves, by slot.
    pub fn curves(&self) -> impl Iterator<Item = (&CurveSlot, &Curve)> {
        self.curves.iter()
    }
}

/// Permission for an adapter to write specific slots of a sibling node, as
/// part of a multi-node technology bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct SiblingGrant {
    pub node: String,
    pub slots: Vec<ResultSlot>,
}

impl SiblingGrant {
    pub fn new(node: impl Into<String>, slots: impl IntoIterator<Item = ResultSlot>) -> Self {
        Self {
            node: node.into(),
            slots: slots.into_iter().collect(),
        }
    }
}

/// Result storage for the current pass.
impl EnergyGraph {
    /// Starts a new dispatch pass, discarding the results of the previous one.
    pub fn begin_pass(&mut self) {
        self.results.clear();
        self.writers.clear();
        self.edge_writers.clear();
    }

    /// Returns a writer for the slots of `owner` and the sibling slots listed
    /// in `grants`.
    pub fn slot_writer(
        &mut self,
        owner: &str,
        grants: &[SiblingGrant],
    ) -> Result<SlotWriter<'_>, Error> {
        let owner_index = self.node_index(owner)?;
        let grants = grants
            .iter()
            .map(|grant| Ok((self.node_index(&grant.node)?, grant.slots.clone())))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(SlotWriter {
            graph: self,
            owner: owner.to_string(),
            owner_index,
            grants,
        })
    }
}

/// Writes results to the slots an adapter owns.
pub struct SlotWriter<'g> {
    graph: &'g mut EnergyGraph,
    owner: String,
    owner_index: NodeIndex,
    grants: Vec<(NodeIndex, Vec<ResultSlot>)>,
}

impl SlotWriter<'_> {
    /// The key of the node owning this writer.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Read access to the graph, e.g. for edges and sibling nodes.
    pub fn graph(&self) -> &EnergyGraph {
        self.graph
    }

    pub fn set_demand(&mut self, carrier: Carrier, value: f64) -> Result<(), Error> {
        self.write(self.owner_index, ResultSlot::Demand(carrier), |r| {
            r.demand.set(carrier, Some(value))
        })
    }

    pub fn set_full_load_hours(&mut self, carrier: Carrier, value: f64) -> Result<(), Error> {
        self.write(self.owner_index, ResultSlot::FullLoadHours(carrier), |r| {
            r.full_load_hours.set(carrier, Some(value))
        })
    }

    pub fn set_marginal_costs(&mut self, carrier: Carrier, value: f64) -> Result<(), Error> {
        self.write(self.owner_index, ResultSlot::MarginalCosts(carrier), |r| {
            r.marginal_costs.set(carrier, Some(value))
        })
    }

    pub fn set_merit_order_position(
        &mut self,
        carrier: Carrier,
        position: usize,
    ) -> Result<(), Error> {
        self.write(self.owner_index, ResultSlot::MeritOrderPosition(carrier), |r| {
            r.merit_order_position.set(carrier, Some(position))
        })
    }

    pub fn set_curve(&mut self, slot: CurveSlot, curve: Curve) -> Result<(), Error> {
        self.write(self.owner_index, ResultSlot::Curve(slot), |r| {
            r.curves.insert(slot, curve);
        })
    }

    /// Sets the demand of a sibling node listed in the writer's grants.
    pub fn set_sibling_demand(
        &mut self,
        sibling: &str,
        carrier: Carrier,
        value: f64,
    ) -> Result<(), Error> {
        let index = self.graph.node_index(sibling)?;
        self.write(index, ResultSlot::Demand(carrier), |r| {
            r.demand.set(carrier, Some(value))
        })
    }

    /// Sets a curve of a sibling node listed in the writer's grants.
    pub fn set_sibling_curve(
        &mut self,
        sibling: &str,
        slot: CurveSlot,
        curve: Curve,
    ) -> Result<(), Error> {
        let index = self.graph.node_index(sibling)?;
        self.write(index, ResultSlot::Curve(slot), |r| {
            r.curves.insert(slot, curve);
        })
    }

    /// Sets the share of an edge starting or ending at the owning node or at
    /// one of its granted siblings.
    pub fn set_edge_share(&mut self, edge: EdgeIndex, share: f64) -> Result<(), Error> {
        let Some((supplier, consumer)) = self.graph.graph.edge_endpoints(edge) else {
            return Err(Error::edge_not_found(format!(
                "Edge {} not found.",
                edge.index()
            )));
        };
        let endpoint = |index: NodeIndex| {
            index == self.owner_index || self.grants.iter().any(|(node, _)| *node == index)
        };
        if !endpoint(supplier) && !endpoint(consumer) {
            return Err(Error::slot_conflict(format!(
                "Node {} may not change the share of edge {} -> {}.",
                self.owner, self.graph.graph[supplier].key, self.graph.graph[consumer].key
            )));
        }
        if let Some(previous) = self.graph.edge_writers.get(&edge) {
            return Err(Error::slot_conflict(format!(
                "Share of edge {} -> {} was already written by {}.",
                self.graph.graph[supplier].key, self.graph.graph[consumer].key, previous
            )));
        }

        self.graph.edge_writers.insert(edge, self.owner.clone());
        self.graph.graph[edge].share = share;
        Ok(())
    }

    fn write(
        &mut self,
        index: NodeIndex,
        slot: ResultSlot,
        update: impl FnOnce(&mut NodeResults),
    ) -> Result<(), Error> {
        let granted = index == self.owner_index
            || self
                .grants
                .iter()
                .any(|(node, slots)| *node == index && slots.contains(&slot));
        if !granted {
            return Err(Error::slot_conflict(format!(
                "Node {} may not write {} of node {}.",
                self.owner, slot, self.graph.graph[index].key
            )));
        }
        if let Some(previous) = self.graph.writers.get(&(index, slot)) {
            return Err(Error::slot_conflict(format!(
                "{} of node {} was already written by {}.",
                slot, self.graph.graph[index].key, previous
            )));
        }

        self.graph.writers.insert((index, slot), self.owner.clone());
        update(self.graph.results.entry(index).or_default());
        Ok(())
    }
}
