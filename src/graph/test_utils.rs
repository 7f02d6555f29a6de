// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module is only compiled when running unit tests and contains features
//! that are shared by the tests of all modules.
//!
//! The `EnergyGraphBuilder` can declaratively build graph configurations with
//! dispatch configurations attached, for use in tests.

use crate::node_config::{ConsumerSubtype, FlexKind, ProducerSubtype};
use crate::{
    Carrier, DispatchType, EdgeKind, EnergyGraph, Error, GraphEdge, GraphNode, NodeConfig,
    StorageProperties,
};

/// Represents a node added to the `EnergyGraphBuilder`.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub(crate) struct NodeHandle(usize);

/// A builder for creating graph configurations easily, for use in tests.
#[derive(Default)]
pub(crate) struct EnergyGraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl EnergyGraphBuilder {
    /// Creates a new `EnergyGraphBuilder`.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a node without configuration and returns its handle.
    pub(crate) fn node(&mut self, key: &str) -> NodeHandle {
        self.nodes.push(GraphNode::new(key));
        NodeHandle(self.nodes.len() - 1)
    }

    /// Returns the node behind a handle, for setting attributes.
    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> &mut GraphNode {
        &mut self.nodes[handle.0]
    }

    /// Returns the key of the node behind a handle.
    pub(crate) fn key(&self, handle: NodeHandle) -> String {
        self.nodes[handle.0].key.clone()
    }

    /// Attaches a dispatch configuration for `carrier` to a node.
    pub(crate) fn configure(
        &mut self,
        handle: NodeHandle,
        carrier: Carrier,
        config: NodeConfig,
    ) -> &mut Self {
        self.nodes[handle.0].configs.set(carrier, Some(config));
        self
    }

    /// Connects two nodes with an edge of the given carrier.
    pub(crate) fn connect(
        &mut self,
        supplier: NodeHandle,
        consumer: NodeHandle,
        carrier: Carrier,
        kind: EdgeKind,
    ) -> &mut Self {
        let edge = GraphEdge::new(
            self.key(supplier),
            self.key(consumer),
            carrier,
            kind,
        );
        self.edges.push(edge);
        self
    }

    /// Adds a dispatchable producer with the given capacity and marginal
    /// costs.
    pub(crate) fn dispatchable(
        &mut self,
        key: &str,
        carrier: Carrier,
        capacity: f64,
        marginal_costs: f64,
    ) -> NodeHandle {
        let handle = self.node(key);
        let node = self.node_mut(handle);
        node.output_capacities.set(carrier, capacity);
        node.output_conversions.set(carrier, 1.0);
        node.marginal_costs = marginal_costs;
        self.configure(
            handle,
            carrier,
            NodeConfig::new(DispatchType::Producer(ProducerSubtype::Dispatchable)),
        );
        handle
    }

    /// Adds a backup producer.
    pub(crate) fn backup(&mut self, key: &str, carrier: Carrier) -> NodeHandle {
        let handle = self.node(key);
        self.node_mut(handle).output_conversions.set(carrier, 1.0);
        self.configure(
            handle,
            carrier,
            NodeConfig::new(DispatchType::Producer(ProducerSubtype::Backup)),
        );
        handle
    }

    /// Adds an always-on producer following `profile`, producing `annual`
    /// MWh of `carrier` per year.
    pub(crate) fn always_on(
        &mut self,
        key: &str,
        carrier: Carrier,
        annual: f64,
        capacity: f64,
        profile: &str,
    ) -> NodeHandle {
        let handle = self.node(key);
        let node = self.node_mut(handle);
        node.demand = annual;
        node.output_capacities.set(carrier, capacity);
        node.output_conversions.set(carrier, 1.0);
        self.configure(
            handle,
            carrier,
            NodeConfig::new(DispatchType::Producer(ProducerSubtype::MustRun)).with_profile(profile),
        );
        handle
    }

    /// Adds a consumer following `profile`, consuming `annual` MWh of
    /// `carrier` per year.
    pub(crate) fn consumer(
        &mut self,
        key: &str,
        carrier: Carrier,
        annual: f64,
        profile: &str,
    ) -> NodeHandle {
        let handle = self.node(key);
        let node = self.node_mut(handle);
        node.demand = annual;
        node.input_conversions.set(carrier, 1.0);
        self.configure(
            handle,
            carrier,
            NodeConfig::new(DispatchType::Consumer(ConsumerSubtype::Consumer)).with_profile(profile),
        );
        handle
    }

    /// Adds a storage with the given capacity and volume.
    pub(crate) fn storage(
        &mut self,
        key: &str,
        carrier: Carrier,
        capacity: f64,
        volume: f64,
    ) -> NodeHandle {
        let handle = self.node(key);
        let node = self.node_mut(handle);
        node.input_capacities.set(carrier, capacity);
        node.output_capacities.set(carrier, capacity);
        node.input_conversions.set(carrier, 1.0);
        node.output_conversions.set(carrier, 1.0);
        node.storage = Some(StorageProperties { volume, decay: 0.0 });
        self.configure(
            handle,
            carrier,
            NodeConfig::new(DispatchType::Flex(FlexKind::Storage)),
        );
        handle
    }

    /// Builds an `EnergyGraph` from the nodes and edges added so far.
    pub(crate) fn build(&self) -> Result<EnergyGraph, Error> {
        EnergyGraph::try_new(self.nodes.clone(), self.edges.clone())
    }
}
