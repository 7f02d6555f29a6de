// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for creating [`EnergyGraph`] instances from given nodes and edges.

use std::collections::HashMap;

use petgraph::graph::DiGraph;

use crate::{Error, GraphEdge, GraphNode};

use super::{EnergyGraph, NodeIndexMap};

/// `EnergyGraph` instantiation.
impl EnergyGraph {
    /// Creates a new [`EnergyGraph`] from the given nodes and edges.
    ///
    /// Returns an error if the graph is invalid.
    pub fn try_new<NodeIterator, EdgeIterator>(
        nodes: NodeIterator,
        edges: EdgeIterator,
    ) -> Result<Self, Error>
    where
        NodeIterator: IntoIterator<Item = GraphNode>,
        EdgeIterator: IntoIterator<Item = GraphEdge>,
    {
        let (graph, node_indices) = Self::create_graph(nodes)?;

        let mut eg = Self {
            graph,
            node_indices,
            results: HashMap::new(),
            writers: HashMap::new(),
            edge_writers: HashMap::new(),
        };
        eg.add_edges(edges)?;

        eg.validate()?;

        Ok(eg)
    }

    fn create_graph(
        nodes: impl IntoIterator<Item = GraphNode>,
    ) -> Result<(DiGraph<GraphNode, GraphEdge>, NodeIndexMap), Error> {
        let mut graph = DiGraph::new();
        let mut indices = NodeIndexMap::new();

        for node in nodes {
            if node.key.is_empty() {
                return Err(Error::invalid_graph("Node without a key found."));
            }
            if indices.contains_key(&node.key) {
                return Err(Error::invalid_graph(format!(
                    "Duplicate node key found: {}",
                    node.key
                )));
            }

            let key = node.key.clone();
            let idx = graph.add_node(node);
            indices.insert(key, idx);
        }

        Ok((graph, indices))
    }

    fn add_edges(&mut self, edges: impl IntoIterator<Item = GraphEdge>) -> Result<(), Error> {
        for edge in edges {
            let (supplier, consumer) = (&edge.supplier, &edge.consumer);

            if supplier == consumer {
                return Err(Error::invalid_graph(format!(
                    "Edge:({supplier}, {consumer}) Can't connect a node to itself."
                )));
            }
            for key in [supplier, consumer] {
                if !self.node_indices.contains_key(key) {
                    return Err(Error::node_not_found(format!(
                        "Edge:({supplier}, {consumer}) Can't find a node with key {key}"
                    )));
                }
            }

            let supplier_idx = self.node_indices[supplier];
            let consumer_idx = self.node_indices[consumer];
            if self
                .graph
                .edges_connecting(supplier_idx, consumer_idx)
                .any(|e| e.weight().carrier == edge.carrier)
            {
                return Err(Error::invalid_graph(format!(
                    "Edge:({supplier}, {consumer}) Duplicate {} edge.",
                    edge.carrier
                )));
            }
            self.graph.add_edge(supplier_idx, consumer_idx, edge);
        }

        Ok(())
    }
}
