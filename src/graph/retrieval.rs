// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for retrieving nodes, edges and results from an [`EnergyGraph`].

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::{Carrier, EnergyGraph, Error, GraphEdge, GraphNode, NodeResults};

/// Node and edge retrieval.
impl EnergyGraph {
    /// Returns the node with the given key.
    pub fn node(&self, key: &str) -> Result<&GraphNode, Error> {
        self.node_index(key).map(|i| &self.graph[i])
    }

    pub(crate) fn node_index(&self, key: &str) -> Result<NodeIndex, Error> {
        self.node_indices
            .get(key)
            .copied()
            .ok_or_else(|| Error::node_not_found(format!("Node with key {} not found.", key)))
    }

    /// Returns an iterator over the nodes in the graph, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.raw_nodes().iter().map(|n| &n.weight)
    }

    /// Returns an iterator over the edges in the graph, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.graph.raw_edges().iter().map(|e| &e.weight)
    }

    /// Returns the edges through which the given node supplies energy.
    pub fn output_edges(&self, key: &str) -> Result<Vec<(EdgeIndex, &GraphEdge)>, Error> {
        let index = self.node_index(key)?;
        Ok(self
            .graph
            .edges_directed(index, petgraph::Direction::Outgoing)
            .map(|e| (e.id(), e.weight()))
            .collect())
    }

    /// Returns the edges through which the given node receives energy.
    pub fn input_edges(&self, key: &str) -> Result<Vec<(EdgeIndex, &GraphEdge)>, Error> {
        let index = self.node_index(key)?;
        Ok(self
            .graph
            .edges_directed(index, petgraph::Direction::Incoming)
            .map(|e| (e.id(), e.weight()))
            .collect())
    }

    /// Returns the `carrier` edge from `supplier` to `consumer`.
    pub fn edge(
        &self,
        supplier: &str,
        consumer: &str,
        carrier: Carrier,
    ) -> Result<(EdgeIndex, &GraphEdge), Error> {
        let supplier_idx = self.node_index(supplier)?;
        let consumer_idx = self.node_index(consumer)?;
        self.graph
            .edges_connecting(supplier_idx, consumer_idx)
            .find(|e| e.weight().carrier == carrier)
            .map(|e| (e.id(), e.weight()))
            .ok_or_else(|| {
                Error::edge_not_found(format!(
                    "No {} edge from {} to {}.",
                    carrier, supplier, consumer
                ))
            })
    }

    /// Returns the share of the given edge.
    pub fn edge_share(&self, edge: EdgeIndex) -> Result<f64, Error> {
        self.graph
            .edge_weight(edge)
            .map(|e| e.share)
            .ok_or_else(|| Error::edge_not_found(format!("Edge {} not found.", edge.index())))
    }

    /// Returns the results written to the given node during the current pass.
    ///
    /// A node nothing was written to has empty results.
    pub fn results(&self, key: &str) -> Result<NodeResults, Error> {
        let index = self.node_index(key)?;
        Ok(self.results.get(&index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::{Carrier, EdgeKind, Error};

    #[test]
    fn test_retrieval() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let plant = builder.node("power_plant");
        let grid = builder.node("grid");
        let heat = builder.node("heat_network");
        builder.connect(plant, grid, Carrier::Electricity, EdgeKind::Share);
        builder.connect(plant, heat, Carrier::HtHeat, EdgeKind::Share);
        let graph = builder.build()?;

        assert_eq!(graph.node("power_plant")?.key, "power_plant");
        assert_eq!(graph.nodes().count(), 3);
        assert_eq!(graph.edges().count(), 2);
        assert_eq!(graph.output_edges("power_plant")?.len(), 2);
        assert_eq!(graph.input_edges("grid")?.len(), 1);

        let (_, edge) = graph.edge("power_plant", "heat_network", Carrier::HtHeat)?;
        assert_eq!(edge.kind, EdgeKind::Share);

        assert_eq!(
            graph.node("industry").unwrap_err().to_string(),
            "NodeNotFound: Node with key industry not found."
        );
        assert_eq!(
            graph
                .edge("power_plant", "heat_network", Carrier::Electricity)
                .unwrap_err()
                .to_string(),
            "EdgeNotFound: No electricity edge from power_plant to heat_network."
        );
        assert_eq!(graph.results("grid")?.demand(Carrier::Electricity), None);

        Ok(())
    }
}
