// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for validating an [`EnergyGraph`].

use crate::{Error, EnergyGraph};

impl EnergyGraph {
    /// Validates that there are no cycles in the graph.
    ///
    /// If a cycle is detected, an error is returned that names a node in the
    /// cycle.
    pub(super) fn validate(&self) -> Result<(), Error> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| {
                Error::invalid_graph(format!(
                    "Cycle detected through node {}.",
                    self.graph[cycle.node_id()].key
                ))
            })
    }
}
