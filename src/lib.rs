// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

/*!
# Energy Dispatch Graph

This is a library for calculating the hourly dispatch of the technologies in
an annual energy balance.  The balance is an [`EnergyGraph`] of technologies
and the energy flows between them, as produced by a static calculation of
annual values.

A dispatch pass turns those annual values into 8760 hourly loads per
technology and carrier, and writes the results back to the graph.

## Adapters and participants

Every node with a dispatch configuration for a carrier gets an [`Adapter`]
in that carrier's dispatch.  Adapters translate the node's static values
into one or more participants, which a dispatch engine clears hour by hour.
The default engine is a merit order ([`dispatch::MeritEngine`]).

Technologies with curves that depend on another carrier's dispatch, such as
a heat pump producing heat from the electricity it used, refer to them with
profile names like `self: electricity_input_curve`.  Those references are
resolved lazily, at the frame the referring dispatch is calculating.

## Managers

A [`Manager`] runs the dispatch of one carrier.  The [`DispatchFacade`] runs
one complete pass over all carriers:

- the heat networks, from high to low temperature,
- agriculture heat,
- electricity,
- the reconciliation carriers, e.g. hydrogen.

Within a pass, all carriers calculate a frame before any of them moves on to
the next, so that later carriers can read the same hour of earlier ones.

## Results

Results are written through [`SlotWriter`]s: every result slot of a node has
a single owner per pass, and writing it twice is an [`Error`].
*/

pub mod adapters;
pub use adapters::{Adapter, AdapterLoads};

mod carrier;
pub use carrier::{Carrier, Direction, PerCarrier};

pub mod config;
pub use config::DispatchConfig;

pub mod curves;

pub mod dispatch;

mod error;
pub use error::{Error, ErrorKind};

mod graph;
pub use graph::{
    CurveSlot, EdgeKind, EnergyGraph, GraphEdge, GraphNode, NodeResults, ResultSlot,
    SiblingGrant, SlotWriter, StorageProperties,
};

pub mod manager;
pub use manager::{
    CompletedPass, DispatchFacade, GraphCalculator, HeatNetworks, Manager, ManagerState,
    ReconciliationManagers,
};

pub mod node_config;
pub use node_config::{DispatchType, NodeConfig};

pub mod storage_optimization;
