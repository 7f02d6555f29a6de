// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Scheduling of batteries ahead of the dispatch, by flattening the residual
//! load curve.

mod algorithm;
mod distributor;

pub use algorithm::{StorageAlgorithm, StorageParameters, StorageSchedule};
pub use distributor::StorageDistributor;

/// How many hours before a peak the optimization looks for hours to charge
/// in, by default.
pub const DEFAULT_LOOKBEHIND: usize = 72;
