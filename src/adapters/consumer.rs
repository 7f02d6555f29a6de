// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Consuming technologies.

use crate::curves::{Curve, FRAMES};
use crate::dispatch::{CurveResolver, Participant, ParticipantKind};
use crate::{Direction, EnergyGraph, Error};

use super::{AdapterBase, Behavior};

/// A demand following its profile.
pub struct Consumer {
    base: AdapterBase,
}

impl Consumer {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Consumer {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let demand = base.profile(resolver, Direction::Input, base.annual_input())?;
        Ok(vec![Participant::new(
            base.key(),
            ParticipantKind::Consumer { demand },
            base.loads().input.clone(),
        )])
    }
}

/// Losses, spread evenly over the year.
pub struct ConsumptionLoss {
    base: AdapterBase,
}

impl ConsumptionLoss {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for ConsumptionLoss {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let demand = Curve::flat(base.annual_input() / FRAMES as f64);
        Ok(vec![Participant::new(
            base.key(),
            ParticipantKind::Consumer {
                demand: demand.into(),
            },
            base.loads().input.clone(),
        )])
    }
}
