// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Producing technologies with a single participant.

use crate::curves::{Curve, CurveSource};
use crate::dispatch::{CurveResolver, Hourly, Participant, ParticipantKind};
use crate::{Direction, EnergyGraph, Error};

use super::{AdapterBase, Behavior};

/// A must-run or volatile producer following its profile.
pub struct AlwaysOn {
    base: AdapterBase,
}

impl AlwaysOn {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for AlwaysOn {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let production = base.profile(resolver, Direction::Output, base.annual_output())?;
        Ok(vec![Participant::new(
            base.key(),
            ParticipantKind::AlwaysOn {
                production,
                output_capacity: base.output_capacity(),
                marginal_costs: base.node().marginal_costs,
            },
            base.loads().output.clone(),
        )])
    }
}

/// A must-run or volatile producer whose peaks are cut off.
///
/// The curtailment fraction is the share of the peak that is never
/// produced.
pub struct CurtailedAlwaysOn {
    base: AdapterBase,
}

impl CurtailedAlwaysOn {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }

    fn curtailed(&self, production: &Curve) -> Curve {
        let limit = production.max() * (1.0 - self.base.config().curtailment);
        production.map(|value| value.min(limit))
    }
}

impl Behavior for CurtailedAlwaysOn {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let CurveSource::Fixed(production) =
            base.profile(resolver, Direction::Output, base.annual_output())?
        else {
            return Err(Error::invalid_configuration(format!(
                "Node {}: curtailed producers need a profile from the curve library.",
                base.key()
            )));
        };
        Ok(vec![Participant::new(
            base.key(),
            ParticipantKind::AlwaysOn {
                production: self.curtailed(&production).into(),
                output_capacity: base.output_capacity(),
                marginal_costs: base.node().marginal_costs,
            },
            base.loads().output.clone(),
        )])
    }
}

/// Builds a dispatchable participant from the node's capacity, availability
/// and costs.
fn dispatchable(base: &AdapterBase) -> Result<Participant, Error> {
    Ok(Participant::new(
        base.key(),
        ParticipantKind::Dispatchable {
            output_capacity: base.available_capacity(base.output_capacity())?,
            marginal_costs: base.price(base.node().marginal_costs)?,
        },
        base.loads().output.clone(),
    ))
}

/// A producer running on demand, by marginal costs.
pub struct Dispatchable {
    base: AdapterBase,
}

impl Dispatchable {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Dispatchable {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        Ok(vec![dispatchable(&self.base)?])
    }
}

/// The producer of last resort: unlimited capacity at infinite costs.
pub struct Backup {
    base: AdapterBase,
}

impl Backup {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Backup {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        true
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        Ok(vec![Participant::new(
            self.base.key(),
            ParticipantKind::Dispatchable {
                output_capacity: Hourly::Constant(f64::INFINITY),
                marginal_costs: Hourly::Constant(f64::INFINITY),
            },
            self.base.loads().output.clone(),
        )])
    }
}

/// Energy bought from outside the region, optionally with hourly prices
/// and availability.
pub struct Import {
    base: AdapterBase,
}

impl Import {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Import {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        self.base.default_installed() && self.base.output_capacity() > 0.0
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        Ok(vec![dispatchable(&self.base)?])
    }
}
