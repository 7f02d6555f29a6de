// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Demand that can be postponed.
//!
//! A load-shifting technology is two participants sharing a debt: a shedding
//! participant that reduces demand in deficit hours, and a recovery
//! participant that consumes the shed energy again.  Recovery takes surplus
//! energy when there is any, and is forced to consume when the debt is full
//! or when the rest of the year is just long enough to repay it, so the
//! energy shed over a year is always recovered.  Per hour, no more can be
//! shed than the current demand of the consumers named in the `limiting`
//! relation.

use crate::curves::LazyCurve;
use crate::dispatch::{CurveResolver, FlexRole, Hourly, Participant, ParticipantKind, Reserve};
use crate::{Direction, EnergyGraph, Error};

use super::{AdapterBase, AdapterLoads, Behavior};

const LIMITING_RELATION: &str = "limiting";

pub struct LoadShifting {
    base: AdapterBase,
}

impl LoadShifting {
    pub(super) fn new(base: AdapterBase) -> Result<Self, Error> {
        base.config()
            .relations_named(base.key(), LIMITING_RELATION)?;
        Ok(Self { base })
    }
}

impl Behavior for LoadShifting {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let limiting = base
            .config()
            .relations_named(base.key(), LIMITING_RELATION)?
            .iter()
            .map(|key| {
                resolver
                    .related_loads(base.node(), LIMITING_RELATION, key)
                    .cloned()
            })
            .collect::<Result<Vec<AdapterLoads>, Error>>()?;
        // Consumers are cleared before flex participants in the same frame.
        let limit = LazyCurve::new(move |frame| {
            limiting
                .iter()
                .map(|loads| loads.value(Direction::Input, frame))
                .sum()
        });

        let debt = Reserve::new(base.volume().unwrap_or(f64::INFINITY), 0.0);
        let output_capacity = base.output_capacity();
        let input_capacity = match base.input_capacity() {
            capacity if capacity > 0.0 => capacity,
            _ => output_capacity,
        };

        Ok(vec![
            Participant::new(
                base.key(),
                ParticipantKind::Flex {
                    role: FlexRole::Shedding {
                        debt: debt.clone(),
                        limit: limit.into(),
                        recovery_capacity: input_capacity,
                    },
                    group: None,
                    input_capacity: Hourly::Constant(0.0),
                    output_capacity: Hourly::Constant(output_capacity),
                    consumption_price: Hourly::Constant(0.0),
                    production_price: base.price(base.node().marginal_costs)?,
                },
                base.loads().output.clone(),
            ),
            Participant::new(
                base.key(),
                ParticipantKind::Flex {
                    role: FlexRole::Recovery { debt },
                    group: None,
                    input_capacity: Hourly::Constant(input_capacity),
                    output_capacity: Hourly::Constant(0.0),
                    consumption_price: Hourly::Constant(f64::INFINITY),
                    production_price: Hourly::Constant(0.0),
                },
                base.loads().input.clone(),
            ),
        ])
    }
}
