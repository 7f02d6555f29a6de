// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Flexible technologies that absorb surplus energy and never produce.

use crate::dispatch::{CurveResolver, FlexRole, Hourly, Participant, ParticipantKind};
use crate::{EnergyGraph, Error};

use super::{AdapterBase, Behavior};

/// Builds a sink participant.
fn sink(
    base: &AdapterBase,
    input_capacity: Hourly,
    consumption_price: Hourly,
) -> Participant {
    Participant::new(
        base.key(),
        ParticipantKind::Flex {
            role: FlexRole::Sink,
            group: base.config().group.clone(),
            input_capacity,
            output_capacity: Hourly::Constant(0.0),
            consumption_price,
            production_price: Hourly::Constant(0.0),
        },
        base.loads().input.clone(),
    )
}

/// A conversion of surplus energy into another carrier, e.g. power-to-heat.
pub struct PowerToX {
    base: AdapterBase,
}

impl PowerToX {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for PowerToX {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        Ok(vec![sink(
            base,
            base.available_capacity(base.input_capacity())?,
            base.price(base.config().consumption_price.unwrap_or(0.0))?,
        )])
    }
}

/// Surplus energy that is thrown away.
///
/// A curtailment without input capacity takes any amount.
pub struct Curtailment {
    base: AdapterBase,
}

impl Curtailment {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Curtailment {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let capacity = match base.input_capacity() {
            capacity if capacity > 0.0 => capacity,
            _ => f64::INFINITY,
        };
        Ok(vec![sink(
            base,
            Hourly::Constant(capacity),
            Hourly::Constant(base.config().consumption_price.unwrap_or(0.0)),
        )])
    }
}

/// Energy sold outside the region, optionally with hourly prices and
/// availability.
pub struct Export {
    base: AdapterBase,
}

impl Export {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Export {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        self.base.default_installed() && self.base.input_capacity() > 0.0
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let price = base
            .config()
            .consumption_price
            .unwrap_or(base.node().marginal_costs);
        Ok(vec![sink(
            base,
            base.available_capacity(base.input_capacity())?,
            base.price(price)?,
        )])
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::adapters::Adapter;
    use crate::curves::{Curve, CurveLibrary};
    use crate::dispatch::{CalculationOrder, Context, CurveResolver, FlexRole, ParticipantKind};
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::manager::RegistrySet;
    use crate::node_config::FlexKind;
    use crate::{Carrier, DispatchType, Error, NodeConfig};

    #[test]
    fn test_sinks() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let curtailment = builder.node("curtailment");
        let export = builder.node("export");
        builder.node_mut(export).input_capacities.electricity = 20.0;
        builder.node_mut(export).marginal_costs = 12.0;
        let p2h = builder.node("power_to_heat");
        builder.node_mut(p2h).input_capacities.electricity = 5.0;
        builder.node_mut(p2h).number_of_units = 2.0;

        builder
            .configure(
                curtailment,
                Carrier::Electricity,
                NodeConfig::new(DispatchType::Flex(FlexKind::Curtailment)),
            )
            .configure(
                export,
                Carrier::Electricity,
                NodeConfig::new(DispatchType::Flex(FlexKind::Export)),
            )
            .configure(
                p2h,
                Carrier::Electricity,
                NodeConfig {
                    consumption_price: Some(30.0),
                    availability_curve: Some("winter".to_string()),
                    ..NodeConfig::new(DispatchType::Flex(FlexKind::PowerToX)).with_group("p2x")
                },
            );
        let graph = builder.build()?;

        let context = Context::new(
            Carrier::Electricity,
            Rc::new(CurveLibrary::new().with_profile(
                "winter",
                Curve::from_fn(|f| if f < 2000 { 1.0 } else { 0.0 }),
            )),
        );
        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver =
            CurveResolver::new(Carrier::Electricity, context.curves(), &registries, &order);

        let mut sinks = Vec::new();
        for key in ["curtailment", "export", "power_to_heat"] {
            let adapter = Adapter::build(graph.node(key)?, &context)?
                .ok_or_else(|| Error::internal("no adapter"))?;
            assert!(adapter.installed());
            let ParticipantKind::Flex {
                role: FlexRole::Sink,
                group,
                input_capacity,
                consumption_price,
                ..
            } = adapter.participants(&graph, &resolver)?[0].kind().clone()
            else {
                panic!("expected a sink participant");
            };
            sinks.push((
                group,
                input_capacity.at(0),
                input_capacity.at(5000),
                consumption_price.at(0),
            ));
        }

        assert_eq!(
            sinks,
            vec![
                (None, f64::INFINITY, f64::INFINITY, 0.0),
                (None, 20.0, 20.0, 12.0),
                (Some("p2x".to_string()), 10.0, 0.0, 30.0),
            ]
        );

        Ok(())
    }
}
