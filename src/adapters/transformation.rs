// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Conversion through an intermediate reserve, e.g. hydrogen compressed
//! into a tank and released later.

use crate::dispatch::{CurveResolver, FlexRole, Hourly, Participant, ParticipantKind, Reserve};
use crate::{EnergyGraph, Error};

use super::{AdapterBase, Behavior};

pub struct Transformation {
    base: AdapterBase,
}

impl Transformation {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for Transformation {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        let reserve = Reserve::new(base.volume().unwrap_or(f64::INFINITY), 0.0);

        Ok(vec![
            Participant::new(
                base.key(),
                ParticipantKind::Flex {
                    role: FlexRole::ReserveInput {
                        reserve: reserve.clone(),
                        efficiency: base.output_efficiency(),
                    },
                    group: base.config().group.clone(),
                    input_capacity: base.available_capacity(base.input_capacity())?,
                    output_capacity: Hourly::Constant(0.0),
                    consumption_price: Hourly::Constant(
                        base.config().consumption_price.unwrap_or(0.0),
                    ),
                    production_price: Hourly::Constant(0.0),
                },
                base.loads().input.clone(),
            ),
            Participant::new(
                base.key(),
                ParticipantKind::Flex {
                    role: FlexRole::ReserveOutput { reserve },
                    group: base.config().group.clone(),
                    input_capacity: Hourly::Constant(0.0),
                    output_capacity: Hourly::Constant(base.output_capacity()),
                    consumption_price: Hourly::Constant(0.0),
                    production_price: base.price(base.node().marginal_costs)?,
                },
                base.loads().output.clone(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::adapters::Adapter;
    use crate::curves::{Curve, CurveLibrary};
    use crate::dispatch::{CalculationOrder, Context, CurveResolver};
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::graph::CurveSlot;
    use crate::manager::RegistrySet;
    use crate::node_config::FlexKind;
    use crate::{Carrier, DispatchType, Error, NodeConfig};

    #[test]
    fn test_transformation() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let compressor = builder.node("compressor");
        let node = builder.node_mut(compressor);
        node.input_capacities.hydrogen = 10.0;
        node.output_capacities.hydrogen = 6.0;
        node.input_conversions.hydrogen = 1.0;
        node.output_conversions.hydrogen = 0.9;
        node.marginal_costs = 15.0;
        builder.configure(
            compressor,
            Carrier::Hydrogen,
            NodeConfig::new(DispatchType::Flex(FlexKind::Transformation)),
        );
        let mut graph = builder.build()?;

        let context = Context::new(Carrier::Hydrogen, Rc::new(CurveLibrary::new()));
        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver = CurveResolver::new(Carrier::Hydrogen, context.curves(), &registries, &order);
        let mut adapter = Adapter::build(graph.node("compressor")?, &context)?
            .ok_or_else(|| Error::internal("no adapter"))?;
        let participants = adapter.participants(&graph, &resolver)?.to_vec();
        let (input, output) = (&participants[0], &participants[1]);

        input.enter_frame(0);
        output.enter_frame(0);
        assert_eq!(output.output_headroom(0), 0.0);
        assert_eq!(input.consume(0, 20.0), 10.0);

        input.enter_frame(1);
        output.enter_frame(1);
        // 9 MWh were stored; output is limited by capacity.
        assert_eq!(output.produce(1, 20.0), 6.0);
        output.enter_frame(2);
        assert!((output.produce(2, 20.0) - 3.0).abs() < 1e-9);

        adapter.inject(&mut graph)?;
        let results = graph.results("compressor")?;
        assert_eq!(results.demand(Carrier::Hydrogen), Some(10.0));
        assert_eq!(results.marginal_costs(Carrier::Hydrogen), Some(15.0));
        assert_eq!(
            results
                .curve(CurveSlot::Output(Carrier::Hydrogen))
                .map(Curve::sum)
                .map(|sum| (sum - 9.0).abs() < 1e-9),
            Some(true)
        );

        Ok(())
    }
}
