// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Storage technologies dispatched hour by hour: charged from surplus
//! energy, discharged in deficit hours.

use std::rc::Rc;

use tracing::debug;

use crate::dispatch::{CurveResolver, FlexRole, Hourly, Participant, ParticipantKind, Reserve};
use crate::graph::SlotWriter;
use crate::{EdgeKind, EnergyGraph, Error};

use super::{divide, inject_results, AdapterBase, Behavior};

fn storage_installed(base: &AdapterBase) -> bool {
    base.default_installed() && base.volume().is_some_and(|volume| volume > 0.0)
}

fn storage_participant(
    base: &AdapterBase,
    consumption_price: f64,
    production_price: f64,
) -> Participant {
    let decay = base.node().storage.as_ref().map_or(0.0, |s| s.decay);
    Participant::new(
        base.key(),
        ParticipantKind::Flex {
            role: FlexRole::Storage {
                reserve: Reserve::new(base.volume().unwrap_or(0.0), decay),
                input_efficiency: 1.0,
                output_efficiency: base.output_efficiency(),
            },
            group: base.config().group.clone(),
            input_capacity: Hourly::Constant(base.input_capacity()),
            output_capacity: Hourly::Constant(base.output_capacity()),
            consumption_price: Hourly::Constant(consumption_price),
            production_price: Hourly::Constant(production_price),
        },
        base.loads().output.clone(),
    )
}

/// A storage, e.g. a battery or a pumped-hydro plant.
pub struct Storage {
    base: AdapterBase,
}

impl Storage {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }

    /// When the storage has both a share and an inverse-flexible output
    /// edge, sets the share edge to the share of the potential output that
    /// was actually discharged.  The rest flows through the inverse-flexible
    /// edge.
    fn update_output_share(
        &self,
        writer: &mut SlotWriter<'_>,
        participant: &Participant,
    ) -> Result<(), Error> {
        let carrier = self.base.carrier();
        let edges = writer.graph().output_edges(self.base.key())?;
        let share_edge = edges
            .iter()
            .find(|(_, e)| e.carrier == carrier && e.kind == EdgeKind::Share)
            .map(|(index, _)| *index);
        let has_dump = edges
            .iter()
            .any(|(_, e)| e.carrier == carrier && e.kind == EdgeKind::InverseFlexible);

        if let (Some(edge), true) = (share_edge, has_dump) {
            let potential = participant.consumption() * self.base.output_efficiency();
            let share = divide(participant.production(), potential).clamp(0.0, 1.0);
            debug!(
                "Storage {}: {} output share set to {:.4}.",
                self.base.key(),
                carrier,
                share
            );
            writer.set_edge_share(edge, share)?;
        }
        Ok(())
    }
}

impl Behavior for Storage {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        storage_installed(&self.base)
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let base = &self.base;
        Ok(vec![storage_participant(
            base,
            base.config().consumption_price.unwrap_or(0.0),
            base.node().marginal_costs,
        )])
    }

    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(&self.base, writer, participants)?;
        if let Some(participant) = participants.first() {
            self.update_output_share(writer, participant)?;
        }
        Ok(())
    }
}

/// A heat storage in a heat network, losing a share of its contents every
/// hour.
pub struct HeatStorage {
    base: AdapterBase,
}

impl HeatStorage {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self { base }
    }
}

impl Behavior for HeatStorage {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        storage_installed(&self.base)
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        Ok(vec![storage_participant(&self.base, 0.0, 0.0)])
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::adapters::Adapter;
    use crate::curves::{Curve, CurveLibrary, FRAMES};
    use crate::dispatch::{CalculationOrder, Context, CurveResolver};
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::graph::CurveSlot;
    use crate::manager::RegistrySet;
    use crate::node_config::FlexKind;
    use crate::{Carrier, DispatchType, EdgeKind, Error, NodeConfig, StorageProperties};

    #[test]
    fn test_output_share() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let battery = builder.storage("battery", Carrier::Electricity, 10.0, 100.0);
        builder.node_mut(battery).output_conversions.electricity = 0.8;
        let grid = builder.node("grid");
        let losses = builder.node("losses");
        builder
            .connect(battery, grid, Carrier::Electricity, EdgeKind::Share)
            .connect(battery, losses, Carrier::Electricity, EdgeKind::InverseFlexible);
        let mut graph = builder.build()?;

        let context = Context::new(Carrier::Electricity, Rc::new(CurveLibrary::new()));
        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver =
            CurveResolver::new(Carrier::Electricity, context.curves(), &registries, &order);
        let mut adapter = Adapter::build(graph.node("battery")?, &context)?
            .ok_or_else(|| Error::internal("no adapter"))?;
        let participant = adapter.participants(&graph, &resolver)?[0].clone();

        participant.enter_frame(0);
        participant.consume(0, 10.0);
        participant.enter_frame(1);
        participant.produce(1, 4.0);
        adapter.inject(&mut graph)?;

        let (edge, _) = graph.edge("battery", "grid", Carrier::Electricity)?;
        assert!((graph.edge_share(edge)? - 0.5).abs() < 1e-9);

        let results = graph.results("battery")?;
        let levels = results
            .curve(CurveSlot::Storage(Carrier::Electricity))
            .ok_or_else(|| Error::internal("no storage curve"))?;
        assert_eq!(levels.get(0), 10.0);
        assert_eq!(levels.get(1), 5.0);
        assert_eq!(results.demand(Carrier::Electricity), Some(10.0));

        Ok(())
    }

    #[test]
    fn test_heat_storage_decay() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let storage = builder.storage("heat_storage", Carrier::LtHeat, 10.0, 100.0);
        builder.node_mut(storage).storage = Some(StorageProperties {
            volume: 100.0,
            decay: 0.5,
        });
        builder.node_mut(storage).marginal_costs = 99.0;
        builder.configure(
            storage,
            Carrier::LtHeat,
            NodeConfig::new(DispatchType::Flex(FlexKind::HeatStorage)),
        );
        let mut graph = builder.build()?;

        let context = Context::new(Carrier::LtHeat, Rc::new(CurveLibrary::new()));
        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver = CurveResolver::new(Carrier::LtHeat, context.curves(), &registries, &order);
        let mut adapter = Adapter::build(graph.node("heat_storage")?, &context)?
            .ok_or_else(|| Error::internal("no adapter"))?;
        let participant = adapter.participants(&graph, &resolver)?[0].clone();

        participant.enter_frame(0);
        participant.consume(0, 8.0);
        // Half of the contents are lost every hour.
        for frame in 1..FRAMES {
            participant.enter_frame(frame);
        }
        adapter.inject(&mut graph)?;

        let results = graph.results("heat_storage")?;
        assert_eq!(results.marginal_costs(Carrier::LtHeat), Some(0.0));
        assert_eq!(
            results
                .curve(CurveSlot::Storage(Carrier::LtHeat))
                .map(|c| c.get(2)),
            Some(2.0)
        );
        assert_eq!(
            results.curve(CurveSlot::Input(Carrier::LtHeat)).map(Curve::sum),
            Some(8.0)
        );

        Ok(())
    }
}
