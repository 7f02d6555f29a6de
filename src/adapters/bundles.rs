// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Multi-node technology bundles.
//!
//! A bundle splits the output of one producer across several nodes of the
//! graph, e.g. between the grid, a battery and a curtailment node.  The
//! split is computed once per pass, and the bundle's adapter writes the
//! results of the sibling nodes it names in its relations.

use std::cell::OnceCell;
use std::rc::Rc;

use tracing::debug;

use crate::curves::{Curve, FRAMES};
use crate::dispatch::{CurveResolver, Participant, ParticipantKind};
use crate::graph::{CurveSlot, ResultSlot, SiblingGrant, SlotWriter};
use crate::{Carrier, EnergyGraph, Error, GraphNode};

use super::{divide, inject_results, AdapterBase, Behavior};

const SOURCE: &str = "source";
const CURTAILMENT: &str = "curtailment";
const BATTERY: &str = "battery";
const CONVERTER: &str = "converter";

/// The bundle's profile, scaled to `annual` MWh of electricity.
fn production_profile(base: &AdapterBase, annual: f64) -> Result<Curve, Error> {
    Ok(base.named_curve(base.profile_name()?)?.normalized_to(annual))
}

/// Capacity of the bundle's grid connection, in MW.
fn connection_capacity(base: &AdapterBase) -> f64 {
    base.config()
        .connection_capacity
        .unwrap_or_else(|| base.output_capacity())
}

fn electricity_input_capacity(node: &GraphNode) -> f64 {
    node.input_capacities.electricity * node.number_of_units
}

fn always_on(base: &AdapterBase, production: &Curve, output_capacity: f64) -> Participant {
    Participant::new(
        base.key(),
        ParticipantKind::AlwaysOn {
            production: production.clone().into(),
            output_capacity,
            marginal_costs: base.node().marginal_costs,
        },
        base.loads().output.clone(),
    )
}

/// Grants for a curtailment node taking the electricity a bundle can not
/// use.
fn curtailment_grant(key: &str) -> SiblingGrant {
    SiblingGrant::new(
        key,
        [
            ResultSlot::Demand(Carrier::Electricity),
            ResultSlot::Curve(CurveSlot::Input(Carrier::Electricity)),
        ],
    )
}

fn inject_curtailment(
    writer: &mut SlotWriter<'_>,
    curtailment: Option<&str>,
    curtailed: &Curve,
) -> Result<(), Error> {
    if let Some(curtailment) = curtailment {
        writer.set_sibling_demand(curtailment, Carrier::Electricity, curtailed.sum())?;
        writer.set_sibling_curve(
            curtailment,
            CurveSlot::Input(Carrier::Electricity),
            curtailed.clone(),
        )?;
    }
    Ok(())
}

struct ElectrolyserCurves {
    /// Electricity taken from the source, in MW.
    usage: Curve,
    /// Hydrogen produced, in MW.
    production: Curve,
    /// Electricity of the source the electrolyser can not use, in MW.
    curtailed: Curve,
    /// Share of the source's electricity used by the electrolyser.
    share: f64,
}

/// An electrolyser running on the electricity of a dedicated source, e.g.
/// an offshore wind park.
///
/// Configured for the hydrogen dispatch; its profile is the production
/// profile of the source.  Whatever the electrolyser can not take goes to
/// the optional curtailment node.
pub struct Electrolyser {
    base: AdapterBase,
    curves: OnceCell<ElectrolyserCurves>,
}

impl Electrolyser {
    pub(super) fn new(base: AdapterBase) -> Result<Self, Error> {
        base.config().relation(base.key(), SOURCE)?;
        Ok(Self {
            base,
            curves: OnceCell::new(),
        })
    }

    fn source(&self) -> Result<&str, Error> {
        self.base.config().relation(self.base.key(), SOURCE)
    }

    fn curtailment(&self) -> Option<&str> {
        self.base.config().optional_relation(CURTAILMENT)
    }

    fn curves(&self, graph: &EnergyGraph) -> Result<&ElectrolyserCurves, Error> {
        if let Some(curves) = self.curves.get() {
            return Ok(curves);
        }

        let node = self.base.node();
        let source = graph.node(self.source()?)?;
        let available = production_profile(
            &self.base,
            source.demand * source.output_conversions.electricity,
        )?;
        let capacity = electricity_input_capacity(node);
        let efficiency = divide(
            *node.output_conversions.get(self.base.carrier()),
            node.input_conversions.electricity,
        );

        let usage = available.map(|value| value.min(capacity));
        let curves = ElectrolyserCurves {
            production: usage.scale(efficiency),
            curtailed: available.zip_with(&usage, |a, u| a - u),
            share: divide(usage.sum(), available.sum()),
            usage,
        };
        debug!(
            "Electrolyser {} uses {:.4} of the electricity of {}.",
            self.base.key(),
            curves.share,
            source.key
        );
        Ok(self.curves.get_or_init(|| curves))
    }
}

impl Behavior for Electrolyser {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    /// Fixes the shares of the source's electricity edges, so that the static
    /// calculation splits the source's output the same way the dispatch does.
    fn setup_early(&self, graph: &mut EnergyGraph) -> Result<(), Error> {
        let share = self.curves(graph)?.share;
        let source = self.source()?;
        let (to_electrolyser, _) = graph.edge(source, self.base.key(), Carrier::Electricity)?;
        let to_curtailment = match self.curtailment() {
            Some(curtailment) => Some(graph.edge(source, curtailment, Carrier::Electricity)?.0),
            None => None,
        };

        let grants = self.sibling_grants();
        let mut writer = graph.slot_writer(self.base.key(), &grants)?;
        writer.set_edge_share(to_electrolyser, share)?;
        if let Some(edge) = to_curtailment {
            writer.set_edge_share(edge, 1.0 - share)?;
        }
        Ok(())
    }

    fn participants(
        &self,
        graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let curves = self.curves(graph)?;
        Ok(vec![always_on(
            &self.base,
            &curves.production,
            self.base.output_capacity(),
        )])
    }

    fn sibling_grants(&self) -> Vec<SiblingGrant> {
        self.curtailment()
            .map(curtailment_grant)
            .into_iter()
            .collect()
    }

    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(&self.base, writer, participants)?;
        let curves = self.curves(writer.graph())?;
        let (usage, curtailed) = (curves.usage.clone(), curves.curtailed.clone());
        writer.set_curve(CurveSlot::Input(Carrier::Electricity), usage)?;
        inject_curtailment(writer, self.curtailment(), &curtailed)
    }
}

struct BatteryParkCurves {
    /// Electricity delivered to the grid, in MW.
    output: Curve,
    charge: Curve,
    discharge: Curve,
    /// Energy stored at the end of every frame, in MWh.
    levels: Curve,
    curtailed: Curve,
}

/// A producer behind a grid connection smaller than its peak output, with a
/// battery storing what the connection can not take.
///
/// The battery is discharged whenever the production leaves room on the
/// connection.  What the battery can not store goes to the optional
/// curtailment node.
pub struct BatteryPark {
    base: AdapterBase,
    curves: OnceCell<BatteryParkCurves>,
}

impl BatteryPark {
    pub(super) fn new(base: AdapterBase) -> Result<Self, Error> {
        base.config().relation(base.key(), BATTERY)?;
        Ok(Self {
            base,
            curves: OnceCell::new(),
        })
    }

    fn battery(&self) -> Result<&str, Error> {
        self.base.config().relation(self.base.key(), BATTERY)
    }

    fn curtailment(&self) -> Option<&str> {
        self.base.config().optional_relation(CURTAILMENT)
    }

    fn curves(&self, graph: &EnergyGraph) -> Result<&BatteryParkCurves, Error> {
        if let Some(curves) = self.curves.get() {
            return Ok(curves);
        }

        let battery = graph.node(self.battery()?)?;
        let production = production_profile(&self.base, self.base.annual_output())?;
        let connection = connection_capacity(&self.base);
        let input_capacity = electricity_input_capacity(battery);
        let output_capacity = battery.output_capacities.electricity * battery.number_of_units;
        let volume = battery
            .storage
            .as_ref()
            .map_or(0.0, |s| s.volume * battery.number_of_units);
        let efficiency = match battery.output_conversions.electricity {
            conversion if conversion > 0.0 => conversion,
            _ => 1.0,
        };

        let mut curves = BatteryParkCurves {
            output: Curve::zeros(),
            charge: Curve::zeros(),
            discharge: Curve::zeros(),
            levels: Curve::zeros(),
            curtailed: Curve::zeros(),
        };
        let mut level = 0.0_f64;
        for frame in 0..FRAMES {
            let available = production.get(frame);
            let direct = available.min(connection);
            let excess = available - direct;
            let charge = excess.min(input_capacity).min((volume - level).max(0.0));
            level += charge;

            let discharge = if available < connection {
                (connection - available)
                    .min(output_capacity)
                    .min(level * efficiency)
            } else {
                0.0
            };
            level -= discharge / efficiency;

            curves.output.set(frame, direct + discharge);
            curves.charge.set(frame, charge);
            curves.discharge.set(frame, discharge);
            curves.levels.set(frame, level);
            curves.curtailed.set(frame, excess - charge);
        }
        debug!(
            "Battery park {} stores {:.1} MWh in {} and curtails {:.1} MWh.",
            self.base.key(),
            curves.charge.sum(),
            battery.key,
            curves.curtailed.sum()
        );
        Ok(self.curves.get_or_init(|| curves))
    }
}

impl Behavior for BatteryPark {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let curves = self.curves(graph)?;
        Ok(vec![always_on(
            &self.base,
            &curves.output,
            connection_capacity(&self.base),
        )])
    }

    fn sibling_grants(&self) -> Vec<SiblingGrant> {
        let mut grants = Vec::new();
        if let Ok(battery) = self.battery() {
            grants.push(SiblingGrant::new(
                battery,
                [
                    ResultSlot::Demand(Carrier::Electricity),
                    ResultSlot::Curve(CurveSlot::Input(Carrier::Electricity)),
                    ResultSlot::Curve(CurveSlot::Output(Carrier::Electricity)),
                    ResultSlot::Curve(CurveSlot::Storage(Carrier::Electricity)),
                ],
            ));
        }
        grants.extend(self.curtailment().map(curtailment_grant));
        grants
    }

    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(&self.base, writer, participants)?;
        let battery = self.battery()?;
        let curves = self.curves(writer.graph())?;
        let (charge, discharge, levels, curtailed) = (
            curves.charge.clone(),
            curves.discharge.clone(),
            curves.levels.clone(),
            curves.curtailed.clone(),
        );

        writer.set_sibling_demand(battery, Carrier::Electricity, charge.sum())?;
        writer.set_sibling_curve(battery, CurveSlot::Input(Carrier::Electricity), charge)?;
        writer.set_sibling_curve(battery, CurveSlot::Output(Carrier::Electricity), discharge)?;
        writer.set_sibling_curve(battery, CurveSlot::Storage(Carrier::Electricity), levels)?;
        inject_curtailment(writer, self.curtailment(), &curtailed)
    }
}

struct HybridOffshoreCurves {
    output: Curve,
    converted: Curve,
    curtailed: Curve,
}

/// An offshore wind park behind a limited grid connection, with a converter
/// (e.g. an offshore electrolyser) taking what the connection can not.
pub struct HybridOffshore {
    base: AdapterBase,
    curves: OnceCell<HybridOffshoreCurves>,
}

impl HybridOffshore {
    pub(super) fn new(base: AdapterBase) -> Result<Self, Error> {
        base.config().relation(base.key(), CONVERTER)?;
        Ok(Self {
            base,
            curves: OnceCell::new(),
        })
    }

    fn converter(&self) -> Result<&str, Error> {
        self.base.config().relation(self.base.key(), CONVERTER)
    }

    fn curtailment(&self) -> Option<&str> {
        self.base.config().optional_relation(CURTAILMENT)
    }

    fn curves(&self, graph: &EnergyGraph) -> Result<&HybridOffshoreCurves, Error> {
        if let Some(curves) = self.curves.get() {
            return Ok(curves);
        }

        let converter = graph.node(self.converter()?)?;
        let production = production_profile(&self.base, self.base.annual_output())?;
        let connection = connection_capacity(&self.base);
        let converter_capacity = electricity_input_capacity(converter);

        let output = production.map(|value| value.min(connection));
        let converted = production.zip_with(&output, |p, o| (p - o).min(converter_capacity));
        let curtailed = Curve::from_fn(|f| production.get(f) - output.get(f) - converted.get(f));
        Ok(self.curves.get_or_init(|| HybridOffshoreCurves {
            output,
            converted,
            curtailed,
        }))
    }
}

impl Behavior for HybridOffshore {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn participants(
        &self,
        graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        let curves = self.curves(graph)?;
        Ok(vec![always_on(
            &self.base,
            &curves.output,
            connection_capacity(&self.base),
        )])
    }

    fn sibling_grants(&self) -> Vec<SiblingGrant> {
        let mut grants = Vec::new();
        if let Ok(converter) = self.converter() {
            grants.push(SiblingGrant::new(
                converter,
                [
                    ResultSlot::Demand(Carrier::Electricity),
                    ResultSlot::Curve(CurveSlot::Input(Carrier::Electricity)),
                ],
            ));
        }
        grants.extend(self.curtailment().map(curtailment_grant));
        grants
    }

    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(&self.base, writer, participants)?;
        let converter = self.converter()?;
        let curves = self.curves(writer.graph())?;
        let (converted, curtailed) = (curves.converted.clone(), curves.curtailed.clone());

        writer.set_sibling_demand(converter, Carrier::Electricity, converted.sum())?;
        writer.set_sibling_curve(converter, CurveSlot::Input(Carrier::Electricity), converted)?;
        inject_curtailment(writer, self.curtailment(), &curtailed)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::adapters::Adapter;
    use crate::curves::{Curve, CurveLibrary, FRAMES};
    use crate::dispatch::{CalculationOrder, Context, CurveResolver, ParticipantKind};
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::graph::CurveSlot;
    use crate::manager::RegistrySet;
    use crate::node_config::ProducerSubtype;
    use crate::{
        Carrier, DispatchType, EdgeKind, EnergyGraph, Error, NodeConfig, StorageProperties,
    };

    /// Zero in even hours, one in odd hours.
    fn library() -> Rc<CurveLibrary> {
        Rc::new(CurveLibrary::new().with_profile("wind", Curve::from_fn(|f| (f % 2) as f64)))
    }

    /// Builds the adapter of `key` and lets its production through, as the
    /// dispatch engine would.
    fn dispatch(graph: &mut EnergyGraph, key: &str, carrier: Carrier) -> Result<Adapter, Error> {
        let context = Context::new(carrier, library());
        let mut adapter = Adapter::build(graph.node(key)?, &context)?
            .ok_or_else(|| Error::internal("no adapter"))?;
        adapter.setup_early(graph)?;

        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver = CurveResolver::new(carrier, context.curves(), &registries, &order);
        let participant = adapter.participants(graph, &resolver)?[0].clone();
        let ParticipantKind::AlwaysOn { production, .. } = participant.kind() else {
            return Err(Error::internal("expected an always-on participant"));
        };
        for frame in 0..FRAMES {
            participant.load_curve().set(frame, production.get(frame));
        }
        adapter.inject(graph)?;
        Ok(adapter)
    }

    fn curve_value(
        graph: &EnergyGraph,
        key: &str,
        slot: CurveSlot,
        frame: usize,
    ) -> Result<Option<f64>, Error> {
        Ok(graph.results(key)?.curve(slot).map(|c| c.get(frame)))
    }

    #[test]
    fn test_electrolyser() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let wind = builder.node("offshore_wind");
        builder.node_mut(wind).demand = 87600.0;
        builder.node_mut(wind).output_conversions.electricity = 1.0;
        let electrolyser = builder.node("electrolyser");
        let node = builder.node_mut(electrolyser);
        node.input_capacities.electricity = 15.0;
        node.output_capacities.hydrogen = 9.0;
        node.input_conversions.electricity = 1.0;
        node.output_conversions.hydrogen = 0.6;
        let curtailment = builder.node("wind_curtailment");
        builder
            .configure(
                electrolyser,
                Carrier::Hydrogen,
                NodeConfig::new(DispatchType::Producer(ProducerSubtype::Electrolyser))
                    .with_profile("wind")
                    .with_relation("source", "offshore_wind")
                    .with_relation("curtailment", "wind_curtailment"),
            )
            .connect(wind, electrolyser, Carrier::Electricity, EdgeKind::Share)
            .connect(wind, curtailment, Carrier::Electricity, EdgeKind::Share);
        let mut graph = builder.build()?;

        dispatch(&mut graph, "electrolyser", Carrier::Hydrogen)?;

        // 20 MW in odd hours, of which the electrolyser takes 15.
        let (edge, _) = graph.edge("offshore_wind", "electrolyser", Carrier::Electricity)?;
        assert!((graph.edge_share(edge)? - 0.75).abs() < 1e-9);
        let (edge, _) = graph.edge("offshore_wind", "wind_curtailment", Carrier::Electricity)?;
        assert!((graph.edge_share(edge)? - 0.25).abs() < 1e-9);

        let hydrogen = CurveSlot::Output(Carrier::Hydrogen);
        let electricity = CurveSlot::Input(Carrier::Electricity);
        assert_eq!(curve_value(&graph, "electrolyser", hydrogen, 0)?, Some(0.0));
        assert!(curve_value(&graph, "electrolyser", hydrogen, 1)?
            .is_some_and(|v| (v - 9.0).abs() < 1e-9));
        assert!(curve_value(&graph, "electrolyser", electricity, 1)?
            .is_some_and(|v| (v - 15.0).abs() < 1e-9));
        assert!(curve_value(&graph, "wind_curtailment", electricity, 1)?
            .is_some_and(|v| (v - 5.0).abs() < 1e-9));
        assert!(graph
            .results("electrolyser")?
            .demand(Carrier::Hydrogen)
            .is_some_and(|d| (d - 15.0 * 4380.0).abs() < 1e-6));

        Ok(())
    }

    #[test]
    fn test_battery_park() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let solar = builder.node("solar_park");
        builder.node_mut(solar).demand = 87600.0;
        builder.node_mut(solar).output_conversions.electricity = 1.0;
        builder.node_mut(solar).output_capacities.electricity = 20.0;
        let battery = builder.node("solar_park_battery");
        let node = builder.node_mut(battery);
        node.input_capacities.electricity = 5.0;
        node.output_capacities.electricity = 5.0;
        node.storage = Some(StorageProperties {
            volume: 100.0,
            decay: 0.0,
        });
        builder.node("solar_park_curtailment");
        builder.configure(
            solar,
            Carrier::Electricity,
            NodeConfig {
                connection_capacity: Some(12.0),
                ..NodeConfig::new(DispatchType::Producer(ProducerSubtype::BatteryPark))
                    .with_profile("wind")
                    .with_relation("battery", "solar_park_battery")
                    .with_relation("curtailment", "solar_park_curtailment")
            },
        );
        let mut graph = builder.build()?;

        dispatch(&mut graph, "solar_park", Carrier::Electricity)?;

        let output = CurveSlot::Output(Carrier::Electricity);
        let input = CurveSlot::Input(Carrier::Electricity);
        let storage = CurveSlot::Storage(Carrier::Electricity);
        // Nothing stored yet in the first hour.
        assert_eq!(curve_value(&graph, "solar_park", output, 0)?, Some(0.0));
        // 20 MW: 12 to the grid, 5 to the battery, 3 curtailed.
        assert!(curve_value(&graph, "solar_park", output, 1)?.is_some_and(|v| v == 12.0));
        assert!(curve_value(&graph, "solar_park_battery", input, 1)?.is_some_and(|v| v == 5.0));
        assert!(curve_value(&graph, "solar_park_battery", storage, 1)?.is_some_and(|v| v == 5.0));
        assert!(
            curve_value(&graph, "solar_park_curtailment", input, 1)?.is_some_and(|v| v == 3.0)
        );
        // 0 MW: the battery discharges into the free connection.
        assert!(curve_value(&graph, "solar_park", output, 2)?.is_some_and(|v| v == 5.0));
        assert!(curve_value(&graph, "solar_park_battery", output, 2)?.is_some_and(|v| v == 5.0));
        assert!(curve_value(&graph, "solar_park_battery", storage, 2)?.is_some_and(|v| v == 0.0));
        assert_eq!(
            graph
                .results("solar_park_battery")?
                .demand(Carrier::Electricity),
            Some(5.0 * 4380.0)
        );

        Ok(())
    }

    #[test]
    fn test_hybrid_offshore() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        let wind = builder.node("hybrid_wind");
        builder.node_mut(wind).demand = 87600.0;
        builder.node_mut(wind).output_conversions.electricity = 1.0;
        builder.node_mut(wind).output_capacities.electricity = 12.0;
        let converter = builder.node("offshore_electrolyser");
        builder.node_mut(converter).input_capacities.electricity = 6.0;
        builder.configure(
            wind,
            Carrier::Electricity,
            NodeConfig::new(DispatchType::Producer(ProducerSubtype::HybridOffshore))
                .with_profile("wind")
                .with_relation("converter", "offshore_electrolyser"),
        );
        let mut graph = builder.build()?;

        dispatch(&mut graph, "hybrid_wind", Carrier::Electricity)?;

        let output = CurveSlot::Output(Carrier::Electricity);
        let input = CurveSlot::Input(Carrier::Electricity);
        assert!(curve_value(&graph, "hybrid_wind", output, 1)?.is_some_and(|v| v == 12.0));
        assert!(
            curve_value(&graph, "offshore_electrolyser", input, 1)?.is_some_and(|v| v == 6.0)
        );
        assert_eq!(
            graph
                .results("offshore_electrolyser")?
                .demand(Carrier::Electricity),
            Some(6.0 * 4380.0)
        );
        // Without a curtailment node the rest is lost.
        assert!(graph
            .results("hybrid_wind")?
            .demand(Carrier::Electricity)
            .is_some_and(|d| (d - 12.0 * 4380.0).abs() < 1e-6));

        Ok(())
    }
}
