// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Adapters translate a node's dispatch configuration into participants and
//! write the dispatch results back to the node.
//!
//! Every supported technology is a variant of the closed `Technology` union,
//! selected from the `(type, subtype)` pair of the node's configuration in
//! [`Adapter::build`].

mod bundles;
mod consumer;
mod flex;
mod load_shifting;
mod optimizing_storage;
mod producer;
mod storage;
mod transformation;

use std::cell::OnceCell;
use std::rc::Rc;

use tracing::debug;

use crate::curves::{Curve, CurveLibrary, CurveSource};
use crate::dispatch::{Context, CurveResolver, Hourly, LoadCurve, Participant};
use crate::graph::{CurveSlot, SiblingGrant, SlotWriter};
use crate::node_config::{ConsumerSubtype, FlexKind, ProducerSubtype};
use crate::{Carrier, Direction, DispatchType, EnergyGraph, Error, GraphNode, NodeConfig};

use bundles::{BatteryPark, Electrolyser, HybridOffshore};
use consumer::{Consumer, ConsumptionLoss};
use flex::{Curtailment, Export, PowerToX};
use load_shifting::LoadShifting;
pub(crate) use optimizing_storage::OptimizingStorage;
use producer::{AlwaysOn, Backup, CurtailedAlwaysOn, Dispatchable, Import};
use storage::{HeatStorage, Storage};
use transformation::Transformation;

/// The load curves of an adapter, shared with the curve resolvers of other
/// calculations.
///
/// Adapters with a single participant use the same curve for both
/// directions.  Adapters with an input and an output participant keep them
/// apart.
#[derive(Clone, Debug)]
pub struct AdapterLoads {
    pub input: LoadCurve,
    pub output: LoadCurve,
}

impl AdapterLoads {
    /// Loads of an adapter with a single participant.
    pub fn single() -> Self {
        let load = LoadCurve::new();
        Self {
            input: load.clone(),
            output: load,
        }
    }

    /// Loads of an adapter with separate input and output participants.
    pub fn paired() -> Self {
        Self {
            input: LoadCurve::new(),
            output: LoadCurve::new(),
        }
    }

    /// The consumption (for `Input`) or production (for `Output`) at the
    /// given frame, as a positive number.
    pub fn value(&self, direction: Direction, frame: usize) -> f64 {
        match direction {
            Direction::Input => (-self.input.get(frame)).max(0.0),
            Direction::Output => self.output.get(frame).max(0.0),
        }
    }
}

/// Divides, returning 0.0 for a non-positive divisor.
pub(crate) fn divide(numerator: f64, divisor: f64) -> f64 {
    if divisor > 0.0 {
        numerator / divisor
    } else {
        0.0
    }
}

/// The node, configuration and load curves every adapter holds.
pub(crate) struct AdapterBase {
    node: GraphNode,
    config: NodeConfig,
    carrier: Carrier,
    curves: Rc<CurveLibrary>,
    loads: AdapterLoads,
}

impl AdapterBase {
    fn new(node: &GraphNode, config: &NodeConfig, context: &Context, loads: AdapterLoads) -> Self {
        Self {
            node: node.clone(),
            config: config.clone(),
            carrier: context.carrier(),
            curves: context.curves().clone(),
            loads,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.node.key
    }

    pub(crate) fn node(&self) -> &GraphNode {
        &self.node
    }

    pub(crate) fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub(crate) fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub(crate) fn loads(&self) -> &AdapterLoads {
        &self.loads
    }

    pub(crate) fn units(&self) -> f64 {
        self.node.number_of_units
    }

    /// Input capacity of all units, in MW.
    pub(crate) fn input_capacity(&self) -> f64 {
        self.node.input_capacities.get(self.carrier) * self.units()
    }

    /// Output capacity of all units, in MW.
    pub(crate) fn output_capacity(&self) -> f64 {
        self.node.output_capacities.get(self.carrier) * self.units()
    }

    /// Annual input of the carrier, in MWh, from the static calculation.
    pub(crate) fn annual_input(&self) -> f64 {
        self.node.demand * self.node.input_conversions.get(self.carrier)
    }

    /// Annual output of the carrier, in MWh, from the static calculation.
    pub(crate) fn annual_output(&self) -> f64 {
        self.node.demand * self.node.output_conversions.get(self.carrier)
    }

    /// Storage volume of all units, in MWh, if the node is a storage.
    pub(crate) fn volume(&self) -> Option<f64> {
        self.node
            .storage
            .as_ref()
            .map(|storage| storage.volume * self.units())
    }

    /// Output efficiency of a storage; stored energy that is given out.
    pub(crate) fn output_efficiency(&self) -> f64 {
        let conversion = *self.node.output_conversions.get(self.carrier);
        if conversion > 0.0 {
            conversion
        } else {
            1.0
        }
    }

    pub(crate) fn default_installed(&self) -> bool {
        self.units() > 0.0 && self.node.availability > 0.0
    }

    pub(crate) fn profile_name(&self) -> Result<&str, Error> {
        self.config.profile.as_deref().ok_or_else(|| {
            Error::invalid_configuration(format!(
                "Node {} has no profile for the {} dispatch.",
                self.key(),
                self.carrier
            ))
        })
    }

    /// Resolves the node's profile, scaled to `annual` MWh when it is a
    /// library curve.
    pub(crate) fn profile(
        &self,
        resolver: &CurveResolver<'_>,
        direction: Direction,
        annual: f64,
    ) -> Result<CurveSource, Error> {
        resolver.resolve_scaled(self.profile_name()?, &self.node, direction, annual)
    }

    /// Returns a curve from the library, for this node.
    pub(crate) fn named_curve(&self, name: &str) -> Result<Curve, Error> {
        self.curves.curve(name, Some(&self.node))
    }

    /// The hourly capacity: `capacity` times the availability curve, if one
    /// is configured, and times the node's availability otherwise.
    pub(crate) fn available_capacity(&self, capacity: f64) -> Result<Hourly, Error> {
        match &self.config.availability_curve {
            Some(name) => Ok(Hourly::Curve(self.named_curve(name)?.scale(capacity).into())),
            None => Ok(Hourly::Constant(capacity * self.node.availability)),
        }
    }

    /// The hourly price: the cost curve, if one is configured, and `fixed`
    /// otherwise.
    pub(crate) fn price(&self, fixed: f64) -> Result<Hourly, Error> {
        match &self.config.cost_curve {
            Some(name) => Ok(Hourly::Curve(self.named_curve(name)?.into())),
            None => Ok(Hourly::Constant(fixed)),
        }
    }
}

/// The behavior shared by all technologies.
pub(crate) trait Behavior {
    fn base(&self) -> &AdapterBase;

    /// Whether the technology takes part in the dispatch at all.
    fn installed(&self) -> bool {
        self.base().default_installed()
    }

    /// Runs before the first static recalculation of a pass.
    fn setup_early(&self, _graph: &mut EnergyGraph) -> Result<(), Error> {
        Ok(())
    }

    /// Builds the participants.  Called at most once per adapter.
    fn participants(
        &self,
        graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error>;

    /// The slots of other nodes this technology writes.
    fn sibling_grants(&self) -> Vec<SiblingGrant> {
        Vec::new()
    }

    /// Writes the dispatch results.
    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(self.base(), writer, participants)
    }
}

/// Writes the demand, full-load hours, marginal costs and curves of a node
/// from its participants.
pub(crate) fn inject_results(
    base: &AdapterBase,
    writer: &mut SlotWriter<'_>,
    participants: &[Rc<Participant>],
) -> Result<(), Error> {
    let carrier = base.carrier();
    let node = base.node();
    let loads = base.loads();
    let production: f64 = participants.iter().map(|p| p.production()).sum();
    let consumption: f64 = participants.iter().map(|p| p.consumption()).sum();

    let dispatch_type = base.config().dispatch_type;
    match dispatch_type {
        DispatchType::Producer(_) => {
            writer.set_demand(
                carrier,
                divide(production, *node.output_conversions.get(carrier)),
            )?;
            writer.set_curve(CurveSlot::Output(carrier), loads.output.production_curve())?;
        }
        DispatchType::Consumer(_) => {
            writer.set_demand(
                carrier,
                divide(consumption, *node.input_conversions.get(carrier)),
            )?;
            writer.set_curve(CurveSlot::Input(carrier), loads.input.consumption_curve())?;
        }
        DispatchType::Flex(_) => {
            writer.set_demand(
                carrier,
                divide(consumption, *node.input_conversions.get(carrier)),
            )?;
            writer.set_curve(CurveSlot::Input(carrier), loads.input.consumption_curve())?;
            writer.set_curve(CurveSlot::Output(carrier), loads.output.production_curve())?;
        }
    }

    if !matches!(dispatch_type, DispatchType::Consumer(_)) {
        let primary = participants
            .iter()
            .find(|p| p.output_capacity() > 0.0)
            .or_else(|| participants.first());
        if let Some(primary) = primary {
            writer.set_full_load_hours(carrier, primary.full_load_hours())?;
            writer.set_marginal_costs(carrier, primary.marginal_costs())?;
        }
    }
    if let Some(levels) = participants.iter().find_map(|p| p.reserve_levels()) {
        writer.set_curve(CurveSlot::Storage(carrier), levels)?;
    }

    Ok(())
}

/// A macro for defining the `Technology` union, with one variant per adapter
/// type, and the dispatch of its methods to the variants.
macro_rules! technologies {
    ($(
        ($variant:ident, $name:literal)
    ),*) => {
        /// The technology an adapter represents.
        pub(crate) enum Technology {
            $(
                $variant($variant),
            )*
        }

        impl Technology {
            fn behavior(&self) -> &dyn Behavior {
                match self {
                    $(
                        Self::$variant(technology) => technology,
                    )*
                }
            }

            /// The name of the technology, for logging.
            fn name(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant(_) => $name,
                    )*
                }
            }
        }
    };
}

technologies!(
    (AlwaysOn, "always_on"),
    (CurtailedAlwaysOn, "curtailed_always_on"),
    (Dispatchable, "dispatchable"),
    (Backup, "backup"),
    (Import, "import"),
    (Electrolyser, "electrolyser"),
    (BatteryPark, "battery_park"),
    (HybridOffshore, "hybrid_offshore"),
    (Consumer, "consumer"),
    (ConsumptionLoss, "consumption_loss"),
    (PowerToX, "power_to_x"),
    (Curtailment, "curtailment"),
    (Export, "export"),
    (Storage, "storage"),
    (HeatStorage, "heat_storage"),
    (LoadShifting, "load_shifting"),
    (Transformation, "transformation"),
    (OptimizingStorage, "optimizing_storage")
);

/// One node's representation in one carrier's dispatch.
///
/// Lives for one pass: participants are built once, and results are
/// injected once, after the dispatch has been calculated.
pub struct Adapter {
    technology: Technology,
    participants: OnceCell<Vec<Rc<Participant>>>,
    injected: bool,
}

impl Adapter {
    /// Builds the adapter for `node` in the dispatch of the context's
    /// carrier.
    ///
    /// Returns `None` if the node has no configuration for the carrier.
    pub fn build(node: &GraphNode, context: &Context) -> Result<Option<Adapter>, Error> {
        let Some(config) = context.node_config(node) else {
            return Ok(None);
        };
        let base = || AdapterBase::new(node, config, context, AdapterLoads::single());
        let paired = || AdapterBase::new(node, config, context, AdapterLoads::paired());

        let technology = match config.dispatch_type {
            DispatchType::Producer(subtype) => match subtype {
                ProducerSubtype::MustRun | ProducerSubtype::Volatile => {
                    if !(0.0..=1.0).contains(&config.curtailment) {
                        return Err(Error::invalid_configuration(format!(
                            "Node {}: curtailment must be between 0 and 1, got {}.",
                            node.key, config.curtailment
                        )));
                    }
                    if config.curtailment > 0.0 {
                        Technology::CurtailedAlwaysOn(CurtailedAlwaysOn::new(base()))
                    } else {
                        Technology::AlwaysOn(AlwaysOn::new(base()))
                    }
                }
                ProducerSubtype::Dispatchable => {
                    Technology::Dispatchable(Dispatchable::new(base()))
                }
                ProducerSubtype::Backup => Technology::Backup(Backup::new(base())),
                ProducerSubtype::Import => Technology::Import(Import::new(base())),
                ProducerSubtype::Electrolyser => {
                    Technology::Electrolyser(Electrolyser::new(base())?)
                }
                ProducerSubtype::BatteryPark => Technology::BatteryPark(BatteryPark::new(base())?),
                ProducerSubtype::HybridOffshore => {
                    Technology::HybridOffshore(HybridOffshore::new(base())?)
                }
            },
            DispatchType::Consumer(subtype) => match subtype {
                ConsumerSubtype::Consumer => Technology::Consumer(Consumer::new(base())),
                ConsumerSubtype::ConsumptionLoss => {
                    Technology::ConsumptionLoss(ConsumptionLoss::new(base()))
                }
            },
            DispatchType::Flex(kind) => match kind {
                FlexKind::PowerToX => Technology::PowerToX(PowerToX::new(base())),
                FlexKind::Curtailment => Technology::Curtailment(Curtailment::new(base())),
                FlexKind::Export => Technology::Export(Export::new(base())),
                FlexKind::Storage => Technology::Storage(Storage::new(base())),
                FlexKind::HeatStorage => Technology::HeatStorage(HeatStorage::new(base())),
                FlexKind::LoadShifting => {
                    Technology::LoadShifting(LoadShifting::new(paired())?)
                }
                FlexKind::Transformation => {
                    Technology::Transformation(Transformation::new(paired()))
                }
                FlexKind::OptimizingStorage => {
                    Technology::OptimizingStorage(OptimizingStorage::new(base()))
                }
            },
        };

        Ok(Some(Adapter {
            technology,
            participants: OnceCell::new(),
            injected: false,
        }))
    }

    fn base(&self) -> &AdapterBase {
        self.technology.behavior().base()
    }

    pub fn key(&self) -> &str {
        self.base().key()
    }

    pub fn carrier(&self) -> Carrier {
        self.base().carrier()
    }

    pub fn dispatch_type(&self) -> DispatchType {
        self.base().config().dispatch_type
    }

    /// The name of the technology, e.g. `curtailed_always_on`.
    pub fn technology(&self) -> &'static str {
        self.technology.name()
    }

    pub fn installed(&self) -> bool {
        self.technology.behavior().installed()
    }

    pub fn loads(&self) -> &AdapterLoads {
        self.base().loads()
    }

    /// The flex group of flex technologies.
    pub fn flex_group(&self) -> Option<&str> {
        if self.dispatch_type().is_flex() {
            self.base().config().group.as_deref()
        } else {
            None
        }
    }

    /// Whether the adapter receives a merit-order position.
    pub fn is_merit_ranked(&self) -> bool {
        matches!(
            self.technology,
            Technology::Dispatchable(_) | Technology::Import(_)
        )
    }

    pub(crate) fn optimizing_storage(&self) -> Option<&OptimizingStorage> {
        match &self.technology {
            Technology::OptimizingStorage(storage) => Some(storage),
            _ => None,
        }
    }

    /// Runs the technology's early hook.
    pub fn setup_early(&self, graph: &mut EnergyGraph) -> Result<(), Error> {
        self.technology.behavior().setup_early(graph)
    }

    /// Returns the participants, building them on the first call.
    pub fn participants(
        &self,
        graph: &EnergyGraph,
        resolver: &CurveResolver<'_>,
    ) -> Result<&[Rc<Participant>], Error> {
        if let Some(participants) = self.participants.get() {
            return Ok(participants);
        }
        let participants = self
            .technology
            .behavior()
            .participants(graph, resolver)?
            .into_iter()
            .map(Rc::new)
            .collect::<Vec<_>>();
        debug!(
            "Built {} {} participant(s) for node {} in the {} dispatch.",
            participants.len(),
            self.technology(),
            self.key(),
            self.carrier()
        );
        Ok(self.participants.get_or_init(|| participants))
    }

    /// The participants, if they have been built.
    pub fn built_participants(&self) -> &[Rc<Participant>] {
        self.participants.get().map_or(&[], Vec::as_slice)
    }

    /// Writes the dispatch results to the graph.
    ///
    /// Must be called once, after the dispatch has been calculated.
    pub fn inject(&mut self, graph: &mut EnergyGraph) -> Result<(), Error> {
        if self.injected {
            return Err(Error::invalid_state(format!(
                "Results of node {} were already injected for the {} dispatch.",
                self.key(),
                self.carrier()
            )));
        }
        let Some(participants) = self.participants.get() else {
            return Err(Error::invalid_state(format!(
                "Node {} has no participants in the {} dispatch.",
                self.key(),
                self.carrier()
            )));
        };

        let behavior = self.technology.behavior();
        let grants = behavior.sibling_grants();
        let mut writer = graph.slot_writer(behavior.base().key(), &grants)?;
        behavior.inject(&mut writer, participants)?;

        self.injected = true;
        Ok(())
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Adapter({}, {}, {})",
            self.key(),
            self.carrier(),
            self.technology()
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::curves::{Curve, CurveLibrary, FRAMES};
    use crate::dispatch::CalculationOrder;
    use crate::graph::test_utils::EnergyGraphBuilder;
    use crate::manager::RegistrySet;
    use crate::StorageProperties;

    fn context() -> Context {
        Context::new(
            Carrier::Electricity,
            Rc::new(CurveLibrary::new().with_profile("flat", Curve::flat(1.0))),
        )
    }

    #[rstest]
    #[case::must_run(DispatchType::Producer(ProducerSubtype::MustRun), 0.0, None, "always_on")]
    #[case::volatile(DispatchType::Producer(ProducerSubtype::Volatile), 0.0, None, "always_on")]
    #[case::curtailed_must_run(
        DispatchType::Producer(ProducerSubtype::MustRun),
        0.2,
        None,
        "curtailed_always_on"
    )]
    #[case::curtailed_volatile(
        DispatchType::Producer(ProducerSubtype::Volatile),
        1.0,
        None,
        "curtailed_always_on"
    )]
    #[case::curtailment_ignored(
        DispatchType::Producer(ProducerSubtype::Dispatchable),
        0.5,
        None,
        "dispatchable"
    )]
    #[case::backup(DispatchType::Producer(ProducerSubtype::Backup), 0.0, None, "backup")]
    #[case::import(DispatchType::Producer(ProducerSubtype::Import), 0.0, None, "import")]
    #[case::electrolyser(
        DispatchType::Producer(ProducerSubtype::Electrolyser),
        0.0,
        Some("source"),
        "electrolyser"
    )]
    #[case::battery_park(
        DispatchType::Producer(ProducerSubtype::BatteryPark),
        0.0,
        Some("battery"),
        "battery_park"
    )]
    #[case::hybrid_offshore(
        DispatchType::Producer(ProducerSubtype::HybridOffshore),
        0.0,
        Some("converter"),
        "hybrid_offshore"
    )]
    #[case::consumer(DispatchType::Consumer(ConsumerSubtype::Consumer), 0.0, None, "consumer")]
    #[case::loss(
        DispatchType::Consumer(ConsumerSubtype::ConsumptionLoss),
        0.0,
        None,
        "consumption_loss"
    )]
    #[case::power_to_x(DispatchType::Flex(FlexKind::PowerToX), 0.0, None, "power_to_x")]
    #[case::curtailment(DispatchType::Flex(FlexKind::Curtailment), 0.0, None, "curtailment")]
    #[case::export(DispatchType::Flex(FlexKind::Export), 0.0, None, "export")]
    #[case::storage(DispatchType::Flex(FlexKind::Storage), 0.0, None, "storage")]
    #[case::heat_storage(DispatchType::Flex(FlexKind::HeatStorage), 0.0, None, "heat_storage")]
    #[case::transformation(
        DispatchType::Flex(FlexKind::Transformation),
        0.0,
        None,
        "transformation"
    )]
    #[case::load_shifting(
        DispatchType::Flex(FlexKind::LoadShifting),
        0.0,
        Some("limiting"),
        "load_shifting"
    )]
    #[case::optimizing_storage(
        DispatchType::Flex(FlexKind::OptimizingStorage),
        0.0,
        None,
        "optimizing_storage"
    )]
    fn test_technology_selection(
        #[case] dispatch_type: DispatchType,
        #[case] curtailment: f64,
        #[case] relation: Option<&str>,
        #[case] expected: &str,
    ) -> Result<(), Error> {
        let mut node = GraphNode::new("node");
        let mut config = NodeConfig::new(dispatch_type);
        config.curtailment = curtailment;
        if let Some(relation) = relation {
            config = config.with_relation(relation, "sibling");
        }
        node.configs.electricity = Some(config);

        let adapter = Adapter::build(&node, &context())?;
        assert_eq!(adapter.map(|a| a.technology()), Some(expected));

        Ok(())
    }

    #[rstest]
    #[case::electrolyser(ProducerSubtype::Electrolyser, "source")]
    #[case::battery_park(ProducerSubtype::BatteryPark, "battery")]
    #[case::hybrid_offshore(ProducerSubtype::HybridOffshore, "converter")]
    fn test_bundles_need_relations(
        #[case] subtype: ProducerSubtype,
        #[case] relation: &str,
    ) -> Result<(), Error> {
        let mut node = GraphNode::new("bundle");
        node.configs.electricity = Some(NodeConfig::new(DispatchType::Producer(subtype)));
        assert_eq!(
            Adapter::build(&node, &context()).unwrap_err().to_string(),
            format!("MissingRelation: Node bundle has no `{}` relation.", relation)
        );

        node.configs.electricity = Some(
            NodeConfig::new(DispatchType::Producer(subtype)).with_relation(relation, "sibling"),
        );
        assert!(Adapter::build(&node, &context())?.is_some());

        Ok(())
    }

    #[test]
    fn test_unconfigured_and_invalid() -> Result<(), Error> {
        let mut node = GraphNode::new("plant");
        assert!(Adapter::build(&node, &context())?.is_none());

        let mut config = NodeConfig::new(DispatchType::Producer(ProducerSubtype::Volatile));
        config.curtailment = 1.5;
        node.configs.electricity = Some(config);
        assert_eq!(
            Adapter::build(&node, &context()).unwrap_err().to_string(),
            "InvalidConfiguration: Node plant: curtailment must be between 0 and 1, got 1.5."
        );

        Ok(())
    }

    #[rstest]
    #[case::default_installed(FlexKind::PowerToX, 1.0, 0.0, None, true)]
    #[case::no_units(FlexKind::PowerToX, 0.0, 10.0, None, false)]
    #[case::storage_without_volume(FlexKind::Storage, 1.0, 10.0, Some(0.0), false)]
    #[case::storage_without_properties(FlexKind::Storage, 1.0, 10.0, None, false)]
    #[case::storage(FlexKind::Storage, 1.0, 10.0, Some(5.0), true)]
    #[case::export_without_capacity(FlexKind::Export, 1.0, 0.0, None, false)]
    #[case::export(FlexKind::Export, 1.0, 10.0, None, true)]
    #[case::optimizing_storage_without_volume(FlexKind::OptimizingStorage, 1.0, 10.0, Some(0.0), false)]
    fn test_installed(
        #[case] kind: FlexKind,
        #[case] units: f64,
        #[case] input_capacity: f64,
        #[case] volume: Option<f64>,
        #[case] expected: bool,
    ) -> Result<(), Error> {
        let mut node = GraphNode::new("flex");
        node.number_of_units = units;
        node.input_capacities.electricity = input_capacity;
        node.storage = volume.map(|volume| StorageProperties { volume, decay: 0.0 });
        node.configs.electricity = Some(NodeConfig::new(DispatchType::Flex(kind)));

        let adapter = Adapter::build(&node, &context())?;
        assert_eq!(adapter.map(|a| a.installed()), Some(expected));

        Ok(())
    }

    #[test]
    fn test_backup_and_import_installed() -> Result<(), Error> {
        let mut node = GraphNode::new("producer");
        node.number_of_units = 0.0;
        node.configs.electricity = Some(NodeConfig::new(DispatchType::Producer(
            ProducerSubtype::Backup,
        )));
        assert!(Adapter::build(&node, &context())?.is_some_and(|a| a.installed()));

        node.number_of_units = 1.0;
        node.configs.electricity = Some(NodeConfig::new(DispatchType::Producer(
            ProducerSubtype::Import,
        )));
        assert!(Adapter::build(&node, &context())?.is_some_and(|a| !a.installed()));
        node.output_capacities.electricity = 100.0;
        assert!(Adapter::build(&node, &context())?.is_some_and(|a| a.installed()));

        Ok(())
    }

    #[test]
    fn test_memoized_participants_and_single_injection() -> Result<(), Error> {
        let mut builder = EnergyGraphBuilder::new();
        builder.consumer("households", Carrier::Electricity, 8760.0, "flat");
        let mut graph = builder.build()?;

        let context = context();
        let mut adapter = Adapter::build(graph.node("households")?, &context)?
            .ok_or_else(|| Error::internal("no adapter"))?;
        assert_eq!(adapter.built_participants().len(), 0);
        assert!(adapter.inject(&mut graph).is_err());

        let registries = RegistrySet::new();
        let order = CalculationOrder::default();
        let resolver =
            CurveResolver::new(Carrier::Electricity, context.curves(), &registries, &order);
        let first = adapter.participants(&graph, &resolver)?[0].clone();
        let second = adapter.participants(&graph, &resolver)?[0].clone();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(first.load_curve().ptr_eq(&adapter.loads().input));

        for frame in 0..FRAMES {
            first.load_curve().set(frame, -1.0);
        }
        adapter.inject(&mut graph)?;
        assert_eq!(
            adapter.inject(&mut graph).unwrap_err().to_string(),
            "InvalidState: Results of node households were already injected for the electricity \
             dispatch."
        );

        let results = graph.results("households")?;
        assert_eq!(results.demand(Carrier::Electricity), Some(8760.0));
        assert_eq!(
            results.curve(CurveSlot::Input(Carrier::Electricity)),
            Some(&Curve::flat(1.0))
        );
        assert_eq!(results.full_load_hours(Carrier::Electricity), None);

        Ok(())
    }
}
