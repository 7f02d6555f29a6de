// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Managers run the dispatch of one carrier: they build an adapter for every
//! installed node, hand the participants to a dispatch engine, and write the
//! results back to the graph.
//!
//! A manager goes through its phases exactly once per pass:
//!
//! ```text
//! New -> SetUp -> Dynamic -> Calculated -> Injected
//! ```
//!
//! Calling a phase out of order is an error.

mod facade;
mod heat_network;
mod reconciliation;
mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::rc::Rc;

use tracing::{debug, info};

use crate::adapters::{Adapter, OptimizingStorage};
use crate::curves::{Curve, FRAMES};
use crate::dispatch::{
    CalculationOrder, Context, CurveResolver, DispatchEngine, DispatchOrder, FlexGroup,
    Participant, ParticipantKind, Sorter,
};
use crate::storage_optimization::{StorageDistributor, StorageParameters};
use crate::{Carrier, EnergyGraph, Error};

pub use facade::{CompletedPass, DispatchFacade, GraphCalculator};
pub use heat_network::HeatNetworks;
pub use reconciliation::ReconciliationManagers;
pub use registry::{AdapterRegistry, RegistrySet};

/// The phase a [`Manager`] is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    New,
    SetUp,
    Dynamic,
    Calculated,
    Injected,
}

impl Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ManagerState::New => "new",
            ManagerState::SetUp => "set up",
            ManagerState::Dynamic => "dynamic",
            ManagerState::Calculated => "calculated",
            ManagerState::Injected => "injected",
        };
        write!(f, "{}", name)
    }
}

/// Runs the dispatch of one carrier.
pub struct Manager {
    context: Context,
    state: ManagerState,
    adapters: Vec<Adapter>,
    order: Option<Box<dyn DispatchOrder>>,
    next_frame: usize,
}

impl Manager {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            state: ManagerState::New,
            adapters: Vec::new(),
            order: None,
            next_frame: 0,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.context.carrier()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// The frame the manager calculates next.
    pub fn next_frame(&self) -> usize {
        self.next_frame
    }

    /// The adapters of all installed nodes, sorted by node key.
    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    pub fn adapter(&self, key: &str) -> Option<&Adapter> {
        self.adapters.iter().find(|adapter| adapter.key() == key)
    }

    /// The participants handed to the dispatch engine.
    pub fn participants(&self) -> Vec<Rc<Participant>> {
        self.order
            .as_ref()
            .map(|order| order.participants())
            .unwrap_or_default()
    }

    fn ensure_state(&self, state: ManagerState, action: &str) -> Result<(), Error> {
        if self.state != state {
            return Err(Error::invalid_state(format!(
                "Cannot {} the {} manager: it is {}, expected {}.",
                action,
                self.carrier(),
                self.state,
                state
            )));
        }
        Ok(())
    }

    /// Builds the adapters of all nodes configured for the carrier, in the
    /// current state of the graph, and runs their early hooks.
    ///
    /// The adapters are discarded afterwards; [`setup`](Self::setup) builds
    /// them again after the static recalculation.
    pub fn setup_early(&self, graph: &mut EnergyGraph) -> Result<(), Error> {
        self.ensure_state(ManagerState::New, "run the early hooks of")?;
        let adapters = self.build_adapters(graph)?;
        for adapter in &adapters {
            adapter.setup_early(graph)?;
        }
        Ok(())
    }

    /// Builds one adapter per installed node.
    pub fn setup(&mut self, graph: &EnergyGraph) -> Result<(), Error> {
        self.ensure_state(ManagerState::New, "set up")?;
        self.adapters = self.build_adapters(graph)?;
        info!(
            "Set up the {} dispatch with {} adapters.",
            self.carrier(),
            self.adapters.len()
        );
        self.state = ManagerState::SetUp;
        Ok(())
    }

    fn build_adapters(&self, graph: &EnergyGraph) -> Result<Vec<Adapter>, Error> {
        let mut adapters = Vec::new();
        for node in graph.nodes() {
            let Some(adapter) = Adapter::build(node, &self.context)? else {
                continue;
            };
            if adapter.installed() {
                adapters.push(adapter);
            } else {
                debug!(
                    "Node {} is not installed; excluded from the {} dispatch.",
                    node.key,
                    self.carrier()
                );
            }
        }
        adapters.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(adapters)
    }

    /// The load curves of all adapters, for the curve resolvers.
    pub fn registry(&self) -> AdapterRegistry {
        let mut registry = AdapterRegistry::new(self.carrier());
        for adapter in &self.adapters {
            registry.insert(adapter.key(), adapter.loads().clone());
        }
        registry
    }

    /// Resolves curves, builds the participants and hands them to a new
    /// dispatch order of `engine`.
    ///
    /// Optimizing storages are scheduled here, against the residual load of
    /// the other participants.
    pub fn setup_dynamic(
        &mut self,
        graph: &EnergyGraph,
        engine: &dyn DispatchEngine,
        registries: &RegistrySet,
        calculation_order: &CalculationOrder,
    ) -> Result<(), Error> {
        self.ensure_state(ManagerState::SetUp, "set up the dynamic dispatch of")?;
        let carrier = self.carrier();
        let resolver = CurveResolver::new(
            carrier,
            self.context.curves(),
            registries,
            calculation_order,
        );

        let mut order = engine.order(carrier);
        let groups = self
            .adapters
            .iter()
            .filter_map(|adapter| adapter.flex_group())
            .collect::<BTreeSet<_>>();
        for group in groups {
            order.add_flex_group(FlexGroup::new(group, self.context.group_behavior(group)))?;
        }

        for adapter in self.adapters.iter().filter(|a| a.optimizing_storage().is_none()) {
            adapter.participants(graph, &resolver)?;
        }
        self.schedule_storage()?;

        let mut fixed = Vec::new();
        let mut dispatchables = Vec::new();
        let mut flex = Vec::new();
        for adapter in &self.adapters {
            for participant in adapter.participants(graph, &resolver)? {
                match participant.kind() {
                    ParticipantKind::Dispatchable { .. } => dispatchables.push(participant.clone()),
                    ParticipantKind::Flex { .. } => flex.push(participant.clone()),
                    _ => fixed.push(participant.clone()),
                }
            }
        }
        sort_participants(self.context.dispatchable_sorter(), &mut dispatchables);
        sort_participants(self.context.flex_sorter(), &mut flex);

        let count = fixed.len() + dispatchables.len() + flex.len();
        for participant in fixed.into_iter().chain(dispatchables).chain(flex) {
            order.add(participant)?;
        }
        info!(
            "Handed {} participants to the {} dispatch engine.",
            count, carrier
        );

        self.order = Some(order);
        self.state = ManagerState::Dynamic;
        Ok(())
    }

    /// Demand minus the production that can not be dispatched, from the
    /// participants built so far.
    ///
    /// Curves referring to other calculations are not known yet and are left
    /// out.
    fn residual_load(&self) -> Curve {
        let mut residual = Curve::zeros();
        for adapter in &self.adapters {
            for participant in adapter.built_participants() {
                let (curve, sign) = match participant.kind() {
                    ParticipantKind::Consumer { demand } => (demand, 1.0),
                    ParticipantKind::AlwaysOn { production, .. } => (production, -1.0),
                    _ => continue,
                };
                if curve.is_lazy() {
                    debug!(
                        "Residual load of the {} dispatch leaves out the curve of {}.",
                        self.carrier(),
                        participant.key()
                    );
                    continue;
                }
                residual.add_assign(&curve.to_curve().scale(sign));
            }
        }
        residual
    }

    fn schedule_storage(&self) -> Result<(), Error> {
        let mut sectors: BTreeMap<String, Vec<&OptimizingStorage>> = BTreeMap::new();
        for storage in self.adapters.iter().filter_map(Adapter::optimizing_storage) {
            sectors
                .entry(storage.sector().to_string())
                .or_default()
                .push(storage);
        }
        if sectors.is_empty() {
            return Ok(());
        }

        let params = sectors
            .iter()
            .map(|(sector, storages)| {
                (
                    sector.clone(),
                    storages.iter().map(|s| s.params()).collect::<Vec<StorageParameters>>(),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let mut distributor =
            StorageDistributor::new(&self.residual_load(), self.context.storage_lookbehind());
        let mut schedules = distributor.distribute(&params);

        for (sector, storages) in sectors {
            let sector_schedules = schedules.remove(&sector).unwrap_or_default();
            if sector_schedules.len() != storages.len() {
                return Err(Error::internal(format!(
                    "Storage sector `{}` got {} schedules for {} storages.",
                    sector,
                    sector_schedules.len(),
                    storages.len()
                )));
            }
            for (storage, schedule) in storages.into_iter().zip(sector_schedules) {
                debug!(
                    "Scheduled optimizing storage {} in sector `{}`.",
                    storage.key(),
                    sector
                );
                storage.assign_schedule(schedule)?;
            }
        }
        Ok(())
    }

    /// Clears one frame.  Frames are calculated in ascending order, starting
    /// at 0.
    pub fn calculate_frame(&mut self, frame: usize) -> Result<(), Error> {
        self.ensure_state(ManagerState::Dynamic, "calculate a frame of")?;
        if frame != self.next_frame {
            return Err(Error::invalid_state(format!(
                "The {} manager expected frame {}, got {}.",
                self.carrier(),
                self.next_frame,
                frame
            )));
        }
        let Some(order) = self.order.as_mut() else {
            return Err(Error::internal(format!(
                "The {} manager has no dispatch order.",
                self.carrier()
            )));
        };
        order.calculate_frame(frame)?;

        self.next_frame += 1;
        if self.next_frame == FRAMES {
            self.state = ManagerState::Calculated;
        }
        Ok(())
    }

    /// Clears all remaining frames.
    pub fn calculate(&mut self) -> Result<(), Error> {
        self.ensure_state(ManagerState::Dynamic, "calculate")?;
        while self.state == ManagerState::Dynamic {
            self.calculate_frame(self.next_frame)?;
        }
        Ok(())
    }

    /// Writes the results of every adapter to the graph, then assigns merit
    /// order positions to the dispatchable producers with finite costs.
    pub fn inject_values(&mut self, graph: &mut EnergyGraph) -> Result<(), Error> {
        self.ensure_state(ManagerState::Calculated, "inject the values of")?;
        for adapter in &mut self.adapters {
            adapter.inject(graph)?;
        }

        let mut ranked = self
            .adapters
            .iter()
            .filter(|adapter| adapter.is_merit_ranked())
            .filter_map(|adapter| {
                let costs = adapter.built_participants().first()?.marginal_costs();
                costs.is_finite().then(|| (adapter.key(), costs))
            })
            .collect::<Vec<_>>();
        self.context
            .dispatchable_sorter()
            .sort(&mut ranked, |item| item.0, |item| item.1);
        for (position, (key, _)) in ranked.iter().enumerate() {
            graph
                .slot_writer(key, &[])?
                .set_merit_order_position(self.carrier(), position + 1)?;
        }

        info!("Injected the results of the {} dispatch.", self.carrier());
        self.state = ManagerState::Injected;
        Ok(())
    }

    /// Calculates the remaining frames, injects the results and recalculates
    /// the graph.
    ///
    /// For running a single carrier on its own.  A full pass over all
    /// carriers calculates frames in lock-step instead, see
    /// [`DispatchFacade::run`].
    pub fn run(
        &mut self,
        graph: &mut EnergyGraph,
        calculator: &mut dyn GraphCalculator,
    ) -> Result<(), Error> {
        self.calculate()?;
        self.inject_values(graph)?;
        calculator.recalculate(graph)
    }
}

fn sort_participants(sorter: &Sorter, participants: &mut [Rc<Participant>]) {
    sorter.sort(participants, |p| p.key(), |p| p.marginal_costs());
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("carrier", &self.carrier())
            .field("state", &self.state)
            .field(
                "adapters",
                &self.adapters.iter().map(Adapter::key).collect::<Vec<_>>(),
            )
            .finish()
    }
}
