// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A complete dispatch pass over all carriers.

use std::iter::once;
use std::rc::Rc;

use tracing::info;

use crate::config::DispatchConfig;
use crate::curves::{CurveLibrary, FRAMES};
use crate::dispatch::{CalculationOrder, Context, DispatchEngine};
use crate::{Carrier, EnergyGraph, Error};

use super::{HeatNetworks, Manager, ReconciliationManagers, RegistrySet};

/// Recalculates the static values of a graph, e.g. demands and edge
/// shares, from the values written by the dispatch.
pub trait GraphCalculator {
    fn recalculate(&mut self, graph: &mut EnergyGraph) -> Result<(), Error>;
}

impl<F> GraphCalculator for F
where
    F: FnMut(&mut EnergyGraph) -> Result<(), Error>,
{
    fn recalculate(&mut self, graph: &mut EnergyGraph) -> Result<(), Error> {
        self(graph)
    }
}

/// Runs the dispatch of every carrier for one pass.
///
/// The phases of a pass are:
///
/// 1. the early hooks of the reconciliation adapters,
/// 2. a static recalculation of the graph,
/// 3. setting up all managers, which builds the adapters,
/// 4. resolving curves and building participants, in calculation order,
/// 5. calculating every frame, for all managers before moving to the next,
/// 6. injecting the results, followed by a final recalculation.
pub struct DispatchFacade {
    config: DispatchConfig,
    curves: Rc<CurveLibrary>,
    calculation_order: CalculationOrder,
}

impl DispatchFacade {
    pub fn new(config: DispatchConfig, curves: CurveLibrary) -> Self {
        Self {
            calculation_order: CalculationOrder::new(&config.reconciliation_carriers),
            config,
            curves: Rc::new(curves),
        }
    }

    pub fn calculation_order(&self) -> &CalculationOrder {
        &self.calculation_order
    }

    /// Runs one pass over `graph`.
    ///
    /// Results from a previous pass are cleared first.
    pub fn run(
        &self,
        graph: &mut EnergyGraph,
        engine: &dyn DispatchEngine,
        calculator: &mut dyn GraphCalculator,
    ) -> Result<CompletedPass, Error> {
        graph.begin_pass();
        let mut managers = Managers {
            heat: HeatNetworks::new(&self.config, &self.curves),
            agriculture: self.manager(Carrier::AgricultureHeat),
            electricity: self.manager(Carrier::Electricity),
            reconciliation: ReconciliationManagers::new(&self.config, &self.curves),
        };

        managers.reconciliation.setup_early(graph)?;
        calculator.recalculate(graph)?;

        let mut registries = RegistrySet::new();
        for manager in managers.iter_mut() {
            manager.setup(graph)?;
            registries.insert(manager.registry());
        }
        for manager in managers.iter_mut() {
            manager.setup_dynamic(graph, engine, &registries, &self.calculation_order)?;
        }

        for frame in 0..FRAMES {
            for manager in managers.iter_mut() {
                manager.calculate_frame(frame)?;
            }
        }
        info!("Calculated {} frames for {} carriers.", FRAMES, managers.iter_mut().count());

        managers.heat.inject_values(graph)?;
        managers.agriculture.inject_values(graph)?;
        managers.electricity.inject_values(graph)?;
        managers.reconciliation.inject_values(graph)?;
        calculator.recalculate(graph)?;

        Ok(CompletedPass {
            managers: managers.into_vec(),
        })
    }

    fn manager(&self, carrier: Carrier) -> Manager {
        Manager::new(Context::from_config(carrier, &self.config, self.curves.clone()))
    }
}

/// The managers of a pass, in calculation order.
struct Managers {
    heat: HeatNetworks,
    agriculture: Manager,
    electricity: Manager,
    reconciliation: ReconciliationManagers,
}

impl Managers {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Manager> {
        self.heat
            .managers_mut()
            .iter_mut()
            .chain(once(&mut self.agriculture))
            .chain(once(&mut self.electricity))
            .chain(self.reconciliation.managers_mut().iter_mut())
    }

    fn into_vec(self) -> Vec<Manager> {
        let mut managers = self.heat.into_managers();
        managers.push(self.agriculture);
        managers.push(self.electricity);
        managers.extend(self.reconciliation.into_managers());
        managers
    }
}

/// The managers of a finished pass, for inspecting adapters and
/// participants.
#[derive(Debug)]
pub struct CompletedPass {
    managers: Vec<Manager>,
}

impl CompletedPass {
    /// All managers, in calculation order.
    pub fn managers(&self) -> &[Manager] {
        &self.managers
    }

    pub fn manager(&self, carrier: Carrier) -> Option<&Manager> {
        self.managers.iter().find(|m| m.carrier() == carrier)
    }
}
