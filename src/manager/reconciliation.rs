// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The managers of the reconciliation carriers, such as hydrogen.

use std::rc::Rc;

use tracing::warn;

use crate::config::DispatchConfig;
use crate::curves::{CurveLibrary, FRAMES};
use crate::dispatch::{CalculationOrder, Context, DispatchEngine};
use crate::{Carrier, EnergyGraph, Error};

use super::{GraphCalculator, Manager, RegistrySet};

/// One manager per configured reconciliation carrier, in configuration
/// order.
///
/// Reconciliation adapters get their early hooks run before the static
/// recalculation of the graph, so that the edge shares they write are taken
/// into account.
pub struct ReconciliationManagers {
    managers: Vec<Manager>,
}

impl ReconciliationManagers {
    pub fn new(config: &DispatchConfig, curves: &Rc<CurveLibrary>) -> Self {
        // Carriers with managers of their own are calculated before the
        // reconciliation carriers.
        let own = CalculationOrder::new(&[]);
        let mut managers: Vec<Manager> = Vec::new();
        for carrier in &config.reconciliation_carriers {
            if own.position(*carrier).is_some() {
                warn!(
                    "The {} carrier is not a reconciliation carrier; ignored.",
                    carrier
                );
                continue;
            }
            if managers.iter().any(|m| m.carrier() == *carrier) {
                continue;
            }
            managers.push(Manager::new(Context::from_config(
                *carrier,
                config,
                curves.clone(),
            )));
        }
        Self { managers }
    }

    pub fn carriers(&self) -> Vec<Carrier> {
        self.managers.iter().map(Manager::carrier).collect()
    }

    pub fn managers(&self) -> &[Manager] {
        &self.managers
    }

    pub fn managers_mut(&mut self) -> &mut [Manager] {
        &mut self.managers
    }

    pub fn into_managers(self) -> Vec<Manager> {
        self.managers
    }

    pub fn setup_early(&self, graph: &mut EnergyGraph) -> Result<(), Error> {
        for manager in &self.managers {
            manager.setup_early(graph)?;
        }
        Ok(())
    }

    pub fn setup(&mut self, graph: &EnergyGraph) -> Result<(), Error> {
        for manager in &mut self.managers {
            manager.setup(graph)?;
        }
        Ok(())
    }

    pub fn setup_dynamic(
        &mut self,
        graph: &EnergyGraph,
        engine: &dyn DispatchEngine,
        registries: &RegistrySet,
        calculation_order: &CalculationOrder,
    ) -> Result<(), Error> {
        for manager in &mut self.managers {
            manager.setup_dynamic(graph, engine, registries, calculation_order)?;
        }
        Ok(())
    }

    pub fn calculate_frame(&mut self, frame: usize) -> Result<(), Error> {
        for manager in &mut self.managers {
            manager.calculate_frame(frame)?;
        }
        Ok(())
    }

    /// Clears all remaining frames, every carrier calculating a frame before
    /// the next carrier does.
    pub fn calculate(&mut self) -> Result<(), Error> {
        let next = self
            .managers
            .iter()
            .map(Manager::next_frame)
            .min()
            .unwrap_or(FRAMES);
        for frame in next..FRAMES {
            self.calculate_frame(frame)?;
        }
        Ok(())
    }

    pub fn inject_values(&mut self, graph: &mut EnergyGraph) -> Result<(), Error> {
        for manager in &mut self.managers {
            manager.inject_values(graph)?;
        }
        Ok(())
    }

    /// Calculates all frames, injects the results and recalculates the graph.
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
