// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The heat networks, dispatched from the highest temperature down.

use std::rc::Rc;

use crate::config::DispatchConfig;
use crate::curves::{CurveLibrary, FRAMES};
use crate::dispatch::{CalculationOrder, Context, DispatchEngine};
use crate::{Carrier, EnergyGraph, Error};

use super::{GraphCalculator, Manager, RegistrySet};

const NETWORKS: [Carrier; 3] = [Carrier::HtHeat, Carrier::MtHeat, Carrier::LtHeat];

/// The managers of the high, medium and low temperature heat networks.
///
/// Every operation is applied to the networks in that order, so that a
/// network can read the curves of the hotter ones in the same hour.
pub struct HeatNetworks {
    managers: Vec<Manager>,
}

impl HeatNetworks {
    pub fn new(config: &DispatchConfig, curves: &Rc<CurveLibrary>) -> Self {
        Self {
            managers: NETWORKS
                .iter()
                .map(|carrier| Manager::new(Context::from_config(*carrier, config, curves.clone())))
                .collect(),
        }
    }

    pub fn managers(&self) -> &[Manager] {
        &self.managers
    }

    pub fn managers_mut(&mut self) -> &mut [Manager] {
        &mut self.managers
    }

    pub fn manager(&self, carrier: Carrier) -> Option<&Manager> {
        self.managers.iter().find(|m| m.carrier() == carrier)
    }

    pub fn into_managers(self) -> Vec<Manager> {
        self.managers
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
        for frame in 0..FRAMES {
            self.calculate_frame(frame)?;
        }
        self.inject_values(graph)?;
        calculator.recalculate(graph)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::dispatch::{DispatchOrder, FlexGroup, Participant};
    use crate::graph::test_utils::EnergyGraphBuilder;

    type Log = Rc<RefCell<Vec<(Carrier, usize)>>>;

    struct RecordingEngine(Log);

    struct RecordingOrder {
        carrier: Carrier,
        log: Log,
    }

    impl DispatchEngine for RecordingEngine {
        fn order(&self, carrier: Carrier) -> Box<dyn DispatchOrder> {
            Box::new(RecordingOrder {
                carrier,
                log: self.0.clone(),
            })
        }
    }

    impl DispatchOrder for RecordingOrder {
        fn add(&mut self, _participant: Rc<Participant>) -> Result<(), Error> {
            Ok(())
        }

        fn add_flex_group(&mut self, _group: FlexGroup) -> Result<(), Error> {
            Ok(())
        }

        fn calculate_frame(&mut self, frame: usize) -> Result<(), Error> {
            self.log.borrow_mut().push((self.carrier, frame));
            Ok(())
        }

        fn participants(&self) -> Vec<Rc<Participant>> {
            Vec::new()
        }
    }

    #[test]
    fn test_networks_run_hottest_first() -> Result<(), Error> {
        let mut graph = EnergyGraphBuilder::new().build()?;
        let log = Log::default();
        let engine = RecordingEngine(log.clone());
        let curves = Rc::new(CurveLibrary::new());

        let mut networks = HeatNetworks::new(&DispatchConfig::default(), &curves);
        networks.setup(&graph)?;
        networks.setup_dynamic(
            &graph,
            &engine,
            &RegistrySet::new(),
            &CalculationOrder::default(),
        )?;

        let mut recalculations = 0;
        let mut calculator = |_: &mut EnergyGraph| -> Result<(), Error> {
            recalculations += 1;
            Ok(())
        };
        networks.run(&mut graph, &mut calculator)?;
        assert_eq!(recalculations, 1);

        let log = log.borrow();
        assert_eq!(log.len(), 3 * FRAMES);
        assert_eq!(
            log[..6],
            [
                (Carrier::HtHeat, 0),
                (Carrier::MtHeat, 0),
                (Carrier::LtHeat, 0),
                (Carrier::HtHeat, 1),
                (Carrier::MtHeat, 1),
                (Carrier::LtHeat, 1),
            ]
        );
        assert!(networks
            .managers()
            .iter()
            .all(|m| m.state() == crate::manager::ManagerState::Injected));

        Ok(())
    }
}
