// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Optimization of several batteries against the same residual load.
//!
//! Batteries are optimized one at a time: sectors in key order, and the
//! batteries of a sector in the order they are given.  Each battery sees the
//! residual including the loads of all batteries before it, and a frame in
//! which an earlier battery discharged is never used for charging (and vice
//! versa).

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{StorageAlgorithm, StorageParameters, StorageSchedule};
use crate::curves::{Curve, FRAMES};

pub struct StorageDistributor {
    lookbehind: usize,
    residual: Vec<f64>,
    charge_ceiling: Vec<f64>,
    discharge_ceiling: Vec<f64>,
}

impl StorageDistributor {
    pub fn new(residual: &Curve, lookbehind: usize) -> Self {
        Self {
            lookbehind,
            residual: residual.as_slice().to_vec(),
            charge_ceiling: vec![f64::INFINITY; FRAMES],
            discharge_ceiling: vec![f64::INFINITY; FRAMES],
        }
    }

    /// The residual load including the schedules distributed so far.
    pub fn residual(&self) -> Curve {
        Curve::from_fn(|frame| self.residual[frame])
    }

    /// Optimizes every sector, in key order, and returns the schedules in the
    /// order of the given batteries.
    pub fn distribute(
        &mut self,
        sectors: &BTreeMap<String, Vec<StorageParameters>>,
    ) -> BTreeMap<String, Vec<StorageSchedule>> {
        sectors
            .iter()
            .map(|(sector, batteries)| (sector.clone(), self.distribute_sector(sector, batteries)))
            .collect()
    }

    /// Optimizes the batteries of one sector, one after the other.
    pub fn distribute_sector(
        &mut self,
        sector: &str,
        batteries: &[StorageParameters],
    ) -> Vec<StorageSchedule> {
        let schedules = batteries
            .iter()
            .map(|battery| self.distribute_battery(*battery))
            .collect::<Vec<_>>();
        info!(
            "Optimized {} batteries in storage sector `{}`: {:.1} MWh discharged.",
            batteries.len(),
            sector,
            -schedules
                .iter()
                .flat_map(|s| s.load.iter())
                .filter(|l| **l < 0.0)
                .sum::<f64>()
        );
        schedules
    }

    fn distribute_battery(&mut self, battery: StorageParameters) -> StorageSchedule {
        if !battery.is_usable() {
            debug!("Skipping a battery without capacity or volume.");
            return StorageSchedule::idle();
        }

        let schedule = StorageAlgorithm::new(
            &self.residual,
            battery,
            &self.charge_ceiling,
            &self.discharge_ceiling,
            self.lookbehind,
        )
        .run();

        for (frame, load) in schedule.load.iter().enumerate() {
            self.residual[frame] += load;
            if *load > 0.0 {
                self.discharge_ceiling[frame] = 0.0;
            } else if *load < 0.0 {
                self.charge_ceiling[frame] = 0.0;
            }
        }
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_optimization::DEFAULT_LOOKBEHIND;

    fn battery(capacity: f64, volume: f64) -> StorageParameters {
        StorageParameters {
            input_capacity: capacity,
            output_capacity: capacity,
            volume,
            input_efficiency: 1.0,
            output_efficiency: 1.0,
        }
    }

    fn evening_peaks() -> Curve {
        Curve::from_fn(|frame| if (18..21).contains(&(frame % 24)) { 30.0 } else { 10.0 })
    }

    fn assert_no_opposite_use(first: &StorageSchedule, second: &StorageSchedule) {
        for frame in 0..FRAMES {
            let (a, b) = (first.load.get(frame), second.load.get(frame));
            assert!(!(a > 0.0 && b < 0.0), "frame {}: {} and {}", frame, a, b);
            assert!(!(a < 0.0 && b > 0.0), "frame {}: {} and {}", frame, a, b);
        }
    }

    #[test]
    fn test_mixed_batteries_keep_their_limits() {
        let mut distributor = StorageDistributor::new(&evening_peaks(), DEFAULT_LOOKBEHIND);
        let batteries = [battery(2.0, 10.0), battery(3.0, 30.0)];
        let schedules = distributor.distribute_sector("households", &batteries);

        assert_eq!(schedules.len(), 2);
        for (battery, schedule) in batteries.iter().zip(&schedules) {
            let peak_load = schedule.load.iter().fold(0.0_f64, |m, l| m.max(l.abs()));
            assert!(peak_load > 0.0);
            assert!(
                peak_load <= battery.output_capacity + 1e-9,
                "load {} above capacity {}",
                peak_load,
                battery.output_capacity
            );
            assert!(schedule.state_of_charge.max() <= battery.volume + 1e-9);
            assert!(schedule.state_of_charge.iter().all(|soc| *soc >= -1e-9));
        }
        assert_no_opposite_use(&schedules[0], &schedules[1]);
    }

    #[test]
    fn test_batteries_see_earlier_loads() {
        let residual = evening_peaks();
        let mut distributor = StorageDistributor::new(&residual, DEFAULT_LOOKBEHIND);
        let sectors = BTreeMap::from([
            ("a".to_string(), vec![battery(5.0, 20.0)]),
            ("b".to_string(), vec![battery(5.0, 20.0), battery(1.0, 5.0)]),
        ]);
        let schedules = distributor.distribute(&sectors);

        let (a, b, c) = (&schedules["a"][0], &schedules["b"][0], &schedules["b"][1]);
        assert_no_opposite_use(a, b);
        assert_no_opposite_use(a, c);
        assert_no_opposite_use(b, c);

        let expected = residual
            .zip_with(&a.load, |r, l| r + l)
            .zip_with(&b.load, |r, l| r + l)
            .zip_with(&c.load, |r, l| r + l);
        let actual = distributor.residual();
        for frame in 0..FRAMES {
            assert!((actual.get(frame) - expected.get(frame)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_flat_residual_and_empty_sector() {
        let mut distributor = StorageDistributor::new(&Curve::flat(50.0), DEFAULT_LOOKBEHIND);
        let schedules = distributor.distribute_sector("households", &[battery(5.0, 20.0)]);
        assert_eq!(schedules, vec![StorageSchedule::idle()]);

        let schedules = distributor.distribute_sector("industry", &[battery(5.0, 0.0)]);
        assert_eq!(schedules, vec![StorageSchedule::idle()]);
        assert!(distributor.distribute_sector("empty", &[]).is_empty());
    }
}
