// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Greedy peak shaving for a single battery.
//!
//! The battery repeatedly moves energy from a cheap hour to the hour with the
//! highest residual load.  The highest hour ("max frame") is taken from a
//! heap; the cheapest hour before it ("min frame") is searched within the
//! lookbehind window, wrapping around the end of the year.  Every move is
//! capped at a quarter of the gap between the two hours, so that a peak is
//! flattened using many nearby hours rather than exhausting a single one.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::curves::{Curve, FRAMES};

const EPSILON: f64 = 1e-6;

/// A min frame must be below this share of the max frame's value.
const MIN_FRAME_THRESHOLD: f64 = 0.95;

/// Upper bound on the number of heap entries processed in one run.
const MAX_ITERATIONS: usize = FRAMES * 200;

/// The technical properties of a battery, in MW and MWh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StorageParameters {
    pub input_capacity: f64,
    pub output_capacity: f64,
    pub volume: f64,
    /// Share of the energy drawn from the grid that is stored.
    pub input_efficiency: f64,
    /// Share of the stored energy that is given back to the grid.
    pub output_efficiency: f64,
}

impl StorageParameters {
    /// Returns true if the battery can shift any energy at all.
    pub fn is_usable(&self) -> bool {
        self.volume > 0.0 && self.input_capacity > 0.0 && self.output_capacity > 0.0
    }
}

/// The result of optimizing a battery.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageSchedule {
    /// Stored energy at the end of every frame, in MWh.
    pub state_of_charge: Curve,
    /// Energy drawn from the grid in every frame, in MW.  Negative values are
    /// energy given back to the grid.
    pub load: Curve,
}

impl StorageSchedule {
    /// A schedule that never charges or discharges.
    pub fn idle() -> Self {
        Self {
            state_of_charge: Curve::zeros(),
            load: Curve::zeros(),
        }
    }
}

/// Runs the peak-shaving optimization.
pub struct StorageAlgorithm<'a> {
    params: StorageParameters,
    lookbehind: usize,
    charge_ceiling: &'a [f64],
    discharge_ceiling: &'a [f64],

    values: Vec<f64>,
    deltas: Vec<f64>,
    state_of_charge: Vec<f64>,
}

impl<'a> StorageAlgorithm<'a> {
    /// Creates an optimization of `residual`, the hourly demand minus the
    /// production that can not be dispatched.
    ///
    /// The ceilings limit charging and discharging per frame, in MW, on top
    /// of the battery's capacities.
    pub fn new(
        residual: &[f64],
        params: StorageParameters,
        charge_ceiling: &'a [f64],
        discharge_ceiling: &'a [f64],
        lookbehind: usize,
    ) -> Self {
        let mut values = residual.to_vec();
        values.resize(FRAMES, 0.0);
        Self {
            params,
            lookbehind: lookbehind.clamp(1, FRAMES - 1),
            charge_ceiling,
            discharge_ceiling,
            values,
            deltas: vec![0.0; FRAMES],
            state_of_charge: vec![0.0; FRAMES],
        }
    }

    fn charge_headroom(&self, frame: usize) -> f64 {
        let ceiling = self.charge_ceiling.get(frame).copied().unwrap_or(f64::INFINITY);
        (self.params.input_capacity.min(ceiling) - self.deltas[frame]).max(0.0)
    }

    fn discharge_headroom(&self, frame: usize) -> f64 {
        let ceiling = self
            .discharge_ceiling
            .get(frame)
            .copied()
            .unwrap_or(f64::INFINITY);
        (self.params.output_capacity.min(ceiling) + self.deltas[frame]).max(0.0)
    }

    /// Finds the cheapest frame before `max_frame`, within the lookbehind
    /// window, where energy can be charged and stored until `max_frame`.
    ///
    /// Returns the frame and the volume that is free over the whole interval.
    fn min_frame(&self, max_frame: usize) -> Option<(usize, f64)> {
        let max_value = self.values[max_frame];
        let threshold = max_value - (1.0 - MIN_FRAME_THRESHOLD) * max_value.abs();
        let mut interval_peak = 0.0_f64;
        let mut best: Option<(usize, f64)> = None;

        for distance in 1..=self.lookbehind {
            let frame = (max_frame + FRAMES - distance) % FRAMES;
            interval_peak = interval_peak.max(self.state_of_charge[frame]);
            let spare = self.params.volume - interval_peak;
            if spare <= EPSILON {
                // Intervals further back include the full frame too.
                break;
            }
            let value = self.values[frame];
            if value >= threshold || self.charge_headroom(frame) <= EPSILON {
                continue;
            }
            if best.map_or(true, |(b, _)| value < self.values[b]) {
                best = Some((frame, spare));
            }
        }

        best
    }

    /// Moves `amount` from `min_frame` to `max_frame`.
    fn shift(&mut self, min_frame: usize, max_frame: usize, amount: f64) {
        self.values[min_frame] += amount;
        self.values[max_frame] -= amount;
        self.deltas[min_frame] += amount;
        self.deltas[max_frame] -= amount;

        let mut frame = min_frame;
        while frame != max_frame {
            self.state_of_charge[frame] += amount;
            frame = (frame + 1) % FRAMES;
        }
    }

    /// Runs the optimization and returns the battery's schedule.
    pub fn run(mut self) -> StorageSchedule {
        if !self.params.is_usable() {
            return StorageSchedule::idle();
        }

        let mut heap = (0..FRAMES)
            .filter(|frame| self.discharge_headroom(*frame) > EPSILON)
            .map(|frame| (OrderedFloat(self.values[frame]), frame))
            .collect::<BinaryHeap<_>>();
        let mut iterations = 0;
        let mut moves = 0;

        while let Some((OrderedFloat(value), max_frame)) = heap.pop() {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                warn!(
                    "Storage optimization stopped after {} iterations without converging.",
                    MAX_ITERATIONS
                );
                break;
            }
            // Stale entry: a newer one was pushed when the value changed.
            if value != self.values[max_frame] {
                continue;
            }
            let discharge = self.discharge_headroom(max_frame);
            if discharge <= EPSILON {
                continue;
            }
            let Some((min_frame, spare)) = self.min_frame(max_frame) else {
                continue;
            };

            let gap = self.values[max_frame] - self.values[min_frame];
            let amount = (gap / 4.0)
                .min(spare)
                .min(self.charge_headroom(min_frame))
                .min(discharge);
            if amount <= EPSILON {
                continue;
            }

            self.shift(min_frame, max_frame, amount);
            moves += 1;
            for frame in [max_frame, min_frame] {
                if self.discharge_headroom(frame) > EPSILON {
                    heap.push((OrderedFloat(self.values[frame]), frame));
                }
            }
        }

        debug!(
            "Storage optimization finished after {} moves, peak charge {:.3} of {:.3} MWh.",
            moves,
            self.state_of_charge.iter().copied().fold(0.0, f64::max),
            self.params.volume
        );
        self.schedule()
    }

    fn schedule(&self) -> StorageSchedule {
        let soc = &self.state_of_charge;
        let load = Curve::from_fn(|frame| {
            let previous = soc[(frame + FRAMES - 1) % FRAMES];
            let delta = soc[frame] - previous;
            if delta > 0.0 {
                if self.params.input_efficiency > 0.0 {
                    delta / self.params.input_efficiency
                } else {
                    0.0
                }
            } else {
                delta * self.params.output_efficiency
            }
        });

        StorageSchedule {
            state_of_charge: Curve::from_fn(|frame| soc[frame]),
            load,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::storage_optimization::DEFAULT_LOOKBEHIND;

    fn params(capacity: f64, volume: f64) -> StorageParameters {
        StorageParameters {
            input_capacity: capacity,
            output_capacity: capacity,
            volume,
            input_efficiency: 1.0,
            output_efficiency: 1.0,
        }
    }

    fn run(residual: &[f64], params: StorageParameters) -> StorageSchedule {
        let unlimited = vec![f64::INFINITY; FRAMES];
        StorageAlgorithm::new(residual, params, &unlimited, &unlimited, DEFAULT_LOOKBEHIND).run()
    }

    /// A daily pattern: 10 MW at night, 30 MW from 18:00 to 21:00.
    fn evening_peaks() -> Vec<f64> {
        (0..FRAMES)
            .map(|frame| if (18..21).contains(&(frame % 24)) { 30.0 } else { 10.0 })
            .collect()
    }

    #[test]
    fn test_flat_residual() {
        let schedule = run(&[100.0; FRAMES], params(10.0, 100.0));
        assert_eq!(schedule, StorageSchedule::idle());

        let schedule = run(&[0.0; FRAMES], params(10.0, 100.0));
        assert_eq!(schedule, StorageSchedule::idle());
    }

    #[test]
    fn test_unusable_battery() {
        let schedule = run(&evening_peaks(), params(10.0, 0.0));
        assert_eq!(schedule, StorageSchedule::idle());
        let schedule = run(&evening_peaks(), params(0.0, 10.0));
        assert_eq!(schedule, StorageSchedule::idle());
    }

    #[test]
    fn test_peak_shaving() {
        let residual = evening_peaks();
        let schedule = run(&residual, params(5.0, 20.0));

        // The battery discharges in the evening and charges before.
        let evening = schedule.load.get(24 * 100 + 19);
        assert!(evening < -1.0, "evening load {}", evening);
        let charged: f64 = (0..18).map(|h| schedule.load.get(24 * 100 + h)).sum();
        assert!(charged > 1.0, "charged {}", charged);

        // The peak is lower, and no frame gets pushed above the old peak.
        let shaved = (0..FRAMES)
            .map(|frame| residual[frame] + schedule.load.get(frame))
            .fold(f64::MIN, f64::max);
        assert!(shaved < 30.0 - 1.0);

        // Energy is conserved with lossless conversion.
        assert!(schedule.load.sum().abs() < 1e-6);
    }

    #[test]
    fn test_efficiency_scales_load() {
        let residual = evening_peaks();
        let mut lossy = params(5.0, 20.0);
        lossy.input_efficiency = 0.8;
        lossy.output_efficiency = 0.5;
        let schedule = run(&residual, lossy);

        let drawn: f64 = schedule.load.iter().filter(|l| **l > 0.0).sum();
        let returned: f64 = -schedule.load.iter().filter(|l| **l < 0.0).sum::<f64>();
        assert!(drawn > 0.0);
        assert!((returned - drawn * 0.8 * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_year_end_wrap() {
        // The peak is in the first hour, the cheap hours are the last hours
        // of the previous year.
        let mut residual = vec![10.0; FRAMES];
        residual[0] = 50.0;
        for value in residual.iter_mut().skip(FRAMES - 5) {
            *value = 0.0;
        }
        let schedule = run(&residual, params(10.0, 30.0));

        assert!(schedule.load.get(0) < 0.0);
        assert!(schedule.load.get(FRAMES - 1) > 0.0);
        assert!(schedule.state_of_charge.get(FRAMES - 1) > 0.0);
    }

    #[test]
    fn test_ceilings() {
        let residual = evening_peaks();
        let unlimited = vec![f64::INFINITY; FRAMES];
        let no_discharge = vec![0.0; FRAMES];
        let schedule = StorageAlgorithm::new(
            &residual,
            params(5.0, 20.0),
            &unlimited,
            &no_discharge,
            DEFAULT_LOOKBEHIND,
        )
        .run();
        assert_eq!(schedule, StorageSchedule::idle());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn state_of_charge_within_volume(
            pattern in proptest::collection::vec(0.0..100.0_f64, 24),
            capacity in 0.5..20.0_f64,
            volume in 0.5..80.0_f64,
        ) {
            let residual = (0..FRAMES).map(|frame| pattern[frame % 24]).collect::<Vec<_>>();
            let schedule = run(&residual, params(capacity, volume));

            prop_assert_eq!(schedule.state_of_charge.len(), FRAMES);
            for soc in schedule.state_of_charge.iter() {
                prop_assert!(*soc >= -1e-9);
                prop_assert!(*soc <= volume + 1e-9);
            }
            for load in schedule.load.iter() {
                prop_assert!(load.abs() <= capacity + 1e-9);
            }
        }
    }
}
