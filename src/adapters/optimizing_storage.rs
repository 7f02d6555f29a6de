// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Batteries scheduled ahead of the dispatch, by flattening the residual
//! load of their sector.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::dispatch::{CurveResolver, Participant, ParticipantKind};
use crate::graph::{CurveSlot, SlotWriter};
use crate::storage_optimization::{StorageParameters, StorageSchedule};
use crate::{EnergyGraph, Error};

use super::{inject_results, AdapterBase, Behavior};

const DEFAULT_SECTOR: &str = "default";

/// A storage that follows a precomputed schedule instead of being cleared
/// by the dispatch engine.
///
/// The schedule is assigned by the manager before participants are built.
/// The storage takes part as a single scheduled participant whose signed
/// load covers both charging and discharging, rather than as a pair of a
/// consumer and a producer.
pub struct OptimizingStorage {
    base: AdapterBase,
    schedule: OnceCell<StorageSchedule>,
}

impl OptimizingStorage {
    pub(super) fn new(base: AdapterBase) -> Self {
        Self {
            base,
            schedule: OnceCell::new(),
        }
    }

    pub(crate) fn key(&self) -> &str {
        self.base.key()
    }

    /// The sector whose batteries are optimized together.
    pub(crate) fn sector(&self) -> &str {
        self.base.config().group.as_deref().unwrap_or(DEFAULT_SECTOR)
    }

    pub(crate) fn params(&self) -> StorageParameters {
        StorageParameters {
            input_capacity: self.base.input_capacity(),
            output_capacity: self.base.output_capacity(),
            volume: self.base.volume().unwrap_or(0.0),
            input_efficiency: 1.0,
            output_efficiency: self.base.output_efficiency(),
        }
    }

    pub(crate) fn assign_schedule(&self, schedule: StorageSchedule) -> Result<(), Error> {
        self.schedule.set(schedule).map_err(|_| {
            Error::invalid_state(format!(
                "Optimizing storage {} was already scheduled for the {} dispatch.",
                self.base.key(),
                self.base.carrier()
            ))
        })
    }

    fn schedule(&self) -> Result<&StorageSchedule, Error> {
        self.schedule.get().ok_or_else(|| {
            Error::internal(format!(
                "Optimizing storage {} has no schedule for the {} dispatch.",
                self.base.key(),
                self.base.carrier()
            ))
        })
    }
}

impl Behavior for OptimizingStorage {
    fn base(&self) -> &AdapterBase {
        &self.base
    }

    fn installed(&self) -> bool {
        self.base.default_installed() && self.base.volume().is_some_and(|volume| volume > 0.0)
    }

    fn participants(
        &self,
        _graph: &EnergyGraph,
        _resolver: &CurveResolver<'_>,
    ) -> Result<Vec<Participant>, Error> {
        // Charging is consumption, which participants see as negative load.
        let load = self.schedule()?.load.scale(-1.0);
        Ok(vec![Participant::new(
            self.base.key(),
            ParticipantKind::Scheduled { load: load.into() },
            self.base.loads().output.clone(),
        )])
    }

    fn inject(
        &self,
        writer: &mut SlotWriter<'_>,
        participants: &[Rc<Participant>],
    ) -> Result<(), Error> {
        inject_results(&self.base, writer, participants)?;
        writer.set_curve(
            CurveSlot::Storage(self.base.carrier()),
            self.schedule()?.state_of_charge.clone(),
        )
    }
}
