// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Participants: the records handed to a dispatch engine for each
//! technology, and the load curves the engine writes back into.

use std::cell::RefCell;
use std::rc::Rc;

use crate::curves::{Curve, CurveSource, FRAMES};

/// A shared, signed hourly load curve in MW.
///
/// Positive values are production, negative values consumption.  Adapters
/// create their load curves at setup, so that curves of other calculations
/// can refer to them before the participants exist.  Clones share the same
/// underlying values.
#[derive(Clone, Debug)]
pub struct LoadCurve(Rc<RefCell<Vec<f64>>>);

impl LoadCurve {
    /// Creates a load curve with all frames at zero.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(vec![0.0; FRAMES])))
    }

    /// Returns the load at the given frame, or 0.0 outside the year.
    pub fn get(&self, frame: usize) -> f64 {
        self.0.borrow().get(frame).copied().unwrap_or(0.0)
    }

    /// Replaces the load at the given frame.
    pub fn set(&self, frame: usize, value: f64) {
        if let Some(slot) = self.0.borrow_mut().get_mut(frame) {
            *slot = value;
        }
    }

    /// Adds to the load at the given frame.
    pub fn add(&self, frame: usize, value: f64) {
        if let Some(slot) = self.0.borrow_mut().get_mut(frame) {
            *slot += value;
        }
    }

    /// Returns true if both handles refer to the same curve.
    pub fn ptr_eq(&self, other: &LoadCurve) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The positive part of the curve.
    pub fn production_curve(&self) -> Curve {
        Curve::from_fn(|frame| self.get(frame).max(0.0))
    }

    /// The negative part of the curve, as positive values.
    pub fn consumption_curve(&self) -> Curve {
        Curve::from_fn(|frame| (-self.get(frame)).max(0.0))
    }

    pub fn to_curve(&self) -> Curve {
        Curve::from_fn(|frame| self.get(frame))
    }
}

impl Default for LoadCurve {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that is either constant over the year or varies by hour.
#[derive(Clone, Debug)]
pub enum Hourly {
    Constant(f64),
    Curve(CurveSource),
}

impl Hourly {
    pub fn at(&self, frame: usize) -> f64 {
        match self {
            Hourly::Constant(value) => *value,
            Hourly::Curve(curve) => curve.get(frame),
        }
    }

    /// The constant value, or the mean over the year for curves.
    pub fn mean(&self) -> f64 {
        match self {
            Hourly::Constant(value) => *value,
            Hourly::Curve(curve) => curve.to_curve().sum() / FRAMES as f64,
        }
    }

    /// The constant value, or the peak for curves.
    pub fn peak(&self) -> f64 {
        match self {
            Hourly::Constant(value) => *value,
            Hourly::Curve(curve) => curve.to_curve().max(),
        }
    }
}

impl From<f64> for Hourly {
    fn from(value: f64) -> Self {
        Hourly::Constant(value)
    }
}

#[derive(Debug)]
struct ReserveState {
    volume: f64,
    decay: f64,
    level: f64,
    frame: Option<usize>,
    drained: Option<usize>,
    levels: Vec<f64>,
}

/// Energy held between frames by a storage-like technology, in MWh.
///
/// Several participants may share one reserve; a transformation fills it
/// through one participant and drains it through another.  Decay is applied
/// once, when the reserve first enters a frame.
#[derive(Clone, Debug)]
pub struct Reserve(Rc<RefCell<ReserveState>>);

impl Reserve {
    /// Creates an empty reserve.  `decay` is the share of the stored energy
    /// lost every hour.
    pub fn new(volume: f64, decay: f64) -> Self {
        Self(Rc::new(RefCell::new(ReserveState {
            volume: volume.max(0.0),
            decay: decay.clamp(0.0, 1.0),
            level: 0.0,
            frame: None,
            drained: None,
            levels: vec![0.0; FRAMES],
        })))
    }

    pub fn volume(&self) -> f64 {
        self.0.borrow().volume
    }

    /// Moves the reserve to `frame`, applying decay if it was in an earlier
    /// frame.
    pub fn enter(&self, frame: usize) {
        let mut state = self.0.borrow_mut();
        if state.frame == Some(frame) {
            return;
        }
        if state.frame.is_some() {
            state.level *= 1.0 - state.decay;
        }
        state.frame = Some(frame);
        let level = state.level;
        if let Some(slot) = state.levels.get_mut(frame) {
            *slot = level;
        }
    }

    /// The stored energy at the given frame.
    pub fn level(&self, frame: usize) -> f64 {
        self.enter(frame);
        self.0.borrow().level
    }

    /// Unused volume at the given frame.
    pub fn headroom(&self, frame: usize) -> f64 {
        self.enter(frame);
        let state = self.0.borrow();
        (state.volume - state.level).max(0.0)
    }

    /// Stores up to `amount` and returns the amount stored.
    pub fn add(&self, frame: usize, amount: f64) -> f64 {
        let stored = amount.min(self.headroom(frame)).max(0.0);
        self.update(frame, stored);
        stored
    }

    /// Takes up to `amount` and returns the amount taken.
    pub fn take(&self, frame: usize, amount: f64) -> f64 {
        let taken = amount.min(self.level(frame)).max(0.0);
        self.update(frame, -taken);
        if taken > 0.0 {
            self.0.borrow_mut().drained = Some(frame);
        }
        taken
    }

    /// Returns true if energy was taken from the reserve in the given frame.
    pub fn drained_in(&self, frame: usize) -> bool {
        self.0.borrow().drained == Some(frame)
    }

    /// The stored energy at the end of every frame.
    pub fn levels(&self) -> Curve {
        Curve::from_fn(|frame| self.0.borrow().levels[frame])
    }

    fn update(&self, frame: usize, delta: f64) {
        let mut state = self.0.borrow_mut();
        state.level += delta;
        let level = state.level;
        if let Some(slot) = state.levels.get_mut(frame) {
            *slot = level;
        }
    }
}

/// How a flexible participant interacts with the rest of the dispatch.
#[derive(Clone, Debug)]
pub enum FlexRole {
    /// Absorbs surplus energy and never produces.
    Sink,
    /// Stores surplus energy and returns it in deficit hours.
    Storage {
        reserve: Reserve,
        input_efficiency: f64,
        output_efficiency: f64,
    },
    /// Fills a reserve shared with a [`FlexRole::ReserveOutput`].
    ReserveInput { reserve: Reserve, efficiency: f64 },
    /// Drains a reserve shared with a [`FlexRole::ReserveInput`].
    ReserveOutput { reserve: Reserve },
    /// Reduces demand in deficit hours, building up a debt that is bounded by
    /// the reserve volume and, per hour, by `limit`.
    ///
    /// Never sheds in a frame in which the debt is being repaid, nor more
    /// than `recovery_capacity` can repay in the remaining frames of the year.
    Shedding {
        debt: Reserve,
        limit: CurveSource,
        recovery_capacity: f64,
    },
    /// Repays the debt built up by shedding.  Takes surplus energy when there
    /// is any, and is forced to consume when the debt is full or the year is
    /// running out (see [`Participant::forced_consumption`]).
    Recovery { debt: Reserve },
}

impl FlexRole {
    fn reserve(&self) -> Option<&Reserve> {
        match self {
            FlexRole::Sink => None,
            FlexRole::Storage { reserve, .. }
            | FlexRole::ReserveInput { reserve, .. }
            | FlexRole::ReserveOutput { reserve } => Some(reserve),
            FlexRole::Shedding { debt, .. } | FlexRole::Recovery { debt } => Some(debt),
        }
    }
}

/// The behavior of a participant.
#[derive(Clone, Debug)]
pub enum ParticipantKind {
    /// Produces along a fixed curve, whatever the demand.
    AlwaysOn {
        production: CurveSource,
        output_capacity: f64,
        marginal_costs: f64,
    },
    /// Produces on demand, up to its hourly capacity.
    Dispatchable {
        output_capacity: Hourly,
        marginal_costs: Hourly,
    },
    /// Consumes along a fixed curve.
    Consumer { demand: CurveSource },
    /// Consumes or produces depending on the balance of the other
    /// participants.
    Flex {
        role: FlexRole,
        group: Option<String>,
        input_capacity: Hourly,
        output_capacity: Hourly,
        consumption_price: Hourly,
        production_price: Hourly,
    },
    /// Follows a load curve computed ahead of the dispatch.
    Scheduled { load: CurveSource },
}

/// One technology's representation in a dispatch order.
#[derive(Debug)]
pub struct Participant {
    key: String,
    kind: ParticipantKind,
    load: LoadCurve,
}

impl Participant {
    pub fn new(key: impl Into<String>, kind: ParticipantKind, load: LoadCurve) -> Self {
        Self {
            key: key.into(),
            kind,
            load,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &ParticipantKind {
        &self.kind
    }

    /// The curve the dispatch engine writes this participant's loads into.
    pub fn load_curve(&self) -> &LoadCurve {
        &self.load
    }

    pub fn is_flex(&self) -> bool {
        matches!(self.kind, ParticipantKind::Flex { .. })
    }

    /// Annual production, in MWh.
    pub fn production(&self) -> f64 {
        (0..FRAMES).map(|f| self.load.get(f).max(0.0)).sum()
    }

    /// Annual consumption, in MWh, as a positive number.
    pub fn consumption(&self) -> f64 {
        (0..FRAMES).map(|f| (-self.load.get(f)).max(0.0)).sum()
    }

    /// The nameplate output capacity, in MW.
    pub fn output_capacity(&self) -> f64 {
        match &self.kind {
            ParticipantKind::AlwaysOn {
                output_capacity, ..
            } => *output_capacity,
            ParticipantKind::Dispatchable {
                output_capacity, ..
            }
            | ParticipantKind::Flex {
                output_capacity, ..
            } => output_capacity.peak(),
            ParticipantKind::Consumer { .. } | ParticipantKind::Scheduled { .. } => {
                self.load.production_curve().max()
            }
        }
    }

    /// Annual production divided by the output capacity.
    pub fn full_load_hours(&self) -> f64 {
        let capacity = self.output_capacity();
        if capacity > 0.0 && capacity.is_finite() {
            self.production() / capacity
        } else {
            0.0
        }
    }

    /// Costs of producing one MWh, in EUR/MWh.
    ///
    /// For hourly prices this is the production-weighted mean, or the mean
    /// price for participants that never produced.
    pub fn marginal_costs(&self) -> f64 {
        let price = match &self.kind {
            ParticipantKind::AlwaysOn { marginal_costs, .. } => return *marginal_costs,
            ParticipantKind::Dispatchable { marginal_costs, .. } => marginal_costs,
            ParticipantKind::Flex {
                production_price, ..
            } => production_price,
            ParticipantKind::Consumer { .. } | ParticipantKind::Scheduled { .. } => return 0.0,
        };
        match price {
            Hourly::Constant(value) => *value,
            Hourly::Curve(curve) => {
                let production = self.production();
                if production > 0.0 {
                    (0..FRAMES)
                        .map(|f| self.load.get(f).max(0.0) * curve.get(f))
                        .sum::<f64>()
                        / production
                } else {
                    price.mean()
                }
            }
        }
    }

    /// The stored energy at the end of every frame, for participants with a
    /// reserve.
    pub fn reserve_levels(&self) -> Option<Curve> {
        match &self.kind {
            ParticipantKind::Flex { role, .. } => role.reserve().map(Reserve::levels),
            _ => None,
        }
    }

    /// Prepares the participant for clearing the given frame.
    pub fn enter_frame(&self, frame: usize) {
        if let ParticipantKind::Flex { role, .. } = &self.kind {
            if let Some(reserve) = role.reserve() {
                reserve.enter(frame);
            }
        }
    }

    /// The most the participant can consume in the given frame, in MW.
    pub fn input_headroom(&self, frame: usize) -> f64 {
        let ParticipantKind::Flex {
            role,
            input_capacity,
            ..
        } = &self.kind
        else {
            return 0.0;
        };
        let capacity = (input_capacity.at(frame) + self.load.get(frame).min(0.0)).max(0.0);
        match role {
            FlexRole::Sink => capacity,
            FlexRole::Storage {
                reserve,
                input_efficiency,
                ..
            }
            | FlexRole::ReserveInput {
                reserve,
                efficiency: input_efficiency,
            } => {
                if *input_efficiency > 0.0 {
                    capacity.min(reserve.headroom(frame) / input_efficiency)
                } else {
                    capacity
                }
            }
            FlexRole::Recovery { debt } => capacity.min(debt.level(frame)),
            FlexRole::ReserveOutput { .. } | FlexRole::Shedding { .. } => 0.0,
        }
    }

    /// The most the participant can produce in the given frame, in MW.
    pub fn output_headroom(&self, frame: usize) -> f64 {
        let already = self.load.get(frame).max(0.0);
        match &self.kind {
            ParticipantKind::Dispatchable {
                output_capacity, ..
            } => (output_capacity.at(frame) - already).max(0.0),
            ParticipantKind::Flex {
                role,
                output_capacity,
                ..
            } => {
                let capacity = (output_capacity.at(frame) - already).max(0.0);
                match role {
                    FlexRole::Storage {
                        reserve,
                        output_efficiency,
                        ..
                    } => capacity.min(reserve.level(frame) * output_efficiency),
                    FlexRole::ReserveOutput { reserve } => capacity.min(reserve.level(frame)),
                    FlexRole::Shedding {
                        debt,
                        limit,
                        recovery_capacity,
                    } => {
                        if debt.drained_in(frame) {
                            return 0.0;
                        }
                        let remaining = FRAMES.saturating_sub(frame + 1) as f64;
                        let repayable = recovery_capacity * remaining - debt.level(frame);
                        capacity
                            .min(limit.get(frame) - already)
                            .min(debt.headroom(frame))
                            .min(repayable)
                            .max(0.0)
                    }
                    FlexRole::Sink | FlexRole::ReserveInput { .. } | FlexRole::Recovery { .. } => {
                        0.0
                    }
                }
            }
            _ => 0.0,
        }
    }

    /// The consumption a recovery participant must take on in the given frame,
    /// whatever the balance, in MW.
    ///
    /// A full debt is repaid at full capacity.  Otherwise only what can no
    /// longer be repaid in the remaining frames is due, so that the debt is
    /// zero at the end of the year.  Zero for all other participants.
    pub fn forced_consumption(&self, frame: usize) -> f64 {
        let ParticipantKind::Flex {
            role: FlexRole::Recovery { debt },
            input_capacity,
            ..
        } = &self.kind
        else {
            return 0.0;
        };
        let capacity = input_capacity.at(frame);
        let level = debt.level(frame);
        let due = if debt.headroom(frame) <= 1e-9 {
            capacity
        } else {
            level - capacity * FRAMES.saturating_sub(frame + 1) as f64
        };
        due.min(level).min(self.input_headroom(frame)).max(0.0)
    }

    /// Consumes `amount` MW in the given frame, up to the input headroom, and
    /// returns the amount consumed.
    pub fn consume(&self, frame: usize, amount: f64) -> f64 {
        let amount = amount.min(self.input_headroom(frame)).max(0.0);
        if amount <= 0.0 {
            return 0.0;
        }
        if let ParticipantKind::Flex { role, .. } = &self.kind {
            match role {
                FlexRole::Storage {
                    reserve,
                    input_efficiency,
                    ..
                }
                | FlexRole::ReserveInput {
                    reserve,
                    efficiency: input_efficiency,
                } => {
                    reserve.add(frame, amount * input_efficiency);
                }
                FlexRole::Recovery { debt } => {
                    debt.take(frame, amount);
                }
                _ => {}
            }
        }
        self.load.add(frame, -amount);
        amount
    }

    /// Produces `amount` MW in the given frame, up to the output headroom,
    /// and returns the amount produced.
    pub fn produce(&self, frame: usize, amount: f64) -> f64 {
        let amount = amount.min(self.output_headroom(frame)).max(0.0);
        if amount <= 0.0 {
            return 0.0;
        }
        if let ParticipantKind::Flex { role, .. } = &self.kind {
            match role {
                FlexRole::Storage {
                    reserve,
                    output_efficiency,
                    ..
                } => {
                    if *output_efficiency > 0.0 {
                        reserve.take(frame, amount / output_efficiency);
                    }
                }
                FlexRole::ReserveOutput { reserve } => {
                    reserve.take(frame, amount);
                }
                FlexRole::Shedding { debt, .. } => {
                    debt.add(frame, amount);
                }
                _ => {}
            }
        }
        self.load.add(frame, amount);
        amount
    }
}
