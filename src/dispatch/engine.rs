// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The interface to the engine clearing the hourly dispatch of one carrier.

use std::fmt::Display;
use std::rc::Rc;

use super::Participant;
use crate::{Carrier, Error};

/// How the members of a flex group divide the energy available to the group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupBehavior {
    /// Members are served one after another, by price.
    #[default]
    MeritOrder,
    /// Members are served at the same time, in proportion to their capacity.
    Share,
}

impl Display for GroupBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupBehavior::MeritOrder => write!(f, "merit_order"),
            GroupBehavior::Share => write!(f, "share"),
        }
    }
}

/// A named group of flex participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlexGroup {
    pub key: String,
    pub behavior: GroupBehavior,
}

impl FlexGroup {
    pub fn new(key: impl Into<String>, behavior: GroupBehavior) -> Self {
        Self {
            key: key.into(),
            behavior,
        }
    }
}

/// The roster of one carrier's dispatch.
///
/// After a frame is calculated, the load curve of every participant holds
/// its final load for that frame.
pub trait DispatchOrder {
    /// Adds a participant to the roster.
    fn add(&mut self, participant: Rc<Participant>) -> Result<(), Error>;

    /// Declares a flex group.  Must be called before participants of the
    /// group are added.
    fn add_flex_group(&mut self, group: FlexGroup) -> Result<(), Error>;

    /// Clears the given frame.  Frames are calculated in ascending order.
    fn calculate_frame(&mut self, frame: usize) -> Result<(), Error>;

    /// The participants in the roster, in the order they were added.
    fn participants(&self) -> Vec<Rc<Participant>>;
}

/// Creates dispatch orders.
pub trait DispatchEngine {
    fn order(&self, carrier: Carrier) -> Box<dyn DispatchOrder>;
}
