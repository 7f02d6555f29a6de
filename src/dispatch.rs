// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The dispatch engine interface, the participants handed to it, and the
//! per-carrier context and curve resolution used to build them.

mod context;
mod engine;
mod merit;
mod participant;
mod resolvers;

pub use context::{Context, Sorter};
pub use engine::{DispatchEngine, DispatchOrder, FlexGroup, GroupBehavior};
pub use merit::{MeritEngine, MeritOrder};
pub use participant::{FlexRole, Hourly, LoadCurve, Participant, ParticipantKind, Reserve};
pub use resolvers::{CalculationOrder, CurveReference, CurveResolver, FrameOffset};
