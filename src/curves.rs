// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Annual hourly curves and the library that loads them by name.
//!
//! A curve always has exactly [`FRAMES`] entries, one for each hour of the
//! year.  Curves are either materialized ([`Curve`]) or computed lazily, frame
//! by frame ([`LazyCurve`]); [`CurveSource`] lets participants hold either.

mod aggregate;
mod amplify;
mod curve;
mod lazy;
mod library;

pub use aggregate::AggregateCurve;
pub use amplify::amplify_curve;
pub use curve::{Curve, FRAMES};
pub use lazy::{CurveSource, LazyCurve};
pub use library::{CurveLibrary, CurveSet, DynamicCurve};
