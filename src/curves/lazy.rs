// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Curves whose frames are computed on first read.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Curve, FRAMES};
use crate::Error;

/// A curve whose values are computed frame by frame, on first read.
///
/// Each frame is computed at most once: the generator's result is cached and
/// returned on every later read of the same frame.  Generators may read other
/// lazy curves, including earlier frames of curves that are still being
/// filled, which is how curves referring to another calculation's output are
/// expressed.
pub struct LazyCurve {
    values: RefCell<Vec<Option<f64>>>,
    generator: Box<dyn Fn(usize) -> f64>,
}

impl LazyCurve {
    /// Creates a lazy curve computing frame values with `generator`.
    pub fn new(generator: impl Fn(usize) -> f64 + 'static) -> Self {
        Self {
            values: RefCell::new(vec![None; FRAMES]),
            generator: Box::new(generator),
        }
    }

    /// Returns the value at `frame`, computing and caching it if needed.
    ///
    /// Frames outside the year are 0.0.
    pub fn get(&self, frame: usize) -> f64 {
        if frame >= FRAMES {
            return 0.0;
        }
        if let Some(value) = self.values.borrow()[frame] {
            return value;
        }
        // The borrow is released before calling the generator, which may read
        // other frames of this curve.
        let value = (self.generator)(frame);
        self.values.borrow_mut()[frame] = Some(value);
        value
    }

    /// Returns true if the value at `frame` has already been computed.
    pub fn is_computed(&self, frame: usize) -> bool {
        self.values
            .borrow()
            .get(frame)
            .is_some_and(|value| value.is_some())
    }

    /// Computes all remaining frames and returns the materialized curve.
    pub fn to_curve(&self) -> Curve {
        Curve::from_fn(|frame| self.get(frame))
    }

    /// Lazy curves cannot be rotated: frame 0 must stay aligned with the
    /// start of the calculation while frames are still being discovered.
    pub fn rotate(&self, _frames: usize) -> Result<Curve, Error> {
        Err(Error::invalid_curve("Lazy curves cannot be rotated."))
    }
}

impl std::fmt::Debug for LazyCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let computed = self.values.borrow().iter().filter(|v| v.is_some()).count();
        write!(f, "LazyCurve {{ computed: {} }}", computed)
    }
}

/// Either a materialized or a lazy curve.
///
/// Cloning is cheap; clones share the same underlying curve.
#[derive(Clone, Debug)]
pub enum CurveSource {
    Fixed(Rc<Curve>),
    Lazy(Rc<LazyCurve>),
}

impl CurveSource {
    /// Returns the value at the given frame.
    pub fn get(&self, frame: usize) -> f64 {
        match self {
            CurveSource::Fixed(curve) => curve.get(frame),
            CurveSource::Lazy(curve) => curve.get(frame),
        }
    }

    /// Returns true if values are computed on first read rather than fixed
    /// up front.
    pub fn is_lazy(&self) -> bool {
        matches!(self, CurveSource::Lazy(_))
    }

    /// Returns the materialized curve, computing all lazy frames.
    pub fn to_curve(&self) -> Curve {
        match self {
            CurveSource::Fixed(curve) => curve.as_ref().clone(),
            CurveSource::Lazy(curve) => curve.to_curve(),
        }
    }
}

impl From<Curve> for CurveSource {
    fn from(curve: Curve) -> Self {
        CurveSource::Fixed(Rc::new(curve))
    }
}

impl From<LazyCurve> for CurveSource {
    fn from(curve: LazyCurve) -> Self {
        CurveSource::Lazy(Rc::new(curve))
    }
}
