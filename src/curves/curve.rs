// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The materialized [`Curve`] type.

use crate::Error;

/// The number of hourly frames in a year.
pub const FRAMES: usize = 8760;

/// A materialized annual curve with exactly [`FRAMES`] values, usually in MW.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve(Vec<f64>);

impl Curve {
    /// Returns a curve with all values set to zero.
    pub fn zeros() -> Self {
        Self(vec![0.0; FRAMES])
    }

    /// Returns a curve with all values set to `value`.
    pub fn flat(value: f64) -> Self {
        Self(vec![value; FRAMES])
    }

    /// Builds a curve by evaluating `f` for every frame.
    pub fn from_fn(f: impl FnMut(usize) -> f64) -> Self {
        Self((0..FRAMES).map(f).collect())
    }

    /// Creates a curve from the given values.
    ///
    /// Returns an error if there are not exactly [`FRAMES`] values.
    pub fn try_from_vec(values: Vec<f64>) -> Result<Self, Error> {
        if values.len() != FRAMES {
            return Err(Error::invalid_curve(format!(
                "A curve must have {} values, got {}.",
                FRAMES,
                values.len()
            )));
        }
        Ok(Self(values))
    }

    /// Returns the value at the given frame, or 0.0 outside the year.
    pub fn get(&self, frame: usize) -> f64 {
        self.0.get(frame).copied().unwrap_or(0.0)
    }

    /// Returns the number of frames, which is always [`FRAMES`].
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a curve is never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values, frame by frame.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Iterates over the values in frame order.
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Consumes the curve and returns its values.
    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// The sum of all values, e.g. the annual energy in MWh of a curve in MW.
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Returns the largest value, or 0.0 for a curve without positive values.
    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    /// Returns the curve's full-load hours: its sum divided by its peak.
    ///
    /// A curve without a positive peak has zero full-load hours.
    pub fn full_load_hours(&self) -> f64 {
        let peak = self.max();
        if peak > 0.0 {
            self.sum() / peak
        } else {
            0.0
        }
    }

    /// Returns a copy with every value multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    /// Returns a copy scaled so that the values sum to `total`.
    ///
    /// A curve summing to zero stays all zeros.
    pub fn normalized_to(&self, total: f64) -> Self {
        let sum = self.sum();
        if sum > 0.0 {
            self.scale(total / sum)
        } else {
            Self::zeros()
        }
    }

    /// Returns a copy with `f` applied to every value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|v| f(*v)).collect())
    }

    /// Returns the frame-by-frame combination of two curves.
    pub fn zip_with(&self, other: &Curve, f: impl Fn(f64, f64) -> f64) -> Self {
        Self(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        )
    }

    /// Adds `other` to this curve in place.
    pub fn add_assign(&mut self, other: &Curve) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }

    /// Replaces the value at the given frame.  Frames outside the year are
    /// ignored.
    pub fn set(&mut self, frame: usize, value: f64) {
        if let Some(slot) = self.0.get_mut(frame) {
            *slot = value;
        }
    }

    /// Returns a copy rotated left by `frames`, so that frame `frames` becomes
    /// frame 0.
    pub fn rotate(&self, frames: usize) -> Self {
        let mut values = self.0.clone();
        values.rotate_left(frames % FRAMES);
        Self(values)
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::zeros()
    }
}

impl std::ops::Index<usize> for Curve {
    type Output = f64;

    fn index(&self, frame: usize) -> &f64 {
        &self.0[frame]
    }
}
