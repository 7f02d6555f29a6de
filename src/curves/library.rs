// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Loading curves by name.

use std::collections::{BTreeMap, HashMap};

use super::{amplify_curve, AggregateCurve, Curve};
use crate::{Error, GraphNode};

const DYNAMIC_PREFIX: &str = "dynamic:";

/// A curve computed from configuration rather than loaded from a dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum DynamicCurve {
    /// A weighted mix of other curves, by name.
    Mix(BTreeMap<String, f64>),
    /// A curve flattened until it reaches the full-load hours of the node
    /// requesting it.
    Amplify { curve: String },
}

/// A family of curves with several variants, one of which is selected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveSet {
    pub selected: String,
    pub variants: HashMap<String, HashMap<String, Curve>>,
}

/// Named curves available to a dispatch pass.
#[derive(Clone, Debug, Default)]
pub struct CurveLibrary {
    profiles: HashMap<String, Curve>,
    custom: HashMap<String, Curve>,
    sets: HashMap<String, CurveSet>,
    dynamic: HashMap<String, DynamicCurve>,
}

impl CurveLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dataset load profile.
    pub fn with_profile(mut self, name: impl Into<String>, curve: Curve) -> Self {
        self.profiles.insert(name.into(), curve);
        self
    }

    /// Attaches a custom curve, which takes the place of the dataset profile
    /// of the same name.
    pub fn with_custom_curve(mut self, name: impl Into<String>, curve: Curve) -> Self {
        self.custom.insert(name.into(), curve);
        self
    }

    /// Adds a curve set, addressed as `set/curve`.
    pub fn with_curve_set(mut self, name: impl Into<String>, set: CurveSet) -> Self {
        self.sets.insert(name.into(), set);
        self
    }

    /// Adds a dynamic curve, addressed as `dynamic:name`.
    pub fn with_dynamic_curve(mut self, name: impl Into<String>, curve: DynamicCurve) -> Self {
        self.dynamic.insert(name.into(), curve);
        self
    }

    /// Returns the curve with the given name.
    ///
    /// - `dynamic:<name>` computes a configured mix or amplified curve.
    ///   Amplified curves need the node they are requested for.
    /// - A custom curve attached under the name replaces the named profile.
    /// - `<set>/<name>` reads the curve from the set's selected variant.
    /// - Anything else is a dataset load profile.
    pub fn curve(&self, name: &str, node: Option<&GraphNode>) -> Result<Curve, Error> {
        if let Some(dynamic) = name.strip_prefix(DYNAMIC_PREFIX) {
            return self.dynamic_curve(name, dynamic.trim(), node);
        }
        if let Some(curve) = self.custom.get(name) {
            return Ok(curve.clone());
        }
        if let Some((set, curve)) = name.split_once('/') {
            return self.set_curve(set, curve);
        }
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::curve_not_found(format!("Curve `{}` not found.", name)))
    }

    fn dynamic_curve(
        &self,
        full_name: &str,
        name: &str,
        node: Option<&GraphNode>,
    ) -> Result<Curve, Error> {
        match self.dynamic.get(name) {
            Some(DynamicCurve::Mix(mix)) => {
                let curves = mix
                    .iter()
                    .map(|(curve, share)| Ok((self.curve(curve, node)?, *share)))
                    .collect::<Result<Vec<_>, Error>>()?;
                Ok(AggregateCurve::build(
                    curves.iter().map(|(curve, share)| (curve, *share)),
                ))
            }
            Some(DynamicCurve::Amplify { curve }) => {
                let Some(node) = node else {
                    return Err(Error::invalid_curve(format!(
                        "Curve `{}` can only be amplified for a node.",
                        full_name
                    )));
                };
                Ok(amplify_curve(
                    &self.curve(curve, Some(node))?,
                    node.full_load_hours,
                ))
            }
            None => Err(Error::curve_not_found(format!(
                "Dynamic curve `{}` not found.",
                full_name
            ))),
        }
    }

    fn set_curve(&self, set_name: &str, curve: &str) -> Result<Curve, Error> {
        let set = self.sets.get(set_name).ok_or_else(|| {
            Error::curve_not_found(format!("Curve set `{}` not found.", set_name))
        })?;
        set.variants
            .get(&set.selected)
            .ok_or_else(|| {
                Error::curve_not_found(format!(
                    "Curve set `{}` has no variant `{}`.",
                    set_name, set.selected
                ))
            })?
            .get(curve)
            .cloned()
            .ok_or_else(|| {
                Error::curve_not_found(format!(
                    "Curve `{}` not found in variant `{}` of curve set `{}`.",
                    curve, set.selected, set_name
                ))
            })
    }
}
