// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Resolution of curve names, including references to the output of other
//! dispatch calculations.
//!
//! A profile name may refer to the load of an adapter in another (or the
//! same) calculation:
//!
//! - `self: <carrier>_<input|output>_curve` reads the node's own adapter in
//!   the `<carrier>` calculation, converted to the reading carrier through
//!   the node's conversions.
//! - `unmet-demand: <from>-><to>` reads the consumption of node `<from>`
//!   that is not covered by the production of node `<to>`.
//!
//! Such references become lazy curves over the adapters' load curves.  All
//! calculations advance one frame at a time, in [`CalculationOrder`]; a
//! reference to a calculation that has not yet cleared the current frame
//! reads the previous one instead ([`FrameOffset::PreviousHour`]).

use std::fmt::Display;

use tracing::debug;

use crate::adapters::AdapterLoads;
use crate::curves::{Curve, CurveLibrary, CurveSource, LazyCurve};
use crate::manager::RegistrySet;
use crate::{Carrier, Direction, Error, GraphNode};

/// A parsed profile name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurveReference {
    /// A curve of the node's adapter in another calculation.
    SelfCurve { carrier: Carrier, direction: Direction },
    /// The consumption of `from` not covered by the production of `to`.
    UnmetDemand { from: String, to: String },
    /// A curve from the [`CurveLibrary`].
    Named(String),
}

impl CurveReference {
    pub fn parse(name: &str) -> Result<Self, Error> {
        let name = name.trim();
        let invalid = || Error::unresolved_reference(format!("Invalid curve reference `{}`.", name));

        if let Some(curve) = name.strip_prefix("self:") {
            let (carrier, direction) = curve
                .trim()
                .strip_suffix("_curve")
                .and_then(|c| c.rsplit_once('_'))
                .ok_or_else(invalid)?;
            let carrier = Carrier::from_key(carrier).ok_or_else(invalid)?;
            let direction = match direction {
                "input" => Direction::Input,
                "output" => Direction::Output,
                _ => return Err(invalid()),
            };
            return Ok(CurveReference::SelfCurve { carrier, direction });
        }

        if let Some(nodes) = name.strip_prefix("unmet-demand:") {
            let (from, to) = nodes.split_once("->").ok_or_else(invalid)?;
            let (from, to) = (from.trim(), to.trim());
            if from.is_empty() || to.is_empty() {
                return Err(invalid());
            }
            return Ok(CurveReference::UnmetDemand {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(CurveReference::Named(name.to_string()))
    }
}

impl Display for CurveReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurveReference::SelfCurve { carrier, direction } => {
                write!(f, "self: {}_{}_curve", carrier, direction)
            }
            CurveReference::UnmetDemand { from, to } => write!(f, "unmet-demand: {}->{}", from, to),
            CurveReference::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Which frame of a referenced calculation a reading calculation sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOffset {
    /// The referenced calculation has cleared the frame already.
    SameHour,
    /// The referenced calculation clears the frame later; frame `f` reads
    /// frame `f - 1`, and frame 0 reads nothing.
    PreviousHour,
}

impl FrameOffset {
    /// The frame to read when calculating `frame`, if any.
    pub fn source_frame(self, frame: usize) -> Option<usize> {
        match self {
            FrameOffset::SameHour => Some(frame),
            FrameOffset::PreviousHour => frame.checked_sub(1),
        }
    }
}

/// The order in which the calculations of one pass clear each frame.
///
/// The heat networks come first, from the highest temperature down, then
/// agriculture heat, electricity, and finally the reconciliation carriers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalculationOrder(Vec<Carrier>);

impl CalculationOrder {
    pub fn new(reconciliation_carriers: &[Carrier]) -> Self {
        let mut order = vec![
            Carrier::HtHeat,
            Carrier::MtHeat,
            Carrier::LtHeat,
            Carrier::AgricultureHeat,
            Carrier::Electricity,
        ];
        for carrier in reconciliation_carriers {
            if !order.contains(carrier) {
                order.push(*carrier);
            }
        }
        Self(order)
    }

    pub fn carriers(&self) -> &[Carrier] {
        &self.0
    }

    pub fn position(&self, carrier: Carrier) -> Option<usize> {
        self.0.iter().position(|c| *c == carrier)
    }

    /// The offset with which a `reader` calculation sees `source`.
    ///
    /// Only calculations that come strictly earlier are read in the same
    /// hour.
    pub fn offset(&self, reader: Carrier, source: Carrier) -> FrameOffset {
        match (self.position(reader), self.position(source)) {
            (Some(reader), Some(source)) if source < reader => FrameOffset::SameHour,
            _ => FrameOffset::PreviousHour,
        }
    }
}

impl Default for CalculationOrder {
    fn default() -> Self {
        Self::new(&[Carrier::Hydrogen])
    }
}

/// Resolves profile names for the adapters of one calculation.
pub struct CurveResolver<'a> {
    carrier: Carrier,
    library: &'a CurveLibrary,
    registries: &'a RegistrySet,
    order: &'a CalculationOrder,
}

impl<'a> CurveResolver<'a> {
    pub fn new(
        carrier: Carrier,
        library: &'a CurveLibrary,
        registries: &'a RegistrySet,
        order: &'a CalculationOrder,
    ) -> Self {
        Self {
            carrier,
            library,
            registries,
            order,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Returns a curve from the library.
    pub fn named(&self, name: &str, node: &GraphNode) -> Result<Curve, Error> {
        self.library.curve(name, Some(node))
    }

    /// Returns the load curves of the adapter of `key` in this calculation,
    /// for a relation of `node` named `relation`.
    pub fn related_loads(
        &self,
        node: &GraphNode,
        relation: &str,
        key: &str,
    ) -> Result<&'a AdapterLoads, Error> {
        self.registries.lookup(self.carrier, key).ok_or_else(|| {
            Error::unresolved_reference(format!(
                "Node {}: `{}` relation refers to node {}, which has no {} adapter.",
                node.key, relation, key, self.carrier
            ))
        })
    }

    /// Resolves `name` for `node`, which takes part in the calculation in the
    /// given direction.
    ///
    /// Library curves are returned as they are.  References become lazy
    /// curves in MW of the resolver's carrier.
    pub fn resolve(
        &self,
        name: &str,
        node: &GraphNode,
        direction: Direction,
    ) -> Result<CurveSource, Error> {
        match CurveReference::parse(name)? {
            CurveReference::Named(name) => Ok(self.named(&name, node)?.into()),
            CurveReference::SelfCurve {
                carrier,
                direction: source_direction,
            } => self.self_curve(name, node, direction, carrier, source_direction),
            CurveReference::UnmetDemand { from, to } => self.unmet_demand(name, node, &from, &to),
        }
    }

    /// Like [`resolve`](Self::resolve), with library curves scaled so that
    /// they sum to `annual` MWh.
    pub fn resolve_scaled(
        &self,
        name: &str,
        node: &GraphNode,
        direction: Direction,
        annual: f64,
    ) -> Result<CurveSource, Error> {
        match self.resolve(name, node, direction)? {
            CurveSource::Fixed(curve) => Ok(curve.normalized_to(annual).into()),
            lazy => Ok(lazy),
        }
    }

    fn self_curve(
        &self,
        name: &str,
        node: &GraphNode,
        direction: Direction,
        source: Carrier,
        source_direction: Direction,
    ) -> Result<CurveSource, Error> {
        let loads = self.lookup(name, node, source, &node.key)?.clone();

        let source_conversion = match source_direction {
            Direction::Input => node.input_conversions.get(source),
            Direction::Output => node.output_conversions.get(source),
        };
        let own_conversion = match direction {
            Direction::Input => node.input_conversions.get(self.carrier),
            Direction::Output => node.output_conversions.get(self.carrier),
        };
        let factor = if *source_conversion > 0.0 {
            own_conversion / source_conversion
        } else {
            0.0
        };
        let offset = self.order.offset(self.carrier, source);
        debug!(
            "Node {}: `{}` in the {} calculation reads {:?}, factor {}.",
            node.key, name, self.carrier, offset, factor
        );

        Ok(LazyCurve::new(move |frame| {
            offset
                .source_frame(frame)
                .map_or(0.0, |f| loads.value(source_direction, f) * factor)
        })
        .into())
    }

    fn unmet_demand(
        &self,
        name: &str,
        node: &GraphNode,
        from: &str,
        to: &str,
    ) -> Result<CurveSource, Error> {
        let (from_carrier, from_loads) = self.locate(name, node, from)?;
        let (to_carrier, to_loads) = self.locate(name, node, to)?;
        let from_offset = self.order.offset(self.carrier, from_carrier);
        let to_offset = self.order.offset(self.carrier, to_carrier);

        Ok(LazyCurve::new(move |frame| {
            let demand = from_offset
                .source_frame(frame)
                .map_or(0.0, |f| from_loads.output.get(f).abs());
            let production = to_offset
                .source_frame(frame)
                .map_or(0.0, |f| to_loads.value(Direction::Output, f));
            (demand - production).max(0.0)
        })
        .into())
    }

    fn lookup(
        &self,
        name: &str,
        node: &GraphNode,
        carrier: Carrier,
        key: &str,
    ) -> Result<&'a AdapterLoads, Error> {
        self.registries.lookup(carrier, key).ok_or_else(|| {
            Error::unresolved_reference(format!(
                "Node {}: `{}` refers to node {}, which has no {} adapter.",
                node.key, name, key, carrier
            ))
        })
    }

    /// Finds the adapter of `key`, in this calculation first and then in the
    /// others, in calculation order.
    fn locate(
        &self,
        name: &str,
        node: &GraphNode,
        key: &str,
    ) -> Result<(Carrier, AdapterLoads), Error> {
        std::iter::once(self.carrier)
            .chain(self.order.carriers().iter().copied())
            .find_map(|carrier| {
                self.registries
                    .lookup(carrier, key)
                    .map(|loads| (carrier, loads.clone()))
            })
            .ok_or_else(|| {
                Error::unresolved_reference(format!(
                    "Node {}: `{}` refers to node {}, which has no adapter.",
                    node.key, name, key
                ))
            })
    }
}
