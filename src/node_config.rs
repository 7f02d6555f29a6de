// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the per-node, per-carrier dispatch configuration.
//!
//! The `(type, subtype)` pair of a configuration record is parsed into the
//! closed [`DispatchType`] union, so that every technology the adapters know
//! about is an explicit enum variant and unknown keys are rejected up front.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::Error;

/// Subtypes of producing technologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerSubtype {
    MustRun,
    Volatile,
    Dispatchable,
    Backup,
    Import,
    Electrolyser,
    BatteryPark,
    HybridOffshore,
}

/// Subtypes of consuming technologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerSubtype {
    Consumer,
    ConsumptionLoss,
}

/// Groups of flexible technologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlexKind {
    PowerToX,
    Curtailment,
    Export,
    Storage,
    HeatStorage,
    LoadShifting,
    Transformation,
    OptimizingStorage,
}

/// The role of a node in one carrier's dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchType {
    Producer(ProducerSubtype),
    Consumer(ConsumerSubtype),
    Flex(FlexKind),
}

impl DispatchType {
    /// Parses the `type` and `subtype` keys of a configuration record.
    ///
    /// For flex technologies the subtype is the flex group.  A missing
    /// consumer subtype means a plain consumer, and a missing flex group means
    /// a generic power-to-x sink.
    pub fn parse(type_key: &str, subtype_key: Option<&str>) -> Result<Self, Error> {
        let unknown = || {
            Error::invalid_configuration(format!(
                "Unknown dispatch subtype `{}` for type `{}`.",
                subtype_key.unwrap_or(""),
                type_key
            ))
        };

        match type_key {
            "producer" => Ok(DispatchType::Producer(match subtype_key {
                Some("must_run") => ProducerSubtype::MustRun,
                Some("volatile") => ProducerSubtype::Volatile,
                Some("dispatchable") => ProducerSubtype::Dispatchable,
                Some("backup") => ProducerSubtype::Backup,
                Some("import") => ProducerSubtype::Import,
                Some("electrolyser") => ProducerSubtype::Electrolyser,
                Some("battery_park") => ProducerSubtype::BatteryPark,
                Some("hybrid_offshore") => ProducerSubtype::HybridOffshore,
                _ => return Err(unknown()),
            })),
            "consumer" => Ok(DispatchType::Consumer(match subtype_key {
                None | Some("consumer") => ConsumerSubtype::Consumer,
                Some("consumption_loss") => ConsumerSubtype::ConsumptionLoss,
                _ => return Err(unknown()),
            })),
            "flex" => Ok(DispatchType::Flex(match subtype_key {
                None | Some("power_to_x") => FlexKind::PowerToX,
                Some("curtailment") => FlexKind::Curtailment,
                Some("export") => FlexKind::Export,
                Some("storage") => FlexKind::Storage,
                Some("heat_storage") => FlexKind::HeatStorage,
                Some("load_shifting") => FlexKind::LoadShifting,
                Some("transformation") => FlexKind::Transformation,
                Some("optimizing_storage") => FlexKind::OptimizingStorage,
                _ => return Err(unknown()),
            })),
            _ => Err(Error::invalid_configuration(format!(
                "Unknown dispatch type `{}`.",
                type_key
            ))),
        }
    }

    /// Returns true for flexible technologies.
    pub fn is_flex(&self) -> bool {
        matches!(self, DispatchType::Flex(_))
    }
}

impl Display for DispatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchType::Producer(subtype) => write!(f, "Producer({:?})", subtype),
            DispatchType::Consumer(subtype) => write!(f, "Consumer({:?})", subtype),
            DispatchType::Flex(kind) => write!(f, "Flex({:?})", kind),
        }
    }
}

/// The dispatch configuration of one node for one carrier.
///
/// Immutable during a dispatch pass.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    /// The technology this node represents in the carrier's dispatch.
    pub dispatch_type: DispatchType,

    /// Flex group (for flex technologies) or sector (for optimizing storage).
    pub group: Option<String>,

    /// Name of the production or demand profile, or a curve reference such as
    /// `self: electricity_input_curve`.
    pub profile: Option<String>,

    /// Name of an hourly availability curve.
    pub availability_curve: Option<String>,

    /// Name of an hourly price curve.
    pub cost_curve: Option<String>,

    /// Named relations to other nodes, e.g. `source`, `curtailment`.
    pub relations: BTreeMap<String, Vec<String>>,

    /// Share of the peak output that is curtailed, for always-on producers.
    pub curtailment: f64,

    /// Price the technology is willing to pay for energy it consumes.
    pub consumption_price: Option<f64>,

    /// Capacity of the grid connection of a multi-node bundle, in MW.
    pub connection_capacity: Option<f64>,
}

impl NodeConfig {
    /// Creates a configuration for the given technology, with all optional
    /// attributes unset.
    pub fn new(dispatch_type: DispatchType) -> Self {
        Self {
            dispatch_type,
            group: None,
            profile: None,
            availability_curve: None,
            cost_curve: None,
            relations: BTreeMap::new(),
            curtailment: 0.0,
            consumption_price: None,
            connection_capacity: None,
        }
    }

    /// Sets the profile name.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the flex group or sector.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Adds a node key to the named relation.
    pub fn with_relation(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.relations
            .entry(name.into())
            .or_default()
            .push(key.into());
        self
    }

    /// Returns the single node key of a required relation.
    pub fn relation<'a>(&'a self, node_key: &str, name: &str) -> Result<&'a str, Error> {
        self.relations
            .get(name)
            .and_then(|keys| keys.first())
            .map(String::as_str)
            .ok_or_else(|| {
                Error::missing_relation(format!(
                    "Node {} has no `{}` relation.",
                    node_key, name
                ))
            })
    }

    /// Returns the node key of an optional relation.
    pub fn optional_relation(&self, name: &str) -> Option<&str> {
        self.relations
            .get(name)
            .and_then(|keys| keys.first())
            .map(String::as_str)
    }

    /// Returns all node keys of a required relation.
    pub fn relations_named<'a>(&'a self, node_key: &str, name: &str) -> Result<&'a [String], Error> {
        match self.relations.get(name) {
            Some(keys) if !keys.is_empty() => Ok(keys),
            _ => Err(Error::missing_relation(format!(
                "Node {} has no `{}` relation.",
                node_key, name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() -> Result<(), Error> {
        assert_eq!(
            DispatchType::parse("producer", Some("volatile"))?,
            DispatchType::Producer(ProducerSubtype::Volatile)
        );
        assert_eq!(
            DispatchType::parse("consumer", None)?,
            DispatchType::Consumer(ConsumerSubtype::Consumer)
        );
        assert_eq!(
            DispatchType::parse("flex", Some("optimizing_storage"))?,
            DispatchType::Flex(FlexKind::OptimizingStorage)
        );
        assert_eq!(
            DispatchType::parse("flex", None)?,
            DispatchType::Flex(FlexKind::PowerToX)
        );

        assert_eq!(
            DispatchType::parse("producer", None)
                .unwrap_err()
                .to_string(),
            "InvalidConfiguration: Unknown dispatch subtype `` for type `producer`."
        );
        assert_eq!(
            DispatchType::parse("storage", Some("battery"))
                .unwrap_err()
                .to_string(),
            "InvalidConfiguration: Unknown dispatch type `storage`."
        );

        Ok(())
    }

    #[test]
    fn test_relations() -> Result<(), Error> {
        let config = NodeConfig::new(DispatchType::Flex(FlexKind::LoadShifting))
            .with_relation("limiting", "households")
            .with_relation("limiting", "buildings");

        assert_eq!(config.relation("shifter", "limiting")?, "households");
        assert_eq!(
            config.relations_named("shifter", "limiting")?,
            &["households".to_string(), "buildings".to_string()]
        );
        assert_eq!(config.optional_relation("curtailment"), None);
        assert_eq!(
            config.relation("shifter", "source").unwrap_err().to_string(),
            "MissingRelation: Node shifter has no `source` relation."
        );

        Ok(())
    }
}
