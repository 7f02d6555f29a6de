// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the `Carrier` enum and the `PerCarrier` container.
//!
//! Both are generated from a single carrier list, so that every per-carrier
//! lookup (configuration attribute, conversion, capacity) is a plain field
//! access checked at compile time.

/// A macro for defining the `Carrier` enum and the `PerCarrier` struct with one
/// field per carrier.
macro_rules! carriers {
    ($(
        ($variant:ident, $field:ident, $key:literal, $attribute:literal)
    ),*) => {
        /// A form of energy tracked separately through the graph.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Carrier {
            $(
                $variant,
            )*
        }

        impl Carrier {
            /// All carriers, in declaration order.
            pub const ALL: &'static [Carrier] = &[$(Carrier::$variant,)*];

            /// Returns the key used in curve names, e.g.
            /// `electricity_output_curve`.
            pub fn key(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant => $key,
                    )*
                }
            }

            /// Returns the name of the node attribute holding the dispatch
            /// configuration for this carrier.
            pub fn config_attribute(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant => $attribute,
                    )*
                }
            }

            /// Looks up a carrier by its key.
            pub fn from_key(key: &str) -> Option<Carrier> {
                match key {
                    $(
                        $key => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }
        }

        /// Holds one value for each [`Carrier`].
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct PerCarrier<T> {
            $(
                pub $field: T,
            )*
        }

        impl<T> PerCarrier<T> {
            /// Returns the value for the given carrier.
            pub fn get(&self, carrier: Carrier) -> &T {
                match carrier {
                    $(
                        Carrier::$variant => &self.$field,
                    )*
                }
            }

            /// Returns a mutable reference to the value for the given carrier.
            pub fn get_mut(&mut self, carrier: Carrier) -> &mut T {
                match carrier {
                    $(
                        Carrier::$variant => &mut self.$field,
                    )*
                }
            }

            /// Replaces the value for the given carrier.
            pub fn set(&mut self, carrier: Carrier, value: T) {
                *self.get_mut(carrier) = value;
            }

            /// Iterates over `(carrier, value)` pairs in declaration order.
            pub fn iter(&self) -> impl Iterator<Item = (Carrier, &T)> {
                Carrier::ALL.iter().map(move |c| (*c, self.get(*c)))
            }
        }
    };
}

carriers!(
    (Electricity, electricity, "electricity", "merit_order"),
    (HtHeat, ht_heat, "ht_heat", "heat_network_ht"),
    (MtHeat, mt_heat, "mt_heat", "heat_network_mt"),
    (LtHeat, lt_heat, "lt_heat", "heat_network_lt"),
    (AgricultureHeat, agriculture_heat, "agriculture_heat", "agriculture_heat"),
    (Hydrogen, hydrogen, "hydrogen", "hydrogen")
);

impl Carrier {
    /// Returns true for the three heat-network tiers.
    pub fn is_heat_network(&self) -> bool {
        matches!(self, Carrier::HtHeat | Carrier::MtHeat | Carrier::LtHeat)
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Whether a curve describes what a node takes in or what it gives out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}
