// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A merit-order dispatch engine.
//!
//! Every frame is cleared in the same sequence:
//!
//! 1. consumers, scheduled participants and always-on producers set the
//!    balance of the frame;
//! 2. recovery participants take on whatever repayment of shedding debt is
//!    due in the frame, and add it to the demand;
//! 3. a surplus is absorbed by flex participants, highest consumption price
//!    first, with shedding debt repaid before anything else;
//! 4. a deficit is covered by dispatchable and flex producers, lowest price
//!    first.
//!
//! Energy that can not be absorbed or supplied is left unassigned.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::{
    DispatchEngine, DispatchOrder, FlexGroup, FlexRole, GroupBehavior, Participant,
    ParticipantKind,
};
use crate::{Carrier, Error};

const EPSILON: f64 = 1e-9;

/// Creates [`MeritOrder`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeritEngine;

impl DispatchEngine for MeritEngine {
    fn order(&self, carrier: Carrier) -> Box<dyn DispatchOrder> {
        Box::new(MeritOrder::new(carrier))
    }
}

/// A merit-order roster for one carrier.
pub struct MeritOrder {
    carrier: Carrier,
    participants: Vec<Rc<Participant>>,
    groups: HashMap<String, GroupBehavior>,
    next_frame: usize,
}

impl MeritOrder {
    pub fn new(carrier: Carrier) -> Self {
        Self {
            carrier,
            participants: Vec::new(),
            groups: HashMap::new(),
            next_frame: 0,
        }
    }

    /// Splits the flex participants that can consume into batches served
    /// one after the other.  Members of share groups form a single batch.
    fn consumer_batches(&self, frame: usize) -> Vec<Vec<&Rc<Participant>>> {
        let mut batches: Vec<(f64, Vec<&Rc<Participant>>)> = Vec::new();
        let mut shared: HashMap<&str, usize> = HashMap::new();

        for participant in &self.participants {
            let ParticipantKind::Flex {
                role,
                group,
                consumption_price,
                ..
            } = participant.kind()
            else {
                continue;
            };
            let price = match role {
                FlexRole::Recovery { .. } => f64::INFINITY,
                FlexRole::Sink | FlexRole::Storage { .. } | FlexRole::ReserveInput { .. } => {
                    consumption_price.at(frame)
                }
                FlexRole::ReserveOutput { .. } | FlexRole::Shedding { .. } => continue,
            };

            let share_group = group
                .as_deref()
                .filter(|g| self.groups.get(*g) == Some(&GroupBehavior::Share));
            match share_group.and_then(|g| shared.get(g).copied()) {
                Some(index) => batches[index].1.push(participant),
                None => {
                    if let Some(g) = share_group {
                        shared.insert(g, batches.len());
                    }
                    batches.push((price, vec![participant]));
                }
            }
        }

        batches.sort_by(|a, b| b.0.total_cmp(&a.0));
        batches.into_iter().map(|(_, batch)| batch).collect()
    }

    /// Returns the participants that can produce on demand, cheapest first.
    fn producers(&self, frame: usize) -> Vec<(f64, &Rc<Participant>)> {
        let mut producers = self
            .participants
            .iter()
            .filter_map(|participant| match participant.kind() {
                ParticipantKind::Dispatchable { marginal_costs, .. } => {
                    Some((marginal_costs.at(frame), participant))
                }
                ParticipantKind::Flex {
                    role:
                        FlexRole::Storage { .. }
                        | FlexRole::ReserveOutput { .. }
                        | FlexRole::Shedding { .. },
                    production_price,
                    ..
                } => Some((production_price.at(frame), participant)),
                _ => None,
            })
            .collect::<Vec<_>>();
        producers.sort_by(|a, b| a.0.total_cmp(&b.0));
        producers
    }

    fn absorb_surplus(&self, frame: usize, mut surplus: f64) -> f64 {
        for batch in self.consumer_batches(frame) {
            if surplus <= EPSILON {
                break;
            }
            let headrooms = batch
                .iter()
                .map(|p| p.input_headroom(frame))
                .collect::<Vec<_>>();
            let available: f64 = headrooms.iter().sum();
            if available <= EPSILON {
                continue;
            }
            let assigned = surplus.min(available);
            for (participant, headroom) in batch.iter().zip(headrooms) {
                surplus -= participant.consume(frame, assigned * headroom / available);
            }
        }
        surplus
    }

    fn cover_deficit(&self, frame: usize, mut deficit: f64) -> f64 {
        for (_, participant) in self.producers(frame) {
            if deficit <= EPSILON {
                break;
            }
            deficit -= participant.produce(frame, deficit);
        }
        deficit
    }
}

impl DispatchOrder for MeritOrder {
    fn add(&mut self, participant: Rc<Participant>) -> Result<(), Error> {
        if let ParticipantKind::Flex {
            group: Some(group), ..
        } = participant.kind()
        {
            if !self.groups.contains_key(group) {
                return Err(Error::invalid_configuration(format!(
                    "Participant {} refers to undeclared flex group `{}`.",
                    participant.key(),
                    group
                )));
            }
        }
        self.participants.push(participant);
        Ok(())
    }

    fn add_flex_group(&mut self, group: FlexGroup) -> Result<(), Error> {
        if self.groups.contains_key(&group.key) {
            return Err(Error::invalid_configuration(format!(
                "Flex group `{}` declared twice in the {} dispatch.",
                group.key, self.carrier
            )));
        }
        self.groups.insert(group.key, group.behavior);
        Ok(())
    }

    fn calculate_frame(&mut self, frame: usize) -> Result<(), Error> {
        if frame != self.next_frame {
            return Err(Error::invalid_state(format!(
                "The {} dispatch expected frame {}, got {}.",
                self.carrier, self.next_frame, frame
            )));
        }
        self.next_frame += 1;

        let mut balance = 0.0;
        for participant in &self.participants {
            participant.enter_frame(frame);
            let load = match participant.kind() {
                ParticipantKind::AlwaysOn { production, .. } => production.get(frame),
                ParticipantKind::Consumer { demand } => -demand.get(frame),
                ParticipantKind::Scheduled { load } => load.get(frame),
                ParticipantKind::Dispatchable { .. } | ParticipantKind::Flex { .. } => continue,
            };
            participant.load_curve().set(frame, load);
            balance += load;
        }

        for participant in &self.participants {
            let due = participant.forced_consumption(frame);
            if due > EPSILON {
                balance -= participant.consume(frame, due);
            }
        }

        if balance > EPSILON {
            let unassigned = self.absorb_surplus(frame, balance);
            if unassigned > EPSILON {
                debug!(
                    "{} frame {}: {:.3} MW surplus left unassigned.",
                    self.carrier, frame, unassigned
                );
            }
        } else if balance < -EPSILON {
            let unmet = self.cover_deficit(frame, -balance);
            if unmet > EPSILON {
                debug!(
                    "{} frame {}: {:.3} MW demand left unmet.",
                    self.carrier, frame, unmet
                );
            }
        }

        Ok(())
    }

    fn participants(&self) -> Vec<Rc<Participant>> {
        self.participants.clone()
    }
}
