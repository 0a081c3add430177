//! Score-accumulation channel.
//!
//! The physics side reports collisions as [`ArenaEvent`]s over an mpsc
//! channel. Draining the channel is the only way a genome's score changes
//! during a window, and each `event_id` is credited at most once per window,
//! so a collision delivered twice is counted once. Non-finite deltas are
//! dropped. Agents are looked up by id across both populations, so ids must
//! be unique across kinds (see [`crate::collab::Spawner`]).

use crate::population::{AgentId, Population};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvent {
    pub event_id: u64,
    pub agent: AgentId,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArenaEvent {
    Score(ScoreEvent),
    Destroyed { agent: AgentId },
}

/// Sending half, handed to the score-accumulation collaborator.
#[derive(Debug, Clone)]
pub struct ScoreSender {
    tx: Sender<ArenaEvent>,
}

impl ScoreSender {
    /// Deliver an event. Returns `false` once the simulation side is gone.
    pub fn send(&self, event: ArenaEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn add_score(&self, event_id: u64, agent: AgentId, delta: f64) -> bool {
        self.send(ArenaEvent::Score(ScoreEvent {
            event_id,
            agent,
            delta,
        }))
    }
}

/// Receiving half, owned by the lifecycle manager.
#[derive(Debug)]
pub struct ScoreInbox {
    rx: Receiver<ArenaEvent>,
    seen: HashSet<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub credited: usize,
    pub destroyed: usize,
    pub duplicates: usize,
    /// Non-finite deltas, never credited.
    pub rejected: usize,
    pub unknown: usize,
}

pub fn channel() -> (ScoreSender, ScoreInbox) {
    let (tx, rx) = mpsc::channel();
    (
        ScoreSender { tx },
        ScoreInbox {
            rx,
            seen: HashSet::new(),
        },
    )
}

impl ScoreInbox {
    /// Apply every pending event to the matching live agent.
    ///
    /// Events addressed to agents that are not in `populations` (e.g. from a
    /// previous generation) are dropped.
    pub fn drain(&mut self, populations: &mut [&mut Population]) -> DrainStats {
        let mut stats = DrainStats::default();
        for event in self.rx.try_iter() {
            match event {
                ArenaEvent::Score(score) => {
                    if !score.delta.is_finite() {
                        stats.rejected += 1;
                        continue;
                    }
                    if !self.seen.insert(score.event_id) {
                        stats.duplicates += 1;
                        continue;
                    }
                    match find_live(populations, score.agent) {
                        Some(agent) => {
                            agent.genome_mut().credit(score.delta);
                            stats.credited += 1;
                        }
                        None => stats.unknown += 1,
                    }
                }
                ArenaEvent::Destroyed { agent } => match find_live(populations, agent) {
                    Some(agent) => {
                        agent.destroy();
                        stats.destroyed += 1;
                    }
                    None => stats.unknown += 1,
                },
            }
        }
        if stats != DrainStats::default() {
            log::debug!("{stats:?}");
        }
        stats
    }

    /// Forget delivered event ids; called whenever a new window begins.
    pub fn reset_window(&mut self) {
        self.seen.clear();
    }
}

fn find_live<'a>(
    populations: &'a mut [&mut Population],
    id: AgentId,
) -> Option<&'a mut crate::population::Agent> {
    populations
        .iter_mut()
        .find_map(|pop| pop.get_mut(id))
        .filter(|agent| agent.is_alive())
}
