//! Heritable agent traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two independently evolved populations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Boat,
    Pirate,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::Boat, AgentKind::Pirate];

    pub fn label(self) -> &'static str {
        match self {
            AgentKind::Boat => "boat",
            AgentKind::Pirate => "pirate",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Heritable trait record of one agent for one generation.
///
/// Traits are fixed once the genome is attached to a living agent. The only
/// field that changes during a window is the score, and it only grows through
/// [`Genome::credit`], which is reachable solely from the score channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Discrete movement steps taken. Reset at birth; only a physics
    /// collaborator that counts movement would raise it, so headless runs
    /// report zero.
    pub step_count: u64,

    pub ray_radius: f64,
    pub sight: f64,
    pub moving_speed: f64,

    /// Exploration bias.
    pub random_direction: Vec2,

    pub box_weight: f64,
    pub distance_factor: f64,
    pub boat_weight: f64,
    pub boat_distance_factor: f64,
    pub enemy_weight: f64,
    pub enemy_distance_factor: f64,

    #[serde(default, skip_deserializing)]
    score: f64,
}

impl Genome {
    /// Spawn default of the given kind, before any mutation.
    pub fn default_for(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Boat => Self {
                step_count: 0,
                ray_radius: 1.0,
                sight: 10.0,
                moving_speed: 5.0,
                random_direction: Vec2::new(0.5, 0.5),
                box_weight: 1.0,
                distance_factor: 1.0,
                boat_weight: 0.0,
                boat_distance_factor: 0.0,
                enemy_weight: -1.0,
                enemy_distance_factor: 1.0,
                score: 0.0,
            },
            AgentKind::Pirate => Self {
                step_count: 0,
                ray_radius: 1.0,
                sight: 12.0,
                moving_speed: 6.0,
                random_direction: Vec2::new(0.5, 0.5),
                box_weight: 0.5,
                distance_factor: 1.0,
                boat_weight: 1.0,
                boat_distance_factor: 1.0,
                enemy_weight: 0.0,
                enemy_distance_factor: 0.0,
                score: 0.0,
            },
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Sum of the three decision weights.
    pub fn weights_total(&self) -> f64 {
        self.box_weight + self.boat_weight + self.enemy_weight
    }

    /// Clear the per-window state so the genome can be attached to a newborn.
    pub fn reset_for_birth(&mut self) {
        self.score = 0.0;
        self.step_count = 0;
    }

    pub(crate) fn credit(&mut self, delta: f64) {
        self.score += delta;
    }
}

#[cfg(test)]
pub(crate) fn scored(kind: AgentKind, score: f64) -> Genome {
    let mut genome = Genome::default_for(kind);
    genome.credit(score);
    genome
}
