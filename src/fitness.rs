//! Scalar fitness and ranking.

use crate::error::SimError;
use crate::genome::Genome;
use crate::population::{Agent, Population};
use serde::{Deserialize, Serialize};

/// Scalar-scoring policy. Also decides how many parents survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMode {
    Points,
    Weights,
    RankedOnPoints,
    RankedOnWeights,
}

impl FitnessMode {
    pub fn parent_count(self) -> usize {
        match self {
            FitnessMode::Points | FitnessMode::Weights => 1,
            FitnessMode::RankedOnPoints | FitnessMode::RankedOnWeights => 2,
        }
    }

    fn uses_points(self) -> bool {
        matches!(self, FitnessMode::Points | FitnessMode::RankedOnPoints)
    }
}

/// Non-zero normalisation constants.
///
/// Only constructible through [`Normalization::new`], so evaluation never
/// divides by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    target_points: f64,
    target_weights_total: f64,
}

impl Normalization {
    pub fn new(target_points: f64, target_weights_total: f64) -> Result<Self, SimError> {
        for (name, val) in [
            ("target_points", target_points),
            ("target_weights_total", target_weights_total),
        ] {
            if val == 0.0 || !val.is_finite() {
                return Err(SimError::Configuration(format!(
                    "{name} must be finite and non-zero, but is {val}"
                )));
            }
        }
        Ok(Self {
            target_points,
            target_weights_total,
        })
    }

    pub fn fitness(&self, genome: &Genome, mode: FitnessMode) -> f64 {
        if mode.uses_points() {
            genome.score() / self.target_points
        } else {
            genome.weights_total() / self.target_weights_total
        }
    }
}

/// One entry of a ranked view.
#[derive(Debug, Clone, Copy)]
pub struct Ranked<'a> {
    pub agent: &'a Agent,
    pub fitness: f64,
}

/// Rank the live agents of a population, best first.
///
/// Equal fitness keeps population order. The population itself is untouched.
pub fn rank<'a>(
    population: &'a Population,
    mode: FitnessMode,
    norm: &Normalization,
) -> Vec<Ranked<'a>> {
    let mut ranked: Vec<_> = population
        .live()
        .map(|agent| Ranked {
            agent,
            fitness: norm.fitness(agent.genome(), mode),
        })
        .collect();
    ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    ranked
}
