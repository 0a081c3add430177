use crate::error::SimError;
use crate::genome::Genome;
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};

/// Bounded random perturbation of genome traits.
///
/// Each mutable trait gets an independent trial with probability `chance`.
/// A hit draws a delta in `[-factor, factor]`: sensor and locomotion traits
/// scale by `1 + delta`, exploration and weight traits shift by `delta`.
/// The step count is not mutated.
#[derive(Debug, Clone)]
pub struct Mutation {
    trial_dist: Bernoulli,
    delta_dist: Uniform<f64>,
}

impl Mutation {
    pub fn new(factor: f64, chance: f64) -> Result<Self, SimError> {
        let trial_dist = Bernoulli::new(chance).map_err(|err| {
            SimError::Configuration(format!("invalid mutation chance {chance}: {err}"))
        })?;
        let delta_dist = Uniform::new_inclusive(-factor.abs(), factor.abs()).map_err(|err| {
            SimError::Configuration(format!("invalid mutation factor {factor}: {err}"))
        })?;
        Ok(Self {
            trial_dist,
            delta_dist,
        })
    }

    pub fn apply<R: Rng + ?Sized>(&self, genome: &mut Genome, rng: &mut R) {
        for trait_val in [
            &mut genome.ray_radius,
            &mut genome.sight,
            &mut genome.moving_speed,
        ] {
            if let Some(delta) = self.draw(rng) {
                *trait_val *= 1.0 + delta;
            }
        }

        for trait_val in [
            &mut genome.random_direction.x,
            &mut genome.random_direction.y,
            &mut genome.box_weight,
            &mut genome.distance_factor,
            &mut genome.boat_weight,
            &mut genome.boat_distance_factor,
            &mut genome.enemy_weight,
            &mut genome.enemy_distance_factor,
        ] {
            if let Some(delta) = self.draw(rng) {
                *trait_val += delta;
            }
        }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        if self.trial_dist.sample(rng) {
            Some(self.delta_dist.sample(rng))
        } else {
            None
        }
    }
}

/// Return a mutated copy of `genome`.
pub fn mutate<R: Rng + ?Sized>(
    genome: &Genome,
    factor: f64,
    chance: f64,
    rng: &mut R,
) -> Result<Genome, SimError> {
    let mut mutated = genome.clone();
    Mutation::new(factor, chance)?.apply(&mut mutated, rng);
    Ok(mutated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{AgentKind, scored};
    use rand_chacha::ChaCha12Rng;

    fn rng() -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(6)
    }

    #[test]
    fn zero_factor_is_a_no_op() {
        let genome = scored(AgentKind::Boat, 3.0);
        for chance in [0.0, 0.5, 1.0] {
            let mutated = mutate(&genome, 0.0, chance, &mut rng()).unwrap();
            assert_eq!(mutated, genome);
        }
    }

    #[test]
    fn zero_chance_is_a_no_op() {
        let genome = scored(AgentKind::Pirate, 1.5);
        for factor in [0.0, 0.1, 0.9] {
            let mutated = mutate(&genome, factor, 0.0, &mut rng()).unwrap();
            assert_eq!(mutated, genome);
        }
    }

    #[test]
    fn deltas_stay_within_factor() {
        let genome = Genome::default_for(AgentKind::Boat);
        let mut rng = rng();
        for _ in 0..200 {
            let mutated = mutate(&genome, 0.2, 1.0, &mut rng).unwrap();
            let ratio = mutated.sight / genome.sight;
            assert!((0.8 - 1e-12..=1.2 + 1e-12).contains(&ratio));
            let shift = mutated.box_weight - genome.box_weight;
            assert!((-0.2 - 1e-12..=0.2 + 1e-12).contains(&shift));
            assert_eq!(mutated.step_count, genome.step_count);
            assert_eq!(mutated.score(), genome.score());
        }
    }

    #[test]
    fn certain_chance_changes_traits() {
        let genome = Genome::default_for(AgentKind::Pirate);
        let mutated = mutate(&genome, 0.5, 1.0, &mut rng()).unwrap();
        assert_ne!(mutated.moving_speed, genome.moving_speed);
        assert_ne!(mutated.enemy_weight, genome.enemy_weight);
    }

    #[test]
    fn same_seed_same_mutation() {
        let genome = Genome::default_for(AgentKind::Boat);
        let a = mutate(&genome, 0.3, 0.5, &mut rng()).unwrap();
        let b = mutate(&genome, 0.3, 0.5, &mut rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_chance_is_a_configuration_error() {
        assert!(matches!(
            Mutation::new(0.1, 1.5),
            Err(SimError::Configuration(_))
        ));
    }
}
