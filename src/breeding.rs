use crate::error::SimError;
use crate::fitness::FitnessMode;
use crate::genome::{AgentKind, Genome, Vec2};

/// Asexual propagation: copy every heritable trait of the parent.
pub fn clone_parent(parent: &Genome) -> Genome {
    let mut child = parent.clone();
    child.reset_for_birth();
    child
}

/// Ranked breeding: every trait is the mean of both parents.
pub fn combine(a: &Genome, b: &Genome) -> Genome {
    let mean = |x: f64, y: f64| (x + y) / 2.0;
    let mut child = a.clone();
    child.ray_radius = mean(a.ray_radius, b.ray_radius);
    child.sight = mean(a.sight, b.sight);
    child.moving_speed = mean(a.moving_speed, b.moving_speed);
    child.random_direction = Vec2::new(
        mean(a.random_direction.x, b.random_direction.x),
        mean(a.random_direction.y, b.random_direction.y),
    );
    child.box_weight = mean(a.box_weight, b.box_weight);
    child.distance_factor = mean(a.distance_factor, b.distance_factor);
    child.boat_weight = mean(a.boat_weight, b.boat_weight);
    child.boat_distance_factor = mean(a.boat_distance_factor, b.boat_distance_factor);
    child.enemy_weight = mean(a.enemy_weight, b.enemy_weight);
    child.enemy_distance_factor = mean(a.enemy_distance_factor, b.enemy_distance_factor);
    child.reset_for_birth();
    child
}

/// Derive one child from a best-first parent list, using the form the mode calls for.
pub fn breed(parents: &[Genome], mode: FitnessMode, kind: AgentKind) -> Result<Genome, SimError> {
    match (mode.parent_count(), parents) {
        (1, [parent, ..]) => Ok(clone_parent(parent)),
        (2, [a, b, ..]) => Ok(combine(a, b)),
        _ => Err(SimError::PopulationCollapse { kind }),
    }
}
