//! Headless stand-in for the physics world.
//!
//! Places objects uniformly in their areas and turns agent traits into
//! collision events: agents pick up boxes, pirates catch boats. Only the
//! event stream matters to the core, so there is no geometry beyond spawn
//! positions.

use crate::collab::{SpawnTarget, Spawned, Spawner};
use crate::config::{ArenaConfig, AreaSpec};
use crate::genome::{AgentKind, Genome, Vec2};
use crate::population::{Agent, AgentId};
use crate::score::{ArenaEvent, ScoreSender};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

pub struct Arena {
    cfg: ArenaConfig,
    rng: ChaCha12Rng,
    sender: ScoreSender,
    next_agent: u64,
    next_event: u64,
    boxes_left: usize,
}

impl Arena {
    pub fn new(cfg: ArenaConfig, sender: ScoreSender) -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(cfg.seed),
            cfg,
            sender,
            next_agent: 0,
            next_event: 0,
            boxes_left: 0,
        }
    }

    pub fn boxes_left(&self) -> usize {
        self.boxes_left
    }

    /// Simulate `dt` seconds of collisions among the given live agents.
    pub fn step(&mut self, dt: f64, agents: &[Agent]) {
        let mut caught = Vec::new();
        for agent in agents.iter().filter(|agt| agt.is_alive()) {
            let pickup = pickup_rate(agent.genome(), self.cfg.pickup_chance) * dt;
            if self.boxes_left > 0 && self.chance(pickup) {
                self.boxes_left -= 1;
                let points = match agent.kind {
                    AgentKind::Boat => self.cfg.boat_box_points,
                    AgentKind::Pirate => self.cfg.pirate_box_points,
                };
                self.emit_score(agent.id, points);
            }

            if agent.kind != AgentKind::Pirate {
                continue;
            }
            if !self.chance(catch_rate(agent.genome(), self.cfg.catch_chance) * dt) {
                continue;
            }
            let prey: Vec<_> = agents
                .iter()
                .filter(|agt| agt.kind == AgentKind::Boat && agt.is_alive())
                .filter(|agt| !caught.contains(&agt.id))
                .map(|agt| agt.id)
                .collect();
            if let Some(&boat) = prey.choose(&mut self.rng) {
                caught.push(boat);
                self.emit_score(agent.id, self.cfg.boat_points);
                self.sender.send(ArenaEvent::Destroyed { agent: boat });
            }
        }
    }

    fn chance(&mut self, prob: f64) -> bool {
        match Bernoulli::new(prob.clamp(0.0, 1.0)) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => false,
        }
    }

    fn emit_score(&mut self, agent: AgentId, delta: f64) {
        let event_id = self.next_event;
        self.next_event += 1;
        self.sender.add_score(event_id, agent, delta);
    }

    fn place(&mut self, spec: &AreaSpec) -> Vec2 {
        Vec2::new(
            spec.origin.x + self.rng.random::<f64>() * spec.size.x,
            spec.origin.y + self.rng.random::<f64>() * spec.size.y,
        )
    }
}

impl Spawner for Arena {
    fn regenerate(&mut self, target: SpawnTarget, spec: &AreaSpec) -> Vec<Spawned> {
        let spawned: Vec<_> = (0..spec.count)
            .map(|_| {
                let id = AgentId(self.next_agent);
                self.next_agent += 1;
                Spawned {
                    id,
                    position: self.place(spec),
                }
            })
            .collect();
        if target == SpawnTarget::Boxes {
            self.boxes_left = spawned.len();
        }
        spawned
    }
}

fn pickup_rate(genome: &Genome, base: f64) -> f64 {
    let sight = genome.sight.max(0.0);
    let drive = 1.0 + genome.box_weight.max(0.0);
    base * sight / (sight + 10.0) * drive * genome.moving_speed.max(0.0) / 5.0
}

fn catch_rate(genome: &Genome, base: f64) -> f64 {
    let speed = genome.moving_speed.max(0.0);
    let drive = 1.0 + genome.boat_weight.max(0.0);
    base * speed / (speed + 5.0) * drive * genome.ray_radius.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Population;
    use crate::score;

    fn spec(count: usize) -> AreaSpec {
        AreaSpec {
            count,
            origin: Vec2::new(10.0, 20.0),
            size: Vec2::new(5.0, 5.0),
        }
    }

    #[test]
    fn spawns_inside_area_with_fresh_ids() {
        let (tx, _inbox) = score::channel();
        let mut arena = Arena::new(ArenaConfig::default(), tx);
        let first = arena.regenerate(SpawnTarget::Agents(AgentKind::Boat), &spec(4));
        let second = arena.regenerate(SpawnTarget::Agents(AgentKind::Boat), &spec(4));

        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|s| (10.0..15.0).contains(&s.position.x)));
        assert!(first.iter().all(|s| (20.0..25.0).contains(&s.position.y)));
        assert!(second.iter().all(|s| first.iter().all(|f| f.id != s.id)));
    }

    #[test]
    fn pirates_catch_and_score_boats() {
        let (tx, mut inbox) = score::channel();
        let cfg = ArenaConfig {
            catch_chance: 1.0,
            pickup_chance: 0.0,
            ..ArenaConfig::default()
        };
        let mut arena = Arena::new(cfg, tx);

        let mut boats = Population::new(AgentKind::Boat);
        let mut pirates = Population::new(AgentKind::Pirate);
        for s in arena.regenerate(SpawnTarget::Agents(AgentKind::Boat), &spec(3)) {
            let genome = Genome::default_for(AgentKind::Boat);
            boats.push(Agent::new(s.id, AgentKind::Boat, s.position, genome));
        }
        for s in arena.regenerate(SpawnTarget::Agents(AgentKind::Pirate), &spec(1)) {
            let genome = Genome::default_for(AgentKind::Pirate);
            pirates.push(Agent::new(s.id, AgentKind::Pirate, s.position, genome));
        }

        for _ in 0..4 {
            let agents: Vec<_> = boats.live().chain(pirates.live()).cloned().collect();
            arena.step(1.0, &agents);
            inbox.drain(&mut [&mut boats, &mut pirates]);
        }

        assert_eq!(boats.live_count(), 0);
        assert_eq!(pirates.agents()[0].genome().score(), 15.0);
    }
}
