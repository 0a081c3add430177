//! Population lifecycle manager.
//!
//! Drives both populations through `Idle -> Spawned -> Evaluating ->
//! Transitioning -> Spawned -> ...`. A transition either completes for both
//! populations or leaves the committed state untouched: new populations and
//! parent sets are built aside and swapped in together at the end.

use crate::breeding;
use crate::collab::{ResultLog, SpawnTarget, Spawner, Template, TemplateStore, retry_once};
use crate::config::Config;
use crate::error::SimError;
use crate::fitness::{self, FitnessMode, Normalization};
use crate::genome::{AgentKind, Genome};
use crate::mutation::Mutation;
use crate::population::{Agent, Population};
use crate::score::ScoreInbox;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Spawned,
    Evaluating,
    Transitioning,
    Stopped,
}

/// A selected survivor, detached from the agent it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    pub label: String,
    pub genome: Genome,
    pub fitness: f64,
}

/// Best-first survivors used to breed the next generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentSet {
    pub members: Vec<Parent>,
}

impl ParentSet {
    pub fn genomes(&self) -> Vec<Genome> {
        self.members.iter().map(|par| par.genome.clone()).collect()
    }

    pub fn best(&self) -> Option<&Parent> {
        self.members.first()
    }
}

/// The I/O boundary of the manager.
pub struct Collaborators<S, L, T> {
    pub spawner: S,
    pub log: L,
    pub templates: T,
}

/// Outcome of one completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub generation: u64,
    pub boat_parents: ParentSet,
    pub pirate_parents: ParentSet,
}

impl GenerationReport {
    pub fn parents(&self, kind: AgentKind) -> &ParentSet {
        match kind {
            AgentKind::Boat => &self.boat_parents,
            AgentKind::Pirate => &self.pirate_parents,
        }
    }
}

/// State needed to pick a run back up in another process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cfg: Config,
    pub generation: u64,
    pub boat_parents: Option<ParentSet>,
    pub pirate_parents: Option<ParentSet>,
}

struct Lineage {
    population: Population,
    parents: Option<ParentSet>,
}

impl Lineage {
    fn new(kind: AgentKind) -> Self {
        Self {
            population: Population::new(kind),
            parents: None,
        }
    }
}

/// Result of evaluating one population, before anything is committed.
struct Selection {
    chosen: ParentSet,
    retained: Option<ParentSet>,
    seed: Option<Genome>,
}

pub struct Lifecycle<S, L, T> {
    cfg: Config,
    mode: FitnessMode,
    norm: Normalization,
    mutation: Mutation,
    phase: Phase,
    generation: u64,
    boats: Lineage,
    pirates: Lineage,
    collab: Collaborators<S, L, T>,
    inbox: ScoreInbox,
    rng: ChaCha12Rng,
}

impl<S, L, T> Lifecycle<S, L, T>
where
    S: Spawner,
    L: ResultLog,
    T: TemplateStore,
{
    /// Validate `cfg` and build an idle manager.
    pub fn new(
        cfg: Config,
        collab: Collaborators<S, L, T>,
        inbox: ScoreInbox,
    ) -> Result<Self, SimError> {
        cfg.validate()?;
        let evo = &cfg.evolution;
        let norm = cfg.normalization()?;
        let mutation = Mutation::new(evo.mutation_factor, evo.mutation_chance)?;
        let rng = ChaCha12Rng::seed_from_u64(evo.seed);
        Ok(Self {
            mode: evo.fitness_mode,
            norm,
            mutation,
            phase: Phase::Idle,
            generation: 0,
            boats: Lineage::new(AgentKind::Boat),
            pirates: Lineage::new(AgentKind::Pirate),
            collab,
            inbox,
            rng,
            cfg,
        })
    }

    /// Rebuild a stopped manager from a checkpoint. Call [`Lifecycle::resume`] next.
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        collab: Collaborators<S, L, T>,
        inbox: ScoreInbox,
    ) -> Result<Self, SimError> {
        let mut lifecycle = Self::new(checkpoint.cfg, collab, inbox)?;
        lifecycle.generation = checkpoint.generation;
        lifecycle.boats.parents = checkpoint.boat_parents;
        lifecycle.pirates.parents = checkpoint.pirate_parents;
        lifecycle.phase = Phase::Stopped;
        Ok(lifecycle)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cfg: self.cfg.clone(),
            generation: self.generation,
            boat_parents: self.boats.parents.clone(),
            pirate_parents: self.pirates.parents.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed windows.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn population(&self, kind: AgentKind) -> &Population {
        &self.lineage(kind).population
    }

    pub fn parents(&self, kind: AgentKind) -> Option<&ParentSet> {
        self.lineage(kind).parents.as_ref()
    }

    pub fn live_agents(&self) -> impl Iterator<Item = &Agent> {
        self.boats.population.live().chain(self.pirates.population.live())
    }

    pub fn collaborators(&self) -> &Collaborators<S, L, T> {
        &self.collab
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators<S, L, T> {
        &mut self.collab
    }

    /// Apply pending score events to the current generation.
    pub fn drain_events(&mut self) {
        self.inbox
            .drain(&mut [&mut self.boats.population, &mut self.pirates.population]);
    }

    /// `Idle -> Spawned`: first generation from spawn defaults.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Idle {
            return Err(SimError::InvalidTransition {
                from: self.phase,
                op: "start",
            });
        }
        self.rng = ChaCha12Rng::seed_from_u64(self.cfg.evolution.seed);
        self.regenerate_boxes();
        let boats = self.spawn(AgentKind::Boat, None)?;
        let pirates = self.spawn(AgentKind::Pirate, None)?;
        self.commit(boats, pirates);
        log::info!("started simulation");
        Ok(())
    }

    /// One full `Spawned -> Evaluating -> Transitioning -> Spawned` cycle.
    pub fn advance(&mut self) -> Result<GenerationReport, SimError> {
        if self.phase != Phase::Spawned {
            return Err(SimError::InvalidTransition {
                from: self.phase,
                op: "advance",
            });
        }
        let result = self.cycle();
        if result.is_err() {
            self.phase = Phase::Spawned;
        }
        result
    }

    /// Freeze the current generation: prune the dead and put the rest to sleep.
    ///
    /// Parent sets are kept so that [`Lifecycle::resume`] can continue.
    pub fn stop(&mut self) {
        if self.phase != Phase::Spawned {
            return;
        }
        self.drain_events();
        for lineage in [&mut self.boats, &mut self.pirates] {
            lineage.population.prune();
            lineage.population.sleep_all();
        }
        self.phase = Phase::Stopped;
        log::info!("stopped at generation {}", self.generation);
    }

    /// `Stopped -> Transitioning -> Spawned` from the existing parent sets.
    ///
    /// The interrupted window is not ranked and the generation counter is not
    /// incremented.
    pub fn resume(&mut self) -> Result<(), SimError> {
        if self.phase != Phase::Stopped {
            return Err(SimError::InvalidTransition {
                from: self.phase,
                op: "resume",
            });
        }
        self.rng = ChaCha12Rng::seed_from_u64(self.cfg.evolution.seed);
        self.phase = Phase::Transitioning;
        let result = self.respawn_from_parents();
        match result {
            Ok(()) => log::info!("resumed at generation {}", self.generation),
            Err(_) => self.phase = Phase::Stopped,
        }
        result
    }

    fn respawn_from_parents(&mut self) -> Result<(), SimError> {
        let boat_seed = self.offspring(AgentKind::Boat, self.boats.parents.as_ref());
        let pirate_seed = self.offspring(AgentKind::Pirate, self.pirates.parents.as_ref());
        self.regenerate_boxes();
        let boats = self.spawn(AgentKind::Boat, boat_seed.as_ref())?;
        let pirates = self.spawn(AgentKind::Pirate, pirate_seed.as_ref())?;
        self.commit(boats, pirates);
        Ok(())
    }

    fn cycle(&mut self) -> Result<GenerationReport, SimError> {
        self.drain_events();
        self.phase = Phase::Evaluating;
        self.rng = ChaCha12Rng::seed_from_u64(self.cfg.evolution.seed);

        let boat_sel = self.select(AgentKind::Boat)?;
        let pirate_sel = self.select(AgentKind::Pirate)?;

        self.phase = Phase::Transitioning;
        self.regenerate_boxes();
        let boats = self.spawn(AgentKind::Boat, boat_sel.seed.as_ref())?;
        let pirates = self.spawn(AgentKind::Pirate, pirate_sel.seed.as_ref())?;

        let generation = self.generation + 1;
        self.report(generation, AgentKind::Boat, &boat_sel.chosen);
        self.report(generation, AgentKind::Pirate, &pirate_sel.chosen);
        log::info!(
            "generation {generation}: best boat fitness {:.4}, best pirate fitness {:.4}",
            boat_sel.chosen.best().map_or(f64::NAN, |par| par.fitness),
            pirate_sel.chosen.best().map_or(f64::NAN, |par| par.fitness),
        );

        self.boats.parents = boat_sel.retained;
        self.pirates.parents = pirate_sel.retained;
        self.commit(boats, pirates);
        self.generation = generation;

        Ok(GenerationReport {
            generation,
            boat_parents: boat_sel.chosen,
            pirate_parents: pirate_sel.chosen,
        })
    }

    /// Prune, self-heal, rank and pick the parents of one population.
    fn select(&mut self, kind: AgentKind) -> Result<Selection, SimError> {
        let pruned = self.lineage_mut(kind).population.prune();
        if pruned > 0 {
            log::debug!("pruned {pruned} destroyed {kind}s");
        }

        let healed = if self.lineage(kind).population.live_count() == 0 {
            log::warn!("no live {kind}s at evaluation, respawning from the last parent set");
            let seed = self.offspring(kind, self.lineage(kind).parents.as_ref());
            Some(self.spawn(kind, seed.as_ref())?)
        } else {
            None
        };
        let population = healed.as_ref().unwrap_or(&self.lineage(kind).population);

        let chosen = ParentSet {
            members: fitness::rank(population, self.mode, &self.norm)
                .into_iter()
                .take(self.mode.parent_count())
                .map(|ranked| Parent {
                    label: ranked.agent.label.clone(),
                    genome: ranked.agent.genome().clone(),
                    fitness: ranked.fitness,
                })
                .collect(),
        };

        let previous = self.lineage(kind).parents.as_ref();
        let (retained, seed) = match breeding::breed(&chosen.genomes(), self.mode, kind) {
            Ok(child) => (Some(chosen.clone()), Some(child)),
            Err(error) => {
                log::warn!("{error}; breeding from the previous parent set");
                let seed = self.offspring(kind, previous);
                (seed.as_ref().and(previous.cloned()), seed)
            }
        };

        Ok(Selection {
            chosen,
            retained,
            seed,
        })
    }

    /// Child genome bred from `parents`, or `None` to use the spawn default.
    fn offspring(&self, kind: AgentKind, parents: Option<&ParentSet>) -> Option<Genome> {
        let parents = parents?;
        match breeding::breed(&parents.genomes(), self.mode, kind) {
            Ok(child) => Some(child),
            Err(error) => {
                log::warn!("{error}; using the spawn default");
                None
            }
        }
    }

    /// Spawn a fresh population carrying `seed` (or the spawn default), mutated.
    ///
    /// An empty spawn is retried once before the population is declared collapsed.
    fn spawn(&mut self, kind: AgentKind, seed: Option<&Genome>) -> Result<Population, SimError> {
        let spec = self.cfg.population(kind).area();
        let target = SpawnTarget::Agents(kind);
        let mut handles = self.collab.spawner.regenerate(target, &spec);
        if handles.is_empty() {
            log::warn!("spawning {kind}s yielded nothing, retrying once");
            handles = self.collab.spawner.regenerate(target, &spec);
        }
        if handles.is_empty() {
            log::error!("spawning {kind}s yielded nothing twice");
            return Err(SimError::PopulationCollapse { kind });
        }
        if handles.len() < spec.count {
            log::warn!(
                "{}",
                SimError::SpawnShortfall {
                    kind,
                    requested: spec.count,
                    spawned: handles.len(),
                }
            );
        }

        let base = match seed {
            Some(genome) => genome.clone(),
            None => self.cfg.default_genome(kind),
        };
        let mut population = Population::new(kind);
        for handle in handles {
            let mut genome = base.clone();
            self.mutation.apply(&mut genome, &mut self.rng);
            population.push(Agent::new(handle.id, kind, handle.position, genome));
        }
        Ok(population)
    }

    fn regenerate_boxes(&mut self) {
        let placed = self
            .collab
            .spawner
            .regenerate(SpawnTarget::Boxes, &self.cfg.boxes);
        if placed.len() < self.cfg.boxes.count {
            log::warn!(
                "placed {} of {} boxes",
                placed.len(),
                self.cfg.boxes.count
            );
        }
    }

    fn report(&mut self, generation: u64, kind: AgentKind, chosen: &ParentSet) {
        let ranked_mode = self.mode.parent_count() > 1;
        for (i_par, parent) in chosen.members.iter().enumerate() {
            let log = &mut self.collab.log;
            retry_once("record result", || {
                log.record(&parent.genome, kind, parent.fitness)
            });

            let mut name = format!("{}-gen-{generation:04}", parent.label);
            if ranked_mode {
                name.push_str(&format!("-parent-{i_par}"));
            }
            let path = PathBuf::from(format!("{name}.msgpack"));
            let template = Template {
                label: name,
                kind,
                generation,
                fitness: parent.fitness,
                genome: parent.genome.clone(),
            };
            let templates = &mut self.collab.templates;
            retry_once("save template", || {
                templates.save_template(&template, &path)
            });
        }
    }

    fn commit(&mut self, mut boats: Population, mut pirates: Population) {
        // Events still queued belong to the outgoing generation.
        self.drain_events();
        boats.awake_all();
        pirates.awake_all();
        self.boats.population = boats;
        self.pirates.population = pirates;
        self.inbox.reset_window();
        self.phase = Phase::Spawned;
    }

    fn lineage(&self, kind: AgentKind) -> &Lineage {
        match kind {
            AgentKind::Boat => &self.boats,
            AgentKind::Pirate => &self.pirates,
        }
    }

    fn lineage_mut(&mut self, kind: AgentKind) -> &mut Lineage {
        match kind {
            AgentKind::Boat => &mut self.boats,
            AgentKind::Pirate => &mut self.pirates,
        }
    }
}
