use crate::error::SimError;
use crate::fitness::{FitnessMode, Normalization};
use crate::genome::{AgentKind, Genome, Vec2};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub evolution: EvolutionConfig,
    pub schedule: ScheduleConfig,
    pub boat: PopulationConfig,
    pub pirate: PopulationConfig,
    pub boxes: AreaSpec,
    #[serde(default)]
    pub arena: ArenaConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Bound of the random delta applied to a mutated trait.
    pub mutation_factor: f64,
    /// Per-trait probability of mutation.
    pub mutation_chance: f64,
    pub fitness_mode: FitnessMode,
    /// Score that maps to a fitness of 1.
    pub target_points: f64,
    /// Weight sum that maps to a fitness of 1.
    pub target_weights_total: f64,
    /// Seed every generation transition restarts the random stream from.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    6
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Length of one simulation window in seconds.
    pub simulation_timer: f64,
    /// Simulated seconds per tick.
    pub tick: f64,
}

/// Rectangle objects are placed in, and how many of them to place.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AreaSpec {
    pub count: usize,
    pub origin: Vec2,
    pub size: Vec2,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub count: usize,
    pub origin: Vec2,
    pub size: Vec2,
    /// Spawn-default genome. Falls back to the built-in default of the kind.
    #[serde(default)]
    pub genome: Option<Genome>,
}

/// Knobs of the stand-in arena that produces score events.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub seed: u64,
    /// Points a boat earns per box.
    pub boat_box_points: f64,
    /// Points a pirate earns per box.
    pub pirate_box_points: f64,
    /// Points a pirate earns per boat caught.
    pub boat_points: f64,
    /// Base per-second chance of picking up a box.
    pub pickup_chance: f64,
    /// Base per-second chance of a pirate catching a boat.
    pub catch_chance: f64,
}

impl PopulationConfig {
    pub fn area(&self) -> AreaSpec {
        AreaSpec {
            count: self.count,
            origin: self.origin,
            size: self.size,
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            boat_box_points: 1.0,
            pirate_box_points: 0.1,
            boat_points: 5.0,
            pickup_chance: 0.5,
            catch_chance: 0.05,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Performs validation on all parameters
    /// before returning.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter, reporting the first problem as a configuration error.
    pub fn validate(&self) -> Result<(), SimError> {
        self.check()
            .map_err(|err| SimError::Configuration(format!("{err:#}")))
    }

    fn check(&self) -> Result<()> {
        let evo = &self.evolution;
        check_num(evo.mutation_factor, 0.0..1.0).context("invalid mutation factor")?;
        check_num(evo.mutation_chance, 0.0..=1.0).context("invalid mutation chance")?;
        Normalization::new(evo.target_points, evo.target_weights_total)
            .context("invalid normalisation constants")?;

        let sched = &self.schedule;
        check_num(sched.simulation_timer, f64::MIN_POSITIVE..1e6)
            .context("invalid simulation timer")?;
        check_num(sched.tick, f64::MIN_POSITIVE..=sched.simulation_timer)
            .context("invalid tick duration")?;

        let n_parents = evo.fitness_mode.parent_count();
        for kind in AgentKind::ALL {
            let pop = self.population(kind);
            check_num(pop.count, 1..100_000)
                .with_context(|| format!("invalid number of {kind}s"))?;
            if n_parents > pop.count {
                bail!(
                    "{:?} needs {n_parents} parents, but only {} {kind}s are spawned",
                    evo.fitness_mode,
                    pop.count
                );
            }
            check_area(&pop.area()).with_context(|| format!("invalid {kind} area"))?;
        }
        check_num(self.boxes.count, 0..100_000).context("invalid number of boxes")?;
        check_area(&self.boxes).context("invalid box area")?;

        check_num(self.arena.pickup_chance, 0.0..=1.0).context("invalid pickup chance")?;
        check_num(self.arena.catch_chance, 0.0..=1.0).context("invalid catch chance")?;

        Ok(())
    }

    pub fn population(&self, kind: AgentKind) -> &PopulationConfig {
        match kind {
            AgentKind::Boat => &self.boat,
            AgentKind::Pirate => &self.pirate,
        }
    }

    pub fn default_genome(&self, kind: AgentKind) -> Genome {
        let mut genome = self
            .population(kind)
            .genome
            .clone()
            .unwrap_or_else(|| Genome::default_for(kind));
        genome.reset_for_birth();
        genome
    }

    pub fn normalization(&self) -> Result<Normalization, SimError> {
        Normalization::new(
            self.evolution.target_points,
            self.evolution.target_weights_total,
        )
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_area(area: &AreaSpec) -> Result<()> {
    for side in [area.size.x, area.size.y] {
        check_num(side, 0.0..1e6).context("invalid area size")?;
    }
    if !area.origin.x.is_finite() || !area.origin.y.is_finite() {
        bail!("area origin must be finite");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) const EXAMPLE: &str = r#"
[evolution]
mutation_factor = 0.1
mutation_chance = 0.3
fitness_mode = "points"
target_points = 10.0
target_weights_total = 3.0

[schedule]
simulation_timer = 1.0
tick = 0.25

[boat]
count = 3
origin = { x = 0.0, y = 0.0 }
size = { x = 50.0, y = 50.0 }

[pirate]
count = 3
origin = { x = 60.0, y = 0.0 }
size = { x = 20.0, y = 50.0 }

[boxes]
count = 40
origin = { x = 0.0, y = 0.0 }
size = { x = 80.0, y = 50.0 }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_parses_with_defaults() {
        let cfg = Config::from_toml(EXAMPLE).unwrap();
        assert_eq!(cfg.evolution.seed, 6);
        assert_eq!(cfg.evolution.fitness_mode, FitnessMode::Points);
        assert_eq!(cfg.arena, ArenaConfig::default());
        assert_eq!(
            cfg.default_genome(AgentKind::Boat),
            Genome::default_for(AgentKind::Boat)
        );
    }

    #[test]
    fn zero_target_points_fails_validation() {
        let mut cfg = Config::from_toml(EXAMPLE).unwrap();
        cfg.evolution.target_points = 0.0;
        assert!(matches!(cfg.validate(), Err(SimError::Configuration(_))));

        let text = EXAMPLE.replace("target_points = 10.0", "target_points = 0.0");
        let err = Config::from_toml(&text).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimError>(),
            Some(SimError::Configuration(_))
        ));
    }

    #[test]
    fn parent_count_must_fit_population() {
        let mut cfg = Config::from_toml(EXAMPLE).unwrap();
        cfg.evolution.fitness_mode = FitnessMode::RankedOnPoints;
        cfg.pirate.count = 1;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("parents"), "{err}");
    }

    #[test]
    fn tick_longer_than_window_is_rejected() {
        let mut cfg = Config::from_toml(EXAMPLE).unwrap();
        cfg.schedule.tick = 2.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn genome_table_overrides_spawn_default() {
        let text = EXAMPLE.replace(
            "[pirate]\n",
            "[pirate]\ngenome = { step_count = 0, ray_radius = 2.0, sight = 3.0, moving_speed = 4.0, \
             random_direction = { x = 0.0, y = 1.0 }, box_weight = 0.0, distance_factor = 1.0, \
             boat_weight = 2.0, boat_distance_factor = 1.0, enemy_weight = 0.0, \
             enemy_distance_factor = 0.0 }\n",
        );
        let cfg = Config::from_toml(&text).unwrap();
        let genome = cfg.default_genome(AgentKind::Pirate);
        assert_eq!(genome.sight, 3.0);
        assert_eq!(genome.weights_total(), 2.0);
    }
}
