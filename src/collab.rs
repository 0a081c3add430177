//! Narrow interfaces to the I/O collaborators of the lifecycle manager,
//! plus their file-backed implementations.

use crate::config::AreaSpec;
use crate::genome::{AgentKind, Genome, Vec2};
use crate::population::AgentId;
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnTarget {
    Boxes,
    Agents(AgentKind),
}

/// Handle to one spawned object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawned {
    pub id: AgentId,
    pub position: Vec2,
}

/// Places objects in an area, replacing whatever the previous call placed.
///
/// May return fewer objects than `spec.count`, including none. Returned ids
/// must be unique across both agent kinds and never reused: score events
/// carry only the id.
pub trait Spawner {
    fn regenerate(&mut self, target: SpawnTarget, spec: &AreaSpec) -> Vec<Spawned>;
}

/// Append-only record of selected parents.
pub trait ResultLog {
    fn record(&mut self, genome: &Genome, kind: AgentKind, fitness: f64) -> Result<()>;
}

/// Snapshot of a selected parent, reusable as a spawn default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub label: String,
    pub kind: AgentKind,
    pub generation: u64,
    pub fitness: f64,
    pub genome: Genome,
}

pub trait TemplateStore {
    fn save_template(&mut self, template: &Template, path: &Path) -> Result<()>;
}

/// Run a collaborator call, retrying once. A second failure is logged and
/// swallowed so that the generation can still complete.
pub(crate) fn retry_once<F>(what: &str, mut op: F) -> bool
where
    F: FnMut() -> Result<()>,
{
    match op() {
        Ok(()) => true,
        Err(error) => {
            log::warn!("failed to {what}, retrying: {error:#}");
            match op() {
                Ok(()) => true,
                Err(error) => {
                    log::error!("failed to {what}: {error:#}");
                    false
                }
            }
        }
    }
}

const CSV_HEADER: &str = "Steps, RayRadius, Sight, MovingSpeed, RandomDirectionValue, \
    BoxWeight, DistanceFactor, BoatWeight, BoatDistanceFactor, EnemyWeight, \
    EnemyDistanceFactor, Fitness";

/// One CSV file per agent kind inside a results directory.
pub struct CsvResultLog {
    dir: PathBuf,
}

impl CsvResultLog {
    /// Create the directory and write a header to any file that does not exist yet.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {dir:?}"))?;
        let log = Self { dir };
        for kind in AgentKind::ALL {
            let file = log.file(kind);
            if !file.exists() {
                fs::write(&file, format!("{CSV_HEADER}\n"))
                    .with_context(|| format!("failed to write {file:?}"))?;
            }
        }
        Ok(log)
    }

    pub fn file(&self, kind: AgentKind) -> PathBuf {
        self.dir.join(format!("{kind}s.csv"))
    }
}

impl ResultLog for CsvResultLog {
    fn record(&mut self, genome: &Genome, kind: AgentKind, fitness: f64) -> Result<()> {
        let file = self.file(kind);
        let handle = OpenOptions::new()
            .append(true)
            .open(&file)
            .with_context(|| format!("failed to open {file:?}"))?;
        let mut writer = BufWriter::new(handle);
        writeln!(
            writer,
            "{}, {}, {}, {}, X:{} Y:{}, {}, {}, {}, {}, {}, {}, {}",
            genome.step_count,
            genome.ray_radius,
            genome.sight,
            genome.moving_speed,
            genome.random_direction.x,
            genome.random_direction.y,
            genome.box_weight,
            genome.distance_factor,
            genome.boat_weight,
            genome.boat_distance_factor,
            genome.enemy_weight,
            genome.enemy_distance_factor,
            fitness,
        )
        .context("failed to write row")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

/// Stores templates as MessagePack files under a directory.
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {dir:?}"))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read back a template written by [`TemplateStore::save_template`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Template> {
        let file = self.dir.join(path.as_ref());
        let bytes = fs::read(&file).with_context(|| format!("failed to read {file:?}"))?;
        rmp_serde::from_slice(&bytes).context("failed to deserialize template")
    }
}

impl TemplateStore for FileTemplateStore {
    fn save_template(&mut self, template: &Template, path: &Path) -> Result<()> {
        let file = self.dir.join(path);
        let handle = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(handle);
        encode::write_named(&mut writer, template).context("failed to serialize template")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
