use crate::arena::Arena;
use crate::collab::{CsvResultLog, FileTemplateStore};
use crate::config::Config;
use crate::lifecycle::{Checkpoint, Collaborators, Lifecycle};
use crate::scheduler::Scheduler;
use crate::score;
use anyhow::{Context, Result, bail};
use glob::glob;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

type FileLifecycle = Lifecycle<Arena, CsvResultLog, FileTemplateStore>;

/// Maps simulation directories and runs onto lifecycle/scheduler pairs.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self, generations: u64) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut lifecycle = self
            .build_lifecycle(&run_dir, None)
            .context("failed to build lifecycle")?;
        let mut scheduler = Scheduler::new(self.cfg.schedule.simulation_timer);
        scheduler
            .start(&mut lifecycle)
            .context("failed to start simulation")?;

        self.run_generations(&run_dir, &mut lifecycle, &mut scheduler, generations)
    }

    pub fn resume_run(&self, run_idx: usize, generations: u64) -> Result<()> {
        let run_dir = self.run_dir(run_idx);
        if !run_dir.is_dir() {
            bail!("{run_dir:?} does not exist");
        }

        let checkpoint_file = self.checkpoint_file(run_idx);
        let checkpoint = load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if checkpoint.cfg != self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        log::info!("loaded {checkpoint_file:?}");

        let mut lifecycle = self
            .build_lifecycle(&run_dir, Some(checkpoint))
            .context("failed to build lifecycle")?;
        let mut scheduler = Scheduler::new(self.cfg.schedule.simulation_timer);
        scheduler
            .resume(&mut lifecycle)
            .context("failed to resume simulation")?;

        self.run_generations(&run_dir, &mut lifecycle, &mut scheduler, generations)
    }

    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn build_lifecycle(
        &self,
        run_dir: &Path,
        checkpoint: Option<Checkpoint>,
    ) -> Result<FileLifecycle> {
        let (sender, inbox) = score::channel();
        let collab = Collaborators {
            spawner: Arena::new(self.cfg.arena.clone(), sender),
            log: CsvResultLog::new(run_dir).context("failed to construct result log")?,
            templates: FileTemplateStore::new(run_dir.join("templates"))
                .context("failed to construct template store")?,
        };
        let lifecycle = match checkpoint {
            None => Lifecycle::new(self.cfg.clone(), collab, inbox)?,
            Some(checkpoint) => Lifecycle::from_checkpoint(checkpoint, collab, inbox)?,
        };
        Ok(lifecycle)
    }

    fn run_generations(
        &self,
        run_dir: &Path,
        lifecycle: &mut FileLifecycle,
        scheduler: &mut Scheduler,
        generations: u64,
    ) -> Result<()> {
        let dt = self.cfg.schedule.tick;
        let mut completed = 0;
        while completed < generations {
            let agents: Vec<_> = lifecycle.live_agents().cloned().collect();
            lifecycle.collaborators_mut().spawner.step(dt, &agents);

            let outcome = scheduler
                .tick(dt, &mut *lifecycle)
                .context("simulation halted")?;
            if outcome.report.is_some() {
                completed += 1;
                let progress = 100.0 * completed as f64 / generations as f64;
                log::info!("completed {progress:06.2}%");
            }
        }
        scheduler.stop(&mut *lifecycle);

        let checkpoint_file = run_dir.join("checkpoint.msgpack");
        save_checkpoint(&lifecycle.checkpoint(), &checkpoint_file)
            .with_context(|| format!("failed to save {checkpoint_file:?}"))?;

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }
}

/// Save a checkpoint of the parent sets and generation counter.
pub fn save_checkpoint<P: AsRef<Path>>(checkpoint: &Checkpoint, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, checkpoint).context("failed to serialize checkpoint")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Load a previously saved checkpoint.
pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Checkpoint> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let checkpoint = decode::from_read(&mut reader).context("failed to deserialize checkpoint")?;
    Ok(checkpoint)
}
