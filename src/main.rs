use anyhow::{Context, Result};
use buccaneer::manager::Manager;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create {
        #[arg(long, default_value_t = 10)]
        generations: u64,
    },

    Resume {
        #[arg(long)]
        run_idx: usize,

        #[arg(long, default_value_t = 10)]
        generations: u64,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create { generations } => mgr.create_run(generations)?,
        Command::Resume {
            run_idx,
            generations,
        } => mgr.resume_run(run_idx, generations)?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
