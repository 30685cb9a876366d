use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blocktrace::cost::{from_milli, CostModel};
use blocktrace::search::{Snapshot, Variant};
use blocktrace::solver::{replay, solve, Problem};
use blocktrace::{io, RunSettings, Strategy};

#[derive(Debug, Parser)]
#[command(name = "blocktrace", about = "Paint a target image with block-partition edits", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Solve a target and write the instruction program.
    Solve {
        /// target image (png)
        target: PathBuf,
        /// initial block layout (json); a single white block when absent
        #[arg(long)]
        initial: Option<PathBuf>,
        /// run settings (json); defaults when absent or malformed
        #[arg(long, default_value = "settings.json")]
        settings: PathBuf,
        /// program output; stdout when absent
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        seconds: Option<f64>,
        #[arg(long)]
        iterations: Option<u64>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        #[arg(long, value_enum)]
        variant: Option<Variant>,
        #[arg(long)]
        tile: Option<u32>,
        /// write the effective settings back to the settings file
        #[arg(long)]
        save_settings: bool,
    },

    /// Replay a program against a target and print its score.
    Score {
        target: PathBuf,
        program: PathBuf,
        #[arg(long)]
        initial: Option<PathBuf>,
        #[arg(long, default_value = "settings.json")]
        settings: PathBuf,
    },
}

fn load_problem(target: &PathBuf, initial: Option<&PathBuf>, settings: &RunSettings) -> Result<(Problem, Vec<blocktrace::InitialBlock>)> {
    let canvas = io::load_target(target).with_context(|| format!("loading target {}", target.display()))?;
    let blocks = io::load_initial(initial.map(|p| p.as_path()), canvas.height(), canvas.width())
        .context("loading initial layout")?;
    let model = CostModel::new(settings.costs, canvas.height(), canvas.width());
    Ok((Problem::new(canvas, model), blocks))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // name rayon workers once at startup
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    match Cli::parse().command {
        Commands::Solve {
            target,
            initial,
            settings: settings_path,
            out,
            seconds,
            iterations,
            seed,
            strategy,
            variant,
            tile,
            save_settings,
        } => {
            let mut settings = RunSettings::load(&settings_path);
            if let Some(v) = seconds {
                settings.seconds = v;
            }
            if iterations.is_some() {
                settings.iterations = iterations;
            }
            if let Some(v) = seed {
                settings.seed = v;
            }
            if let Some(v) = strategy {
                settings.strategy = v;
            }
            if let Some(v) = variant {
                settings.variant = v;
            }
            if let Some(v) = tile {
                settings.tile = v;
            }
            if save_settings {
                settings.save(&settings_path).context("saving settings")?;
            }

            let (problem, blocks) = load_problem(&target, initial.as_ref(), &settings)?;
            info!(height = problem.model.height, width = problem.model.width, blocks = blocks.len(), "target loaded");

            // ctrl-c stops the search; the best partition found so far is still written
            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)).context("installing ctrl-c handler")?;
            let (tx, rx) = mpsc::channel::<Snapshot>();
            let handle = thread::Builder::new()
                .name("search".to_owned())
                .spawn(move || solve(&problem, &blocks, &settings, cancel, Some(tx)))
                .context("spawning search thread")?;

            // snapshots arrive until the worker drops its sender
            for snap in rx {
                info!(iteration = snap.iteration, total = from_milli(snap.total), layers = snap.layers.len(), "progress");
            }
            let solution = handle
                .join()
                .map_err(|_| anyhow!("search thread panicked"))?
                .context("solving")?;

            match out {
                Some(path) => io::write_program(&path, &solution.instructions).context("writing program")?,
                None => print!("{}", blocktrace::instruction::format_program(&solution.instructions)),
            }
            info!(score = solution.score, cost = solution.cost, similarity = solution.similarity, "done");
        }

        Commands::Score { target, program, initial, settings } => {
            let settings = RunSettings::load(&settings);
            let (problem, blocks) = load_problem(&target, initial.as_ref(), &settings)?;
            let program = io::read_program(&program).context("reading program")?;
            let painter = replay(&problem, &blocks, &program).context("replaying program")?;
            println!(
                "score {} (cost {}, similarity {})",
                painter.total_score(&problem.canvas),
                painter.cost(),
                painter.similarity(&problem.canvas)
            );
        }
    }
    Ok(())
}
