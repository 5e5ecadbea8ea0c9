use anyhow::Context;
use clap::Parser;

use heat_relax::config::{
    SimulationConfig, DEFAULT_HEAT_POINTS, DEFAULT_HEIGHT, DEFAULT_LEAF_SIZE, DEFAULT_SEED, DEFAULT_THRESHOLD,
    DEFAULT_WIDTH,
};
use heat_relax::Simulation;

/// Headless steady-state heat relaxation on a 2D grid
#[derive(Parser, Debug)]
#[command(name = "heat_relax", version, about)]
struct Cli {
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: usize,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,

    /// Number of random heat sources (duplicates collapse)
    #[arg(long, default_value_t = DEFAULT_HEAT_POINTS)]
    heat_points: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Largest per-cell change still counted as stable
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Use the fork/join solver instead of the sequential one
    #[arg(long)]
    parallel: bool,

    /// Run the row-partitioned solver on this many in-process ranks
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Stop after this many iterations even if not stable
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Quadrant size below which the fork/join solver stops splitting
    #[arg(long, default_value_t = DEFAULT_LEAF_SIZE)]
    leaf_size: usize,

    /// Rayon worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Skip the final temperature dump
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            width: self.width,
            height: self.height,
            heat_points: self.heat_points,
            seed: self.seed,
            stability_threshold: self.threshold,
            parallel: self.parallel,
            max_iterations: self.max_iterations,
            leaf_size: self.leaf_size,
            workers: self.workers.unwrap_or(1),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        anyhow::ensure!(threads >= 1, "thread count must be at least 1");
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the rayon pool")?;
    }

    let simulation = Simulation::new(cli.config()).context("invalid simulation parameters")?;
    log::info!(
        "starting {}x{} grid with {} heat sources",
        cli.width,
        cli.height,
        simulation.grid().fixed_count()
    );

    let summary = if cli.workers.is_some() {
        simulation.run_distributed().context("distributed run aborted")?
    } else {
        simulation.run().context("run aborted")?
    };
    let summary = summary.context("a run was already in progress")?;

    println!("Computation finished in {} iterations.", summary.iterations);
    if !summary.converged {
        println!("Iteration cap reached before the grid stabilized.");
    }
    println!("Runtime: {}ms", summary.elapsed.as_millis());

    if !cli.quiet {
        print!("{}", simulation.grid());
    }
    Ok(())
}
