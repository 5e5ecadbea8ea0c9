use std::time::Instant;

use heat_relax::config::{
    DEFAULT_HEAT_POINTS, DEFAULT_HEIGHT, DEFAULT_LEAF_SIZE, DEFAULT_MAX_ITERATIONS, DEFAULT_SEED, DEFAULT_THRESHOLD,
    DEFAULT_WIDTH,
};
use heat_relax::implementations::distributed;
use heat_relax::implementations::fork_join::{self, ForkJoin, Scheduler};
use heat_relax::implementations::single;
use heat_relax::{Grid, HeatResult};

const EPSILON: f64 = 1e-10;

// Runs every solver variant on the default grid and checks they agree.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let grid = Grid::initialize(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_HEAT_POINTS, DEFAULT_SEED)?;
    println!("=== solver comparison: {}x{}, {} sources ===", grid.width(), grid.height(), grid.fixed_count());
    println!();

    let runs = vec![
        ("sequential", run_sequential as fn(&Grid) -> HeatResult<(Grid, usize)>),
        ("fork/join", run_fork_join),
        ("fork/join inline", run_fork_join_inline),
        ("distributed x1", run_distributed_1),
        ("distributed x4", run_distributed_4),
    ];

    let mut reference: Option<Grid> = None;
    for (name, run) in runs {
        let start = Instant::now();
        let (result, iterations) = run(&grid)?;
        let elapsed = start.elapsed();

        let max_diff = reference
            .as_ref()
            .map(|r| r.data().iter().zip(result.data()).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max));

        println!("{}:", name);
        println!("  iterations: {}", iterations);
        println!("  runtime:    {:?}", elapsed);
        match max_diff {
            Some(d) if d <= EPSILON => println!("  matches sequential (max diff {:e})", d),
            Some(d) => println!("  DIFFERS from sequential (max diff {:e})", d),
            None => {}
        }
        let (w, h) = (result.width(), result.height());
        println!("  corners: {:.3} {:.3} {:.3} {:.3}", result.read(0, 0), result.read(w - 1, 0), result.read(0, h - 1), result.read(w - 1, h - 1));
        println!();

        reference.get_or_insert(result);
    }

    Ok(())
}

fn run_sequential(grid: &Grid) -> HeatResult<(Grid, usize)> {
    single::run(grid.clone(), DEFAULT_THRESHOLD)
}

fn run_fork_join(grid: &Grid) -> HeatResult<(Grid, usize)> {
    fork_join::run(grid.clone(), DEFAULT_THRESHOLD)
}

fn run_fork_join_inline(grid: &Grid) -> HeatResult<(Grid, usize)> {
    let solver = ForkJoin::new(DEFAULT_LEAF_SIZE, Scheduler::Inline)?;
    Ok(fork_join::run_with_observer(grid.clone(), DEFAULT_THRESHOLD, solver, None, |_, _| {})?.into_parts())
}

fn run_distributed_1(grid: &Grid) -> HeatResult<(Grid, usize)> {
    distributed::run(grid, 1, DEFAULT_THRESHOLD, DEFAULT_MAX_ITERATIONS)
}

fn run_distributed_4(grid: &Grid) -> HeatResult<(Grid, usize)> {
    distributed::run(grid, 4, DEFAULT_THRESHOLD, DEFAULT_MAX_ITERATIONS)
}
