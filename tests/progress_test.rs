use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use heat_relax::{Simulation, SimulationConfig};

/// Keeps every info-or-louder message so the test can count them.
struct CaptureLog;

static LOGGER: CaptureLog = CaptureLog;
static RECORDS: Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

impl Log for CaptureLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            RECORDS.lock().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn take_progress_lines() -> Vec<String> {
    RECORDS
        .lock()
        .drain(..)
        .filter(|line| line.contains("completed iteration"))
        .collect()
}

fn expected_lines(worker: usize, iterations: usize) -> Vec<String> {
    (1..=iterations)
        .map(|i| format!("worker {} completed iteration {}", worker, i))
        .collect()
}

fn small_config() -> SimulationConfig {
    SimulationConfig {
        width: 12,
        height: 9,
        heat_points: 4,
        ..Default::default()
    }
}

// A single test: the logger is process-wide and other runs would mix in.
#[test]
fn test_every_iteration_logs_a_progress_line() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let sequential = Simulation::new(small_config()).unwrap();
    let summary = sequential.run().unwrap().unwrap();
    assert!(summary.iterations > 0);
    assert_eq!(take_progress_lines(), expected_lines(0, summary.iterations));

    let parallel = Simulation::new(SimulationConfig { parallel: true, ..small_config() }).unwrap();
    let summary = parallel.run().unwrap().unwrap();
    assert_eq!(take_progress_lines(), expected_lines(0, summary.iterations));

    // ranks log from their own threads, so only per-rank order is fixed
    let distributed = Simulation::new(SimulationConfig { workers: 3, ..small_config() }).unwrap();
    let summary = distributed.run_distributed().unwrap().unwrap();
    let lines = take_progress_lines();
    assert_eq!(lines.len(), 3 * summary.iterations);
    for rank in 0..3 {
        let prefix = format!("worker {} ", rank);
        let own: Vec<String> = lines.iter().filter(|line| line.starts_with(&prefix)).cloned().collect();
        assert_eq!(own, expected_lines(rank, summary.iterations));
    }

    println!("✓ One progress line per iteration for every solver!");
}
