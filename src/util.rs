use std::time::{Duration, Instant};

/// Logs how long a run took when dropped.
pub struct Timed {
    name: &'static str,
    start: Instant,
}

impl Timed {
    pub fn info(name: &'static str) -> Self {
        log::debug!("{}...", name);
        Timed {
            name,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        log::info!("{}: {:.3?}", self.name, self.start.elapsed());
    }
}
