//! Monotonic pipeline clock

use tokio::time::Instant;

/// Seconds elapsed since the pipeline started.
///
/// Backed by the tokio clock, so readings never decrease and follow paused
/// time in tests.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
