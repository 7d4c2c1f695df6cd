use std::time::Duration;

/// Configuration for external solver job tracking.
///
/// Polling is the sole source of truth for job progress: the tracker never
/// relies on solver callbacks. A job that produces no terminal status within
/// `max_duration` is surfaced to callers as timed out, not silently dropped.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Upper bound on the random delay added before the first poll,
    /// so concurrent jobs do not poll in lockstep
    pub poll_jitter: Duration,
    /// Give up waiting for a terminal status after this long
    pub max_duration: Duration,
    /// Consecutive transient poll failures tolerated before giving up
    pub max_poll_failures: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_jitter: Duration::from_millis(500),
            max_duration: Duration::from_secs(15 * 60),
            max_poll_failures: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub solver: SolverConfig,
    /// Capacity of the notification delivery queue. Records are always
    /// persisted; only transport delivery is dropped when the queue is full.
    pub notify_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            notify_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.solver.poll_interval = interval;
        self
    }

    pub fn with_solver_max_duration(mut self, max: Duration) -> Self {
        self.solver.max_duration = max;
        self
    }

    pub fn with_poll_jitter(mut self, jitter: Duration) -> Self {
        self.solver.poll_jitter = jitter;
        self
    }
}
