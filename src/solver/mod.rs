pub mod backend;
pub mod job;
pub mod tracker;

pub use backend::{RoundRobinSolver, SolverBackend};
pub use job::{SolverJob, SolverStatus};
pub use tracker::JobTracker;
