use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    SolvingScheduled,
    SolvingActive,
    Feasible,
    Unfeasible,
    Broken,
    NotSolving,
}

impl SolverStatus {
    /// Statuses from which no further transition is defined. FEASIBLE and
    /// NOT_SOLVING carry a result; UNFEASIBLE and BROKEN do not.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SolverStatus::Feasible
                | SolverStatus::Unfeasible
                | SolverStatus::Broken
                | SolverStatus::NotSolving
        )
    }

    /// Terminal with assignments to apply.
    pub fn has_result(self) -> bool {
        matches!(self, SolverStatus::Feasible | SolverStatus::NotSolving)
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverStatus::SolvingScheduled => write!(f, "SOLVING_SCHEDULED"),
            SolverStatus::SolvingActive => write!(f, "SOLVING_ACTIVE"),
            SolverStatus::Feasible => write!(f, "FEASIBLE"),
            SolverStatus::Unfeasible => write!(f, "UNFEASIBLE"),
            SolverStatus::Broken => write!(f, "BROKEN"),
            SolverStatus::NotSolving => write!(f, "NOT_SOLVING"),
        }
    }
}

/// Handle to one external optimization run for one scheduling window.
/// Held only for the polling window, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverJob {
    pub job_id: String,
    pub year: i32,
    pub month: u32,
    pub status: SolverStatus,
    pub started_at: DateTime<Utc>,
}

impl SolverJob {
    pub fn new(job_id: String, year: i32, month: u32) -> Self {
        Self {
            job_id,
            year,
            month,
            status: SolverStatus::SolvingScheduled,
            started_at: Utc::now(),
        }
    }
}
