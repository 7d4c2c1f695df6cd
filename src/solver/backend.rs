use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::directory::Directory;
use crate::error::{Result, RosterError};
use crate::registry::{ShiftStatus, ShiftStore};
use crate::solver::job::SolverStatus;

/// The external constraint-solving optimizer, reached over a start/poll
/// protocol. Transport failures surface as `SolverUnavailable`, distinct
/// from a job that starts and then legitimately reports BROKEN.
#[async_trait]
pub trait SolverBackend: Send + Sync {
    /// Start one optimization run for a (year, month) window.
    async fn submit(&self, year: i32, month: u32) -> Result<String>;

    async fn status(&self, job_id: &str) -> Result<SolverStatus>;

    /// Bulk assignments, available once the job reports a result-bearing
    /// terminal status.
    async fn result(&self, job_id: &str) -> Result<Vec<(Uuid, Uuid)>>;
}

/// In-process stand-in for the external optimizer: fills the window's OPEN
/// shifts round-robin over qualified members. Fairness and constraint
/// satisfaction belong to the real solver; this backend only makes the full
/// solve path exercisable without one.
pub struct RoundRobinSolver {
    directory: Arc<dyn Directory>,
    shifts: Arc<RwLock<ShiftStore>>,
    runs: std::sync::Mutex<HashMap<String, Vec<(Uuid, Uuid)>>>,
}

impl RoundRobinSolver {
    pub fn new(directory: Arc<dyn Directory>, shifts: Arc<RwLock<ShiftStore>>) -> Self {
        Self {
            directory,
            shifts,
            runs: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SolverBackend for RoundRobinSolver {
    async fn submit(&self, year: i32, month: u32) -> Result<String> {
        let (first, last) = month_bounds(year, month)
            .ok_or_else(|| RosterError::SolverUnavailable(format!("invalid window {year}-{month}")))?;

        let mut members = self.directory.member_ids();
        members.sort();

        let shifts = self.shifts.read().await;
        let window: Vec<_> = shifts
            .in_range(first, last)
            .into_iter()
            .filter(|s| s.status == ShiftStatus::Open)
            .cloned()
            .collect();
        drop(shifts);

        let mut assignments = Vec::new();
        let mut cursor = 0usize;
        for shift in window {
            if members.is_empty() {
                break;
            }
            for _ in 0..members.len() {
                let candidate = members[cursor % members.len()];
                cursor += 1;
                let qualified = shift
                    .required_qualification
                    .map(|q| self.directory.has_qualification(candidate, q))
                    .unwrap_or(true);
                if qualified {
                    assignments.push((shift.id, candidate));
                    break;
                }
            }
        }

        let job_id = Uuid::new_v4().to_string();
        if let Ok(mut runs) = self.runs.lock() {
            runs.insert(job_id.clone(), assignments);
        }
        tracing::info!(job_id = %job_id, year, month, "Round-robin solve computed");
        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<SolverStatus> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| RosterError::SolverUnavailable("solver state poisoned".into()))?;
        if runs.contains_key(job_id) {
            Ok(SolverStatus::Feasible)
        } else {
            Err(RosterError::not_found("solver job", job_id))
        }
    }

    async fn result(&self, job_id: &str) -> Result<Vec<(Uuid, Uuid)>> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| RosterError::SolverUnavailable("solver state poisoned".into()))?;
        runs.get(job_id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("solver job", job_id))
    }
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_december_rolls_over() {
        let (first, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn month_bounds_rejects_bad_month() {
        assert!(month_bounds(2025, 13).is_none());
        assert!(month_bounds(2025, 0).is_none());
    }
}
