use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{Result, RosterError};
use crate::solver::job::{SolverJob, SolverStatus};

#[derive(Debug, Clone)]
struct TrackedJob {
    job: SolverJob,
    timed_out: bool,
}

#[derive(Debug, Default)]
struct TrackerState {
    jobs: HashMap<String, TrackedJob>,
    /// Windows with a non-terminal job; blocks duplicate solves.
    active_windows: HashSet<(i32, u32)>,
}

/// Bookkeeping for external solver runs.
///
/// Polling the external backend and applying results is the engine poller's
/// job; the tracker only answers "what is the last observed status" and
/// enforces one running job per scheduling window. Terminal jobs stay
/// queryable until a new solve for the same window replaces them.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a scheduling window before submitting to the backend, so two
    /// concurrent solve starts cannot both pass the duplicate check.
    pub async fn reserve_window(&self, year: i32, month: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.active_windows.insert((year, month)) {
            return Err(RosterError::JobAlreadyRunning { year, month });
        }
        Ok(())
    }

    /// Release a claimed window: submission failed, or the job reached a
    /// terminal status or timed out.
    pub async fn release_window(&self, year: i32, month: u32) {
        let mut state = self.state.write().await;
        state.active_windows.remove(&(year, month));
    }

    /// Start tracking a submitted job, evicting any finished job left over
    /// from a previous solve of the same window.
    pub async fn track(&self, job: SolverJob) {
        let mut state = self.state.write().await;
        let window = (job.year, job.month);
        state
            .jobs
            .retain(|_, t| (t.job.year, t.job.month) != window);
        state.jobs.insert(
            job.job_id.clone(),
            TrackedJob {
                job,
                timed_out: false,
            },
        );
    }

    pub async fn record_status(&self, job_id: &str, status: SolverStatus) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.jobs.get_mut(job_id) {
            if tracked.job.status != status {
                tracing::info!(job_id = %job_id, from = %tracked.job.status, to = %status, "Solver job status changed");
            }
            tracked.job.status = status;
        }
    }

    pub async fn mark_timed_out(&self, job_id: &str) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.jobs.get_mut(job_id) {
            tracked.timed_out = true;
            tracing::warn!(job_id = %job_id, "Solver job timed out without a terminal status");
        }
    }

    /// Last observed status. Non-blocking: the poller task talks to the
    /// backend, callers only read what it recorded.
    pub async fn poll_status(&self, job_id: &str) -> Result<SolverStatus> {
        let state = self.state.read().await;
        let tracked = state
            .jobs
            .get(job_id)
            .ok_or_else(|| RosterError::not_found("solver job", job_id))?;
        if tracked.timed_out {
            return Err(RosterError::SolverTimedOut {
                job_id: job_id.to_string(),
            });
        }
        Ok(tracked.job.status)
    }

    pub async fn job(&self, job_id: &str) -> Option<SolverJob> {
        let state = self.state.read().await;
        state.jobs.get(job_id).map(|t| t.job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_window_blocks_duplicates() {
        let tracker = JobTracker::new();
        tracker.reserve_window(2025, 11).await.unwrap();

        let err = tracker.reserve_window(2025, 11).await.unwrap_err();
        assert_eq!(
            err,
            RosterError::JobAlreadyRunning {
                year: 2025,
                month: 11
            }
        );

        // A different window is unaffected.
        tracker.reserve_window(2025, 12).await.unwrap();
    }

    #[tokio::test]
    async fn release_window_allows_new_solve() {
        let tracker = JobTracker::new();
        tracker.reserve_window(2025, 11).await.unwrap();
        tracker.release_window(2025, 11).await;
        tracker.reserve_window(2025, 11).await.unwrap();
    }

    #[tokio::test]
    async fn poll_status_reports_recorded_progress() {
        let tracker = JobTracker::new();
        tracker
            .track(SolverJob::new("job-1".into(), 2025, 11))
            .await;

        assert_eq!(
            tracker.poll_status("job-1").await.unwrap(),
            SolverStatus::SolvingScheduled
        );

        tracker
            .record_status("job-1", SolverStatus::SolvingActive)
            .await;
        assert_eq!(
            tracker.poll_status("job-1").await.unwrap(),
            SolverStatus::SolvingActive
        );
    }

    #[tokio::test]
    async fn poll_status_unknown_job_is_not_found() {
        let tracker = JobTracker::new();
        let err = tracker.poll_status("nope").await.unwrap_err();
        assert!(matches!(err, RosterError::NotFound { .. }));
    }

    #[tokio::test]
    async fn timed_out_job_surfaces_as_timeout() {
        let tracker = JobTracker::new();
        tracker
            .track(SolverJob::new("job-1".into(), 2025, 11))
            .await;
        tracker.mark_timed_out("job-1").await;

        let err = tracker.poll_status("job-1").await.unwrap_err();
        assert!(matches!(err, RosterError::SolverTimedOut { .. }));
    }

    #[tokio::test]
    async fn tracking_a_new_window_job_evicts_the_finished_one() {
        let tracker = JobTracker::new();
        tracker
            .track(SolverJob::new("old".into(), 2025, 11))
            .await;
        tracker.record_status("old", SolverStatus::Feasible).await;

        tracker
            .track(SolverJob::new("new".into(), 2025, 11))
            .await;
        assert!(tracker.job("old").await.is_none());
        assert!(tracker.job("new").await.is_some());
    }
}
