use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bidding::{BidBook, BidStatus, ShiftBid};
use crate::config::EngineConfig;
use crate::directory::Directory;
use crate::error::{Result, RosterError};
use crate::exchange::{
    ChangeStatus, ExchangeBook, ResolveAction, RespondAction, ShiftChangeRequest,
};
use crate::notify::{Dispatcher, Notification, NotificationKind, NotificationTransport};
use crate::outcome::Outcome;
use crate::registry::{Shift, ShiftStore};
use crate::solver::{JobTracker, SolverBackend, SolverJob, SolverStatus};

/// Central coordinator for shift occupancy, bidding, exchanges, solver runs
/// and notifications.
///
/// Stores are shared behind `RwLock`s; commands that touch more than one
/// store take their write locks in a fixed order (shifts, then bids, then
/// requests) and hold them for the whole critical section, so `swap` and
/// `award` are all-or-nothing to every concurrent reader. Notification
/// records are written after the locks are released; delivery failure never
/// rolls back a mutation.
#[derive(Clone)]
pub struct Engine {
    pub config: EngineConfig,
    pub shifts: Arc<RwLock<ShiftStore>>,
    pub bids: Arc<RwLock<BidBook>>,
    pub requests: Arc<RwLock<ExchangeBook>>,
    pub tracker: JobTracker,
    pub dispatcher: Dispatcher,
    directory: Arc<dyn Directory>,
    solver: Arc<dyn SolverBackend>,
    transport: Arc<dyn NotificationTransport>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        directory: Arc<dyn Directory>,
        solver: Arc<dyn SolverBackend>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self::with_shift_store(
            config,
            Arc::new(RwLock::new(ShiftStore::new())),
            directory,
            solver,
            transport,
        )
    }

    /// Build around an existing shift store. Used when a collaborator (such
    /// as the in-process demo solver) needs a handle to the same store.
    pub fn with_shift_store(
        config: EngineConfig,
        shifts: Arc<RwLock<ShiftStore>>,
        directory: Arc<dyn Directory>,
        solver: Arc<dyn SolverBackend>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.notify_queue_capacity);
        Self {
            config,
            shifts,
            bids: Arc::new(RwLock::new(BidBook::new())),
            requests: Arc::new(RwLock::new(ExchangeBook::new())),
            tracker: JobTracker::new(),
            dispatcher,
            directory,
            solver,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn seed_shifts(&self, shifts: impl IntoIterator<Item = Shift>) {
        let mut store = self.shifts.write().await;
        for shift in shifts {
            store.insert(shift);
        }
    }

    /// Start background work: the notification delivery loop. Solver pollers
    /// are spawned per job by `start_solve`.
    pub fn start(&self) {
        self.dispatcher
            .spawn_delivery(self.transport.clone(), self.cancel.clone());
    }

    /// Stop background tasks. In-flight solver pollers release their windows
    /// and exit; the delivery loop drains and stops.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ------------------------------------------------------------------
    // Shift registry commands
    // ------------------------------------------------------------------

    /// Assign an OPEN shift to a member.
    pub async fn assign(
        &self,
        shift_id: Uuid,
        member_id: Uuid,
        actor: Uuid,
    ) -> Result<Outcome<Shift>> {
        self.require_manager(actor)?;
        let outcome = {
            let mut shifts = self.shifts.write().await;
            shifts.assign(shift_id, member_id, self.directory.as_ref())?
        };
        if outcome.applied && member_id != actor {
            self.dispatcher
                .emit(
                    &[member_id],
                    NotificationKind::ShiftAssigned,
                    &format!(
                        "You have been assigned the shift on {}",
                        outcome.value.date
                    ),
                    Some(shift_id),
                )
                .await;
        }
        Ok(outcome)
    }

    /// Vacate a CONFIRMED shift and open it to bids. A bid awarded in a
    /// previous bidding round is retired in the same critical section, so at
    /// most one AWARDED bid per shift ever exists.
    pub async fn open_for_bidding(&self, shift_id: Uuid, actor: Uuid) -> Result<Outcome<Shift>> {
        self.require_manager(actor)?;
        let mut shifts = self.shifts.write().await;
        let mut bids = self.bids.write().await;
        let outcome = shifts.open_for_bidding(shift_id)?;
        if outcome.applied {
            bids.retire_awarded(shift_id);
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Bidding market
    // ------------------------------------------------------------------

    /// Place a bid on a shift open for bidding.
    pub async fn place_bid(
        &self,
        shift_id: Uuid,
        actor: Uuid,
        note: Option<String>,
    ) -> Result<ShiftBid> {
        if !self.directory.is_member(actor) {
            return Err(RosterError::not_found("member", actor));
        }
        let bid = {
            let shifts = self.shifts.read().await;
            let mut bids = self.bids.write().await;
            let shift = shifts
                .get(shift_id)
                .ok_or_else(|| RosterError::not_found("shift", shift_id))?;
            if shift.status != crate::registry::ShiftStatus::Bidding {
                return Err(RosterError::invalid_transition("BIDDING", shift.status));
            }
            if shift.vacated_by == Some(actor) {
                return Err(RosterError::invalid_transition(
                    "a bidder other than the member who vacated the shift",
                    format!("prior assignee {actor}"),
                ));
            }
            bids.place(shift_id, actor, note)?
        };
        let managers: Vec<Uuid> = self
            .directory
            .manager_ids()
            .into_iter()
            .filter(|m| *m != actor)
            .collect();
        self.dispatcher
            .emit(
                &managers,
                NotificationKind::BidPlaced,
                "A new bid was placed on a shift open for bidding",
                Some(shift_id),
            )
            .await;
        Ok(bid)
    }

    /// Withdraw an active bid.
    pub async fn retract_bid(&self, bid_id: Uuid, actor: Uuid) -> Result<Outcome<ShiftBid>> {
        let mut bids = self.bids.write().await;
        bids.retract(bid_id, actor)
    }

    /// Award a BIDDING shift to one active bid. Exactly one award per shift
    /// can succeed; every other active bid is marked LOST in the same
    /// critical section.
    pub async fn award(
        &self,
        shift_id: Uuid,
        bid_id: Uuid,
        actor: Uuid,
    ) -> Result<Outcome<(Shift, ShiftBid)>> {
        self.require_manager(actor)?;
        let (shift, winner, losers) = {
            let mut shifts = self.shifts.write().await;
            let mut bids = self.bids.write().await;

            let bid = bids
                .get(bid_id)
                .cloned()
                .ok_or_else(|| RosterError::not_found("bid", bid_id))?;
            if bid.shift_id != shift_id {
                return Err(RosterError::invalid_transition(
                    format!("a bid on shift {shift_id}"),
                    format!("a bid on shift {}", bid.shift_id),
                ));
            }
            if bid.status == BidStatus::Awarded {
                if let Some(shift) = shifts.get(shift_id) {
                    if shift.is_owned_by(bid.member_id) {
                        return Ok(Outcome::already((shift.clone(), bid)));
                    }
                }
            }
            if bid.status != BidStatus::Active {
                return Err(RosterError::invalid_transition("ACTIVE", bid.status));
            }

            let shift = shifts.confirm_from_bid(shift_id, bid.member_id)?;
            let (winner, losers) = bids.settle_award(shift_id, bid_id)?;
            (shift, winner, losers)
        };

        if winner.member_id != actor {
            self.dispatcher
                .emit(
                    &[winner.member_id],
                    NotificationKind::BidAwarded,
                    &format!("Your bid was awarded: shift on {}", shift.date),
                    Some(shift_id),
                )
                .await;
        }
        let losers: Vec<Uuid> = losers.into_iter().filter(|m| *m != actor).collect();
        self.dispatcher
            .emit(
                &losers,
                NotificationKind::BidLost,
                &format!("Your bid on the shift on {} was not selected", shift.date),
                Some(shift_id),
            )
            .await;
        Ok(Outcome::applied((shift, winner)))
    }

    // ------------------------------------------------------------------
    // Exchange workflow
    // ------------------------------------------------------------------

    /// Propose swapping two confirmed shifts. The actor must own the
    /// initiating shift; the target member owns the other side.
    pub async fn create_change_request(
        &self,
        initiating_shift_id: Uuid,
        target_shift_id: Uuid,
        actor: Uuid,
        reason: Option<String>,
    ) -> Result<ShiftChangeRequest> {
        let request = {
            let shifts = self.shifts.read().await;
            let mut requests = self.requests.write().await;

            if initiating_shift_id == target_shift_id {
                return Err(RosterError::invalid_transition(
                    "two distinct shifts",
                    "the same shift on both sides",
                ));
            }
            let initiating = shifts
                .get(initiating_shift_id)
                .ok_or_else(|| RosterError::not_found("shift", initiating_shift_id))?;
            let target = shifts
                .get(target_shift_id)
                .ok_or_else(|| RosterError::not_found("shift", target_shift_id))?;

            let initiating_member = initiating.assignee.ok_or_else(|| {
                RosterError::invalid_transition("CONFIRMED", initiating.status)
            })?;
            let target_member = target
                .assignee
                .ok_or_else(|| RosterError::invalid_transition("CONFIRMED", target.status))?;
            if initiating_member != actor {
                return Err(RosterError::Unauthorized { actor });
            }
            if initiating_member == target_member {
                return Err(RosterError::invalid_transition(
                    "shifts owned by two distinct members",
                    "both owned by the same member",
                ));
            }
            let today = Utc::now().date_naive();
            if initiating.date < today || target.date < today {
                return Err(RosterError::invalid_transition(
                    "both shift dates in the future",
                    "a shift whose date has passed",
                ));
            }

            let request = ShiftChangeRequest::new(
                initiating_shift_id,
                initiating_member,
                target_shift_id,
                target_member,
                reason,
            );
            tracing::info!(
                request_id = %request.id,
                initiating_shift = %initiating_shift_id,
                target_shift = %target_shift_id,
                "Change request created"
            );
            requests.insert(request.clone());
            request
        };

        self.dispatcher
            .emit(
                &[request.target_member_id],
                NotificationKind::SwapRequested,
                "A colleague proposed swapping shifts with you",
                Some(request.id),
            )
            .await;
        Ok(request)
    }

    /// Target member accepts or rejects a proposed swap.
    pub async fn respond_change_request(
        &self,
        request_id: Uuid,
        action: RespondAction,
        actor: Uuid,
    ) -> Result<Outcome<ShiftChangeRequest>> {
        let outcome = {
            let mut requests = self.requests.write().await;
            requests.respond(request_id, action, actor)?
        };
        if outcome.applied {
            match action {
                RespondAction::Accept => {
                    let managers: Vec<Uuid> = self
                        .directory
                        .manager_ids()
                        .into_iter()
                        .filter(|m| *m != actor)
                        .collect();
                    self.dispatcher
                        .emit(
                            &managers,
                            NotificationKind::SwapAccepted,
                            "A shift swap was accepted by both members and awaits approval",
                            Some(request_id),
                        )
                        .await;
                }
                RespondAction::Reject => {
                    self.dispatcher
                        .emit(
                            &[outcome.value.initiating_member_id],
                            NotificationKind::SwapResolved,
                            "Your swap request was declined by the other member",
                            Some(request_id),
                        )
                        .await;
                }
            }
        }
        Ok(outcome)
    }

    /// Manager decision on a target-accepted swap. APPROVE re-validates
    /// ownership of both shifts and commits the swap in the same critical
    /// section; if ownership moved since the request was raised, the request
    /// is rejected with a system note and both shifts are left untouched.
    pub async fn resolve_change_request(
        &self,
        request_id: Uuid,
        action: ResolveAction,
        actor: Uuid,
        notes: Option<String>,
    ) -> Result<Outcome<ShiftChangeRequest>> {
        self.require_manager(actor)?;
        let (outcome, swapped) = {
            let mut shifts = self.shifts.write().await;
            let mut requests = self.requests.write().await;

            let request = requests
                .get(request_id)
                .cloned()
                .ok_or_else(|| RosterError::not_found("change request", request_id))?;

            match (action, request.status) {
                (ResolveAction::Approve, ChangeStatus::Approved)
                | (ResolveAction::Reject, ChangeStatus::Rejected) => {
                    (Outcome::already(request), false)
                }
                (_, status) if status != ChangeStatus::PendingManagerApproval => {
                    return Err(RosterError::invalid_transition(
                        "PENDING_MANAGER_APPROVAL",
                        status,
                    ));
                }
                (ResolveAction::Reject, _) => {
                    let request = requests.mark_rejected(request_id, notes)?;
                    (Outcome::applied(request), false)
                }
                (ResolveAction::Approve, _) => {
                    match shifts.swap(
                        request.initiating_shift_id,
                        request.initiating_member_id,
                        request.target_shift_id,
                        request.target_member_id,
                    ) {
                        Ok(_) => {
                            let request = requests.mark_approved(request_id, notes)?;
                            (Outcome::applied(request), true)
                        }
                        Err(RosterError::StaleOwnership { shift_id, .. }) => {
                            let note = format!(
                                "Rejected automatically: ownership of shift {shift_id} changed after the request was raised"
                            );
                            tracing::warn!(
                                request_id = %request_id,
                                shift_id = %shift_id,
                                "Swap approval hit stale ownership; rejecting request"
                            );
                            let request = requests.mark_rejected(request_id, Some(note))?;
                            (Outcome::applied(request), false)
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        };

        if outcome.applied {
            let request = &outcome.value;
            match request.status {
                ChangeStatus::Approved if swapped => {
                    let recipients: Vec<Uuid> = [
                        request.initiating_member_id,
                        request.target_member_id,
                    ]
                    .into_iter()
                    .filter(|m| *m != actor)
                    .collect();
                    self.dispatcher
                        .emit(
                            &recipients,
                            NotificationKind::SwapResolved,
                            "Your shift swap was approved",
                            Some(request_id),
                        )
                        .await;
                }
                _ => {
                    let recipients: Vec<Uuid> = [request.initiating_member_id]
                        .into_iter()
                        .filter(|m| *m != actor)
                        .collect();
                    self.dispatcher
                        .emit(
                            &recipients,
                            NotificationKind::SwapResolved,
                            "Your shift swap request was rejected",
                            Some(request_id),
                        )
                        .await;
                }
            }
        }
        Ok(outcome)
    }

    /// Initiator withdraws a still-pending request.
    pub async fn cancel_change_request(
        &self,
        request_id: Uuid,
        actor: Uuid,
    ) -> Result<Outcome<ShiftChangeRequest>> {
        let mut requests = self.requests.write().await;
        requests.cancel(request_id, actor)
    }

    // ------------------------------------------------------------------
    // Solver job tracking
    // ------------------------------------------------------------------

    /// Start an external solve for one (year, month) window and spawn its
    /// poller. At most one non-terminal job per window.
    pub async fn start_solve(&self, year: i32, month: u32, actor: Uuid) -> Result<SolverJob> {
        self.require_manager(actor)?;
        if !(1..=12).contains(&month) {
            return Err(RosterError::invalid_transition(
                "a calendar month between 1 and 12",
                month,
            ));
        }

        self.tracker.reserve_window(year, month).await?;
        let job_id = match self.solver.submit(year, month).await {
            Ok(job_id) => job_id,
            Err(e) => {
                self.tracker.release_window(year, month).await;
                return Err(match e {
                    RosterError::SolverUnavailable(_) => e,
                    other => RosterError::SolverUnavailable(other.to_string()),
                });
            }
        };

        let job = SolverJob::new(job_id, year, month);
        self.tracker.track(job.clone()).await;
        tracing::info!(job_id = %job.job_id, year, month, "Solver job started");

        let engine = self.clone();
        let poll_job = job.clone();
        tokio::spawn(async move {
            engine.solver_poll_loop(poll_job, actor).await;
        });
        Ok(job)
    }

    /// Last observed status of a tracked job. Non-blocking; the poller task
    /// is the only caller of the external backend.
    pub async fn poll_solver_status(&self, job_id: &str) -> Result<SolverStatus> {
        self.tracker.poll_status(job_id).await
    }

    /// Poll the backend until the job reaches a terminal status, the
    /// configured maximum duration elapses, or the engine shuts down.
    /// Result-bearing terminal statuses replay their assignments through the
    /// registry, each one independently re-validated.
    async fn solver_poll_loop(&self, job: SolverJob, actor: Uuid) {
        let cfg = self.config.solver.clone();
        let job_id = job.job_id.clone();

        let jitter_ms = cfg.poll_jitter.as_millis() as u64;
        if jitter_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let started = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(cfg.poll_interval);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(job_id = %job_id, "Solver poller stopped by shutdown");
                    self.tracker.release_window(job.year, job.month).await;
                    return;
                }
                _ = interval.tick() => {}
            }

            if started.elapsed() > cfg.max_duration {
                self.tracker.mark_timed_out(&job_id).await;
                self.tracker.release_window(job.year, job.month).await;
                self.dispatcher
                    .emit(
                        &[actor],
                        NotificationKind::SolveFinished,
                        &format!(
                            "Scheduling run for {}-{:02} produced no result in time and was abandoned",
                            job.year, job.month
                        ),
                        None,
                    )
                    .await;
                return;
            }

            let status = match self.solver.status(&job_id).await {
                Ok(status) => status,
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        job_id = %job_id,
                        error = %e,
                        failures,
                        "Solver status poll failed"
                    );
                    if failures >= cfg.max_poll_failures {
                        self.tracker.mark_timed_out(&job_id).await;
                        self.tracker.release_window(job.year, job.month).await;
                        self.dispatcher
                            .emit(
                                &[actor],
                                NotificationKind::SolveFinished,
                                &format!(
                                    "Scheduling run for {}-{:02} was abandoned: solver unreachable",
                                    job.year, job.month
                                ),
                                None,
                            )
                            .await;
                        return;
                    }
                    // Linear backoff on top of the base interval.
                    tokio::time::sleep(cfg.poll_interval * failures).await;
                    continue;
                }
            };

            failures = 0;
            self.tracker.record_status(&job_id, status).await;
            if !status.is_terminal() {
                continue;
            }

            let message = if status.has_result() {
                match self.solver.result(&job_id).await {
                    Ok(assignments) => {
                        let (applied, skipped) = self.apply_assignments(&assignments, actor).await;
                        format!(
                            "Scheduling run for {}-{:02} finished: {applied} assignments applied, {skipped} skipped",
                            job.year, job.month
                        )
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Solver result fetch failed");
                        format!(
                            "Scheduling run for {}-{:02} finished but its result could not be retrieved",
                            job.year, job.month
                        )
                    }
                }
            } else {
                format!(
                    "Scheduling run for {}-{:02} found no solution ({status})",
                    job.year, job.month
                )
            };

            self.tracker.release_window(job.year, job.month).await;
            self.dispatcher
                .emit(&[actor], NotificationKind::SolveFinished, &message, None)
                .await;
            return;
        }
    }

    /// Replay solver assignments through the registry. Each assignment is
    /// validated like any manual one and races concurrent commands under the
    /// per-store lock; a loser is skipped, never retried blindly.
    async fn apply_assignments(&self, assignments: &[(Uuid, Uuid)], actor: Uuid) -> (usize, usize) {
        let mut applied = 0usize;
        let mut skipped = 0usize;
        for &(shift_id, member_id) in assignments {
            let result = {
                let mut shifts = self.shifts.write().await;
                shifts.assign(shift_id, member_id, self.directory.as_ref())
            };
            match result {
                Ok(outcome) => {
                    applied += 1;
                    if outcome.applied && member_id != actor {
                        self.dispatcher
                            .emit(
                                &[member_id],
                                NotificationKind::ShiftAssigned,
                                &format!(
                                    "You have been assigned the shift on {}",
                                    outcome.value.date
                                ),
                                Some(shift_id),
                            )
                            .await;
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        shift_id = %shift_id,
                        member_id = %member_id,
                        error = %e,
                        "Solver assignment skipped"
                    );
                }
            }
        }
        (applied, skipped)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub async fn mark_notification_read(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<Outcome<Notification>> {
        self.dispatcher.mark_read(id, actor).await
    }

    pub async fn archive_notification(
        &self,
        id: Uuid,
        actor: Uuid,
    ) -> Result<Outcome<Notification>> {
        self.dispatcher.archive(id, actor).await
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn shift(&self, shift_id: Uuid) -> Result<Shift> {
        let shifts = self.shifts.read().await;
        shifts
            .get(shift_id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("shift", shift_id))
    }

    pub async fn shifts_in_range(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Vec<Shift> {
        let shifts = self.shifts.read().await;
        shifts.in_range(start, end).into_iter().cloned().collect()
    }

    pub async fn open_bidding_shifts(&self) -> Vec<Shift> {
        let shifts = self.shifts.read().await;
        shifts
            .open_for_bidding_shifts()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn bids_for_shift(&self, shift_id: Uuid) -> Result<Vec<ShiftBid>> {
        let shifts = self.shifts.read().await;
        if shifts.get(shift_id).is_none() {
            return Err(RosterError::not_found("shift", shift_id));
        }
        drop(shifts);
        let bids = self.bids.read().await;
        Ok(bids.bids_for_shift(shift_id).into_iter().cloned().collect())
    }

    /// A member's own bids, each paired with its shift.
    pub async fn my_bids(&self, member_id: Uuid) -> Vec<(ShiftBid, Shift)> {
        // Lock order: shifts before bids, same as every writer.
        let shifts = self.shifts.read().await;
        let bids = self.bids.read().await;
        bids.member_bids(member_id)
            .into_iter()
            .filter_map(|bid| shifts.get(bid.shift_id).map(|s| (bid.clone(), s.clone())))
            .collect()
    }

    pub async fn my_change_requests(&self, member_id: Uuid) -> Vec<ShiftChangeRequest> {
        let requests = self.requests.read().await;
        requests
            .requests_for_member(member_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn pending_change_requests(&self, actor: Uuid) -> Result<Vec<ShiftChangeRequest>> {
        self.require_manager(actor)?;
        let requests = self.requests.read().await;
        Ok(requests
            .pending_manager_queue()
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn notifications_for(&self, actor: Uuid) -> Vec<Notification> {
        self.dispatcher.for_recipient(actor).await
    }

    pub async fn active_notifications_for(&self, actor: Uuid) -> Vec<Notification> {
        self.dispatcher.active_for_recipient(actor).await
    }

    pub async fn unread_count(&self, actor: Uuid) -> usize {
        self.dispatcher.unread_count(actor).await
    }

    pub async fn member_name(&self, member_id: Uuid) -> Option<String> {
        self.directory.member_name(member_id)
    }

    fn require_manager(&self, actor: Uuid) -> Result<()> {
        if self.directory.has_manager_capability(actor) {
            Ok(())
        } else {
            Err(RosterError::Unauthorized { actor })
        }
    }
}
