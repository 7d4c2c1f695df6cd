use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Result, RosterError};
use crate::exchange::request::{ChangeStatus, RespondAction, ShiftChangeRequest};
use crate::outcome::Outcome;

/// All shift change requests, keyed by request id.
///
/// The book owns the request state machine; the swap itself is committed by
/// the engine through the shift store in the same critical section as the
/// manager approval.
#[derive(Debug, Default)]
pub struct ExchangeBook {
    requests: HashMap<Uuid, ShiftChangeRequest>,
}

impl ExchangeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request: ShiftChangeRequest) {
        self.requests.insert(request.id, request);
    }

    pub fn get(&self, id: Uuid) -> Option<&ShiftChangeRequest> {
        self.requests.get(&id)
    }

    /// Target member's decision. ACCEPT forwards the request to the manager
    /// stage; REJECT is terminal.
    pub fn respond(
        &mut self,
        request_id: Uuid,
        action: RespondAction,
        actor: Uuid,
    ) -> Result<Outcome<ShiftChangeRequest>> {
        let request = self
            .requests
            .get(&request_id)
            .ok_or_else(|| RosterError::not_found("change request", request_id))?;
        if request.target_member_id != actor {
            return Err(RosterError::Unauthorized { actor });
        }

        // Retries of a decision that already landed are reported as such.
        match (action, request.status) {
            (RespondAction::Accept, ChangeStatus::PendingManagerApproval) => {
                return Ok(Outcome::already(request.clone()));
            }
            (RespondAction::Reject, ChangeStatus::Rejected) => {
                return Ok(Outcome::already(request.clone()));
            }
            _ => {}
        }
        if request.status != ChangeStatus::PendingTargetApproval {
            return Err(RosterError::invalid_transition(
                "PENDING_TARGET_APPROVAL",
                request.status,
            ));
        }

        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = match action {
                RespondAction::Accept => ChangeStatus::PendingManagerApproval,
                RespondAction::Reject => ChangeStatus::Rejected,
            };
            tracing::info!(
                request_id = %request_id,
                status = %request.status,
                "Change request response recorded"
            );
            Ok(Outcome::applied(request.clone()))
        } else {
            Err(RosterError::not_found("change request", request_id))
        }
    }

    /// Terminal approval, recorded after the swap committed.
    pub fn mark_approved(
        &mut self,
        request_id: Uuid,
        notes: Option<String>,
    ) -> Result<ShiftChangeRequest> {
        self.finalize(request_id, ChangeStatus::Approved, notes)
    }

    /// Terminal rejection, by manager decision or failed re-validation.
    pub fn mark_rejected(
        &mut self,
        request_id: Uuid,
        notes: Option<String>,
    ) -> Result<ShiftChangeRequest> {
        self.finalize(request_id, ChangeStatus::Rejected, notes)
    }

    fn finalize(
        &mut self,
        request_id: Uuid,
        status: ChangeStatus,
        notes: Option<String>,
    ) -> Result<ShiftChangeRequest> {
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = status;
            if notes.is_some() {
                request.resolution_notes = notes;
            }
            tracing::info!(request_id = %request_id, status = %status, "Change request resolved");
            Ok(request.clone())
        } else {
            Err(RosterError::not_found("change request", request_id))
        }
    }

    /// Initiator withdraws a request still pending at either stage.
    pub fn cancel(&mut self, request_id: Uuid, actor: Uuid) -> Result<Outcome<ShiftChangeRequest>> {
        let request = self
            .requests
            .get(&request_id)
            .ok_or_else(|| RosterError::not_found("change request", request_id))?;
        if request.initiating_member_id != actor {
            return Err(RosterError::Unauthorized { actor });
        }
        if request.status == ChangeStatus::Cancelled {
            return Ok(Outcome::already(request.clone()));
        }
        if !request.status.is_pending() {
            return Err(RosterError::invalid_transition(
                "PENDING_TARGET_APPROVAL or PENDING_MANAGER_APPROVAL",
                request.status,
            ));
        }

        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = ChangeStatus::Cancelled;
            tracing::info!(request_id = %request_id, "Change request cancelled");
            Ok(Outcome::applied(request.clone()))
        } else {
            Err(RosterError::not_found("change request", request_id))
        }
    }

    /// Requests a member initiated or is targeted by, newest first.
    pub fn requests_for_member(&self, member_id: Uuid) -> Vec<&ShiftChangeRequest> {
        let mut requests: Vec<&ShiftChangeRequest> = self
            .requests
            .values()
            .filter(|r| r.involves(member_id))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Requests awaiting a manager decision, oldest first.
    pub fn pending_manager_queue(&self) -> Vec<&ShiftChangeRequest> {
        let mut requests: Vec<&ShiftChangeRequest> = self
            .requests
            .values()
            .filter(|r| r.status == ChangeStatus::PendingManagerApproval)
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        requests
    }

    /// True when either shift is referenced by a request still pending.
    pub fn has_pending_for_shift(&self, shift_id: Uuid) -> bool {
        self.requests.values().any(|r| {
            r.status.is_pending()
                && (r.initiating_shift_id == shift_id || r.target_shift_id == shift_id)
        })
    }
}
