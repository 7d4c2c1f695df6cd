use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    PendingTargetApproval,
    PendingManagerApproval,
    Approved,
    Rejected,
    Cancelled,
}

impl ChangeStatus {
    /// Both approval stages; everything else is terminal.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ChangeStatus::PendingTargetApproval | ChangeStatus::PendingManagerApproval
        )
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::PendingTargetApproval => write!(f, "PENDING_TARGET_APPROVAL"),
            ChangeStatus::PendingManagerApproval => write!(f, "PENDING_MANAGER_APPROVAL"),
            ChangeStatus::Approved => write!(f, "APPROVED"),
            ChangeStatus::Rejected => write!(f, "REJECTED"),
            ChangeStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Target member's decision on a swap proposed against their shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RespondAction {
    Accept,
    Reject,
}

/// Manager's decision on a target-accepted swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveAction {
    Approve,
    Reject,
}

/// A proposed swap between two confirmed shifts owned by two members.
///
/// Ownership recorded here is a snapshot from creation time; it is
/// re-validated against the registry when the manager approves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftChangeRequest {
    pub id: Uuid,
    pub initiating_shift_id: Uuid,
    pub initiating_member_id: Uuid,
    pub target_shift_id: Uuid,
    pub target_member_id: Uuid,
    pub status: ChangeStatus,
    pub reason: Option<String>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ShiftChangeRequest {
    pub fn new(
        initiating_shift_id: Uuid,
        initiating_member_id: Uuid,
        target_shift_id: Uuid,
        target_member_id: Uuid,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            initiating_shift_id,
            initiating_member_id,
            target_shift_id,
            target_member_id,
            status: ChangeStatus::PendingTargetApproval,
            reason,
            resolution_notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, member_id: Uuid) -> bool {
        self.initiating_member_id == member_id || self.target_member_id == member_id
    }
}
