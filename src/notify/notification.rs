use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
    Archived,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Unread => write!(f, "UNREAD"),
            NotificationStatus::Read => write!(f, "READ"),
            NotificationStatus::Archived => write!(f, "ARCHIVED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ShiftAssigned,
    BidPlaced,
    BidAwarded,
    BidLost,
    SwapRequested,
    SwapAccepted,
    SwapResolved,
    SolveFinished,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::ShiftAssigned => write!(f, "SHIFT_ASSIGNED"),
            NotificationKind::BidPlaced => write!(f, "BID_PLACED"),
            NotificationKind::BidAwarded => write!(f, "BID_AWARDED"),
            NotificationKind::BidLost => write!(f, "BID_LOST"),
            NotificationKind::SwapRequested => write!(f, "SWAP_REQUESTED"),
            NotificationKind::SwapAccepted => write!(f, "SWAP_ACCEPTED"),
            NotificationKind::SwapResolved => write!(f, "SWAP_RESOLVED"),
            NotificationKind::SolveFinished => write!(f, "SOLVE_FINISHED"),
        }
    }
}

/// One event delivered to one user. Fan-out creates one record per
/// recipient; delivery is at-least-once, so duplicates are possible and the
/// record is the source of truth for read/archive state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    /// The shift, bid or change request the event concerns.
    pub related_entity_id: Option<Uuid>,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        kind: NotificationKind,
        message: impl Into<String>,
        related_entity_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind,
            message: message.into(),
            related_entity_id,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
        }
    }
}
