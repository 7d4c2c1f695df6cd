use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Active,
    Awarded,
    Lost,
    Retracted,
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidStatus::Active => write!(f, "ACTIVE"),
            BidStatus::Awarded => write!(f, "AWARDED"),
            BidStatus::Lost => write!(f, "LOST"),
            BidStatus::Retracted => write!(f, "RETRACTED"),
        }
    }
}

/// A member's claim of interest in a shift that is open for bidding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftBid {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub member_id: Uuid,
    pub status: BidStatus,
    pub note: Option<String>,
    pub placed_at: DateTime<Utc>,
}

impl ShiftBid {
    pub fn new(shift_id: Uuid, member_id: Uuid, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            shift_id,
            member_id,
            status: BidStatus::Active,
            note,
            placed_at: Utc::now(),
        }
    }
}
