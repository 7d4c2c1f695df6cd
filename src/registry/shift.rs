use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Open,
    Bidding,
    Confirmed,
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShiftStatus::Open => write!(f, "OPEN"),
            ShiftStatus::Bidding => write!(f, "BIDDING"),
            ShiftStatus::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// One schedulable work slot at a location/time, optionally requiring a
/// qualification.
///
/// Status and assignee move together: `Confirmed` iff `assignee` is set.
/// Only [`ShiftStore`](super::ShiftStore) writes either field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Uuid,
    pub template_id: Uuid,
    pub required_qualification: Option<Uuid>,
    pub status: ShiftStatus,
    pub assignee: Option<Uuid>,
    /// The member who held the shift when it was last opened for bidding.
    /// Excluded from bidding on their own vacated shift.
    pub vacated_by: Option<Uuid>,
}

impl Shift {
    pub fn new(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        location_id: Uuid,
        template_id: Uuid,
        required_qualification: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            start_time,
            end_time,
            location_id,
            template_id,
            required_qualification,
            status: ShiftStatus::Open,
            assignee: None,
            vacated_by: None,
        }
    }

    pub fn is_owned_by(&self, member_id: Uuid) -> bool {
        self.status == ShiftStatus::Confirmed && self.assignee == Some(member_id)
    }
}
