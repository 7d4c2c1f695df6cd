use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::directory::{InMemoryDirectory, MemberRecord};
use crate::registry::{Shift, ShiftStatus};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct SeedMember {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub manager: bool,
    #[serde(default)]
    pub qualifications: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SeedShift {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location_id: Uuid,
    pub template_id: Uuid,
    #[serde(default)]
    pub required_qualification: Option<Uuid>,
    /// Confirmed to this member when present, OPEN otherwise.
    #[serde(default)]
    pub assignee: Option<Uuid>,
}

/// Initial roster loaded by the server binary: who works here, and the
/// shifts the (out-of-scope) generation process produced.
#[derive(Debug, Deserialize)]
pub struct SeedData {
    pub members: Vec<SeedMember>,
    #[serde(default)]
    pub shifts: Vec<SeedShift>,
}

impl SeedData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn into_parts(self) -> (InMemoryDirectory, Vec<Shift>) {
        let mut directory = InMemoryDirectory::new();
        for member in self.members {
            directory.insert(MemberRecord {
                id: member.id,
                full_name: member.full_name,
                manager: member.manager,
                qualifications: member.qualifications.into_iter().collect::<HashSet<_>>(),
            });
        }

        let shifts = self
            .shifts
            .into_iter()
            .map(|s| {
                let status = if s.assignee.is_some() {
                    ShiftStatus::Confirmed
                } else {
                    ShiftStatus::Open
                };
                Shift {
                    id: s.id,
                    date: s.date,
                    start_time: s.start_time,
                    end_time: s.end_time,
                    location_id: s.location_id,
                    template_id: s.template_id,
                    required_qualification: s.required_qualification,
                    status,
                    assignee: s.assignee,
                    vacated_by: None,
                }
            })
            .collect();

        (directory, shifts)
    }
}
