use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("invalid transition: expected {expected}, found {actual}")]
    InvalidTransition { expected: String, actual: String },

    #[error("stale ownership on shift {shift_id}: {detail}")]
    StaleOwnership { shift_id: Uuid, detail: String },

    #[error("member {member_id} already has an active bid on shift {shift_id}")]
    DuplicateBid { shift_id: Uuid, member_id: Uuid },

    #[error("member {member_id} lacks required qualification {qualification_id}")]
    QualificationMismatch {
        member_id: Uuid,
        qualification_id: Uuid,
    },

    #[error("a solver job is already running for {year}-{month:02}")]
    JobAlreadyRunning { year: i32, month: u32 },

    #[error("actor {actor} is not permitted to perform this operation")]
    Unauthorized { actor: Uuid },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("solver unavailable: {0}")]
    SolverUnavailable(String),

    #[error("solver job {job_id} exceeded the maximum solve duration")]
    SolverTimedOut { job_id: String },
}

impl RosterError {
    pub fn invalid_transition(
        expected: impl Into<String>,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable discriminator, used by the HTTP layer and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::StaleOwnership { .. } => "STALE_OWNERSHIP",
            Self::DuplicateBid { .. } => "DUPLICATE_BID",
            Self::QualificationMismatch { .. } => "QUALIFICATION_MISMATCH",
            Self::JobAlreadyRunning { .. } => "JOB_ALREADY_RUNNING",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SolverUnavailable(_) => "SOLVER_UNAVAILABLE",
            Self::SolverTimedOut { .. } => "SOLVER_TIMED_OUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
