//! Job lifecycle types.
//!
//! A job is one robot errand: bring a cart to a vehicle, retrieve it,
//! recharge or stow it, or send the robot home to recharge itself.

use crate::domain::error::{DomainError, DomainResult};

/// What a robot is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    BringCharger,
    RetrieveCharger,
    RechargeCharger,
    StowCharger,
    RechargeSelf,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BringCharger => "BRING_CHARGER",
            Self::RetrieveCharger => "RETRIEVE_CHARGER",
            Self::RechargeCharger => "RECHARGE_CHARGER",
            Self::StowCharger => "STOW_CHARGER",
            Self::RechargeSelf => "RECHARGE_SELF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BRING_CHARGER" => Some(Self::BringCharger),
            "RETRIEVE_CHARGER" => Some(Self::RetrieveCharger),
            "RECHARGE_CHARGER" => Some(Self::RechargeCharger),
            "STOW_CHARGER" => Some(Self::StowCharger),
            "RECHARGE_SELF" => Some(Self::RechargeSelf),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a job stands in its lifecycle.
///
/// ```text
/// OPEN ──(assign)──► PENDING ──(fetch)──► ONGOING ──► COMPLETE | FAILED
///   └────────────────────┴─────(booking canceled)──────► CANCELED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Open,
    Pending,
    Ongoing,
    Complete,
    Failed,
    Canceled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Pending => "PENDING",
            Self::Ongoing => "ONGOING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "PENDING" => Some(Self::Pending),
            "ONGOING" => Some(Self::Ongoing),
            "COMPLETE" => Some(Self::Complete),
            "FAILED" => Some(Self::Failed),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// A job in one of these states still holds resources.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Open | Self::Pending | Self::Ongoing)
    }

    /// Allowed lifecycle edges.
    pub fn may_become(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Pending)
                | (Self::Pending, Self::Ongoing)
                | (Self::Ongoing, Self::Complete)
                | (Self::Ongoing, Self::Failed)
                | (Self::Open, Self::Canceled)
                | (Self::Pending, Self::Canceled)
                | (Self::Ongoing, Self::Canceled)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome a robot reports for its current job via `UpdateJobMonitor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failure,
    Recovery,
    Ongoing,
}

impl JobStatus {
    /// Parse a robot-reported status string. Anything unknown is a
    /// protocol violation, not a soft default.
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "Success" => Ok(Self::Success),
            "Failure" => Ok(Self::Failure),
            "Recovery" => Ok(Self::Recovery),
            "Ongoing" => Ok(Self::Ongoing),
            other => Err(DomainError::Protocol(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_roundtrip() {
        for ty in [
            JobType::BringCharger,
            JobType::RetrieveCharger,
            JobType::RechargeCharger,
            JobType::StowCharger,
            JobType::RechargeSelf,
        ] {
            assert_eq!(JobType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(JobType::parse("bring_charger"), None);
    }

    #[test]
    fn lifecycle_edges() {
        assert!(JobState::Open.may_become(JobState::Pending));
        assert!(JobState::Pending.may_become(JobState::Ongoing));
        assert!(JobState::Ongoing.may_become(JobState::Complete));
        assert!(JobState::Ongoing.may_become(JobState::Failed));
        for state in [JobState::Open, JobState::Pending, JobState::Ongoing] {
            assert!(state.may_become(JobState::Canceled));
        }
        // No resurrection of settled jobs.
        assert!(!JobState::Complete.may_become(JobState::Open));
        assert!(!JobState::Canceled.may_become(JobState::Pending));
        assert!(!JobState::Open.may_become(JobState::Ongoing));
    }

    #[test]
    fn live_states() {
        assert!(JobState::Open.is_live());
        assert!(JobState::Pending.is_live());
        assert!(JobState::Ongoing.is_live());
        assert!(!JobState::Complete.is_live());
        assert!(!JobState::Failed.is_live());
        assert!(!JobState::Canceled.is_live());
    }

    #[test]
    fn unknown_status_is_protocol_violation() {
        assert!(JobStatus::parse("Success").is_ok());
        assert!(matches!(
            JobStatus::parse("Done"),
            Err(DomainError::Protocol(_))
        ));
    }
}
