//! Asynchronous hand-off between RPC handlers and the planner tick.
//!
//! RPC handlers run in parallel with the planner but never touch its
//! state directly. Each mutating handler enqueues a request and answers
//! from the shared snapshot maps immediately; the planner drains the
//! queue at a fixed point in every tick, so each queued mutation sees a
//! fully reconciled planning store.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::{DomainResult, JobStatus, JobType, PluginState};
use crate::infrastructure::database::entities::job;

/// Wire form of a job, as handed to a robot. Empty strings mean
/// "no job".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDetails {
    pub job_id: i32,
    pub job_type: String,
    pub charging_type: String,
    pub robot_name: String,
    pub cart: String,
    pub source_station: String,
    pub target_station: String,
}

impl JobDetails {
    pub fn none_for(robot: &str) -> Self {
        Self {
            robot_name: robot.to_string(),
            ..Self::default()
        }
    }

    pub fn from_job(job: &job::Model) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type.clone(),
            charging_type: job.charging_type.clone().unwrap_or_default(),
            robot_name: job.robot_name.clone().unwrap_or_default(),
            cart: job.cart_name.clone().unwrap_or_default(),
            source_station: job.source_station.clone().unwrap_or_default(),
            target_station: job.target_station.clone().unwrap_or_default(),
        }
    }
}

/// Snapshot of a robot's live assignment, readable by RPC handlers.
#[derive(Debug, Clone)]
pub struct AssignedJob {
    pub job_id: i32,
    pub job_type: JobType,
    pub booking_id: Option<i64>,
}

/// State shared between the planner (single writer) and the RPC
/// handlers (snapshot readers). Reads may lag by one tick.
#[derive(Default)]
pub struct SharedState {
    /// Jobs prepared for pickup, keyed by robot.
    pub prepared_jobs: DashMap<String, JobDetails>,
    /// Live assignment per robot.
    pub assignments: DashMap<String, AssignedJob>,
    /// Plug-in handshake state per booking.
    pub plugin_states: DashMap<i64, PluginState>,
}

/// A queued mutation, applied by the planner while draining.
#[derive(Debug)]
pub enum PlannerRequest {
    /// A robot picked up its prepared job; transition PENDING → ONGOING.
    JobFetched { robot: String, job_id: i32 },
    /// A robot polled for work and had none; it is available.
    RobotAvailable { robot: String },
    /// A robot reported the outcome of its current job.
    JobUpdate {
        robot: String,
        job_name: String,
        status: JobStatus,
    },
    /// A robot asked whether it may plug in at the adapter station.
    /// `observed` is the handshake state the handler answered from; the
    /// planner only advances if the state is still the same, which
    /// keeps repeated handshakes idempotent.
    PluginHandshake {
        robot: String,
        observed: Option<PluginState>,
    },
    /// Clear a robot's station blocker set for one prefix.
    ResetBlockers { robot: String, prefix: String },
}

/// Cloneable façade the RPC layer holds onto.
#[derive(Clone)]
pub struct PlannerHandle {
    tx: mpsc::UnboundedSender<PlannerRequest>,
    state: Arc<SharedState>,
}

impl PlannerHandle {
    pub fn new(tx: mpsc::UnboundedSender<PlannerRequest>, state: Arc<SharedState>) -> Self {
        Self { tx, state }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    fn enqueue(&self, request: PlannerRequest) {
        if self.tx.send(request).is_err() {
            warn!("Planner request queue closed; dropping request");
        }
    }

    /// Hand out the prepared job for `robot`, if any. The lifecycle
    /// transition itself is queued and applied next tick.
    pub fn fetch_job(&self, robot: &str) -> JobDetails {
        if let Some((_, details)) = self.state.prepared_jobs.remove(robot) {
            self.enqueue(PlannerRequest::JobFetched {
                robot: robot.to_string(),
                job_id: details.job_id,
            });
            return details;
        }
        // A robot polling for work with no assignment is available.
        if !self.state.assignments.contains_key(robot) {
            self.enqueue(PlannerRequest::RobotAvailable {
                robot: robot.to_string(),
            });
        }
        JobDetails::none_for(robot)
    }

    /// Queue a robot's job outcome. Returns whether the robot had an
    /// assigned job; an unknown status string is a protocol violation
    /// and is rejected without queueing.
    pub fn update_job(&self, robot: &str, job_name: &str, status: &str) -> DomainResult<bool> {
        let status = JobStatus::parse(status)?;
        let had_job = self.state.assignments.contains_key(robot);
        self.enqueue(PlannerRequest::JobUpdate {
            robot: robot.to_string(),
            job_name: job_name.to_string(),
            status,
        });
        Ok(had_job)
    }

    /// Plug-in handshake: true once the vehicle side is pending and the
    /// cart may be plugged in. Idempotent from the robot's view; the
    /// state advance is queued.
    pub fn handshake_plug_in(&self, robot: &str) -> bool {
        let booking_id = self
            .state
            .assignments
            .get(robot)
            .and_then(|assigned| assigned.booking_id);
        let Some(booking_id) = booking_id else {
            return false;
        };
        let observed = self.state.plugin_states.get(&booking_id).map(|s| *s);
        self.enqueue(PlannerRequest::PluginHandshake {
            robot: robot.to_string(),
            observed,
        });
        matches!(observed, Some(PluginState::BevPending))
    }

    pub fn reset_blockers(&self, robot: &str, prefix: &str) -> bool {
        self.enqueue(PlannerRequest::ResetBlockers {
            robot: robot.to_string(),
            prefix: prefix.to_string(),
        });
        true
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (PlannerHandle, mpsc::UnboundedReceiver<PlannerRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlannerHandle::new(tx, Arc::new(SharedState::default())), rx)
    }

    #[test]
    fn fetch_without_prepared_job_reports_available() {
        let (handle, mut rx) = handle();
        let details = handle.fetch_job("ChargePal1");
        assert!(details.job_type.is_empty());
        assert_eq!(details.robot_name, "ChargePal1");
        assert!(matches!(
            rx.try_recv(),
            Ok(PlannerRequest::RobotAvailable { .. })
        ));
    }

    #[test]
    fn fetch_consumes_prepared_job_once() {
        let (handle, mut rx) = handle();
        handle.state().prepared_jobs.insert(
            "ChargePal1".to_string(),
            JobDetails {
                job_id: 7,
                job_type: "BRING_CHARGER".to_string(),
                robot_name: "ChargePal1".to_string(),
                ..JobDetails::default()
            },
        );
        let details = handle.fetch_job("ChargePal1");
        assert_eq!(details.job_id, 7);
        assert!(matches!(
            rx.try_recv(),
            Ok(PlannerRequest::JobFetched { job_id: 7, .. })
        ));
        // Second fetch: nothing prepared anymore.
        let details = handle.fetch_job("ChargePal1");
        assert!(details.job_type.is_empty());
    }

    #[test]
    fn unknown_job_status_is_rejected() {
        let (handle, mut rx) = handle();
        assert!(handle.update_job("ChargePal1", "BRING_CHARGER", "Done").is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn update_reports_whether_robot_had_a_job() {
        let (handle, _rx) = handle();
        assert_eq!(
            handle
                .update_job("ChargePal1", "BRING_CHARGER", "Success")
                .unwrap(),
            false
        );
        handle.state().assignments.insert(
            "ChargePal1".to_string(),
            AssignedJob {
                job_id: 1,
                job_type: JobType::BringCharger,
                booking_id: Some(1),
            },
        );
        assert_eq!(
            handle
                .update_job("ChargePal1", "BRING_CHARGER", "Success")
                .unwrap(),
            true
        );
    }

    #[test]
    fn handshake_only_ready_when_bev_pending() {
        let (handle, _rx) = handle();
        assert!(!handle.handshake_plug_in("ChargePal1"));
        handle.state().assignments.insert(
            "ChargePal1".to_string(),
            AssignedJob {
                job_id: 1,
                job_type: JobType::BringCharger,
                booking_id: Some(3),
            },
        );
        handle.state().plugin_states.insert(3, PluginState::BringCharger);
        assert!(!handle.handshake_plug_in("ChargePal1"));
        handle.state().plugin_states.insert(3, PluginState::BevPending);
        assert!(handle.handshake_plug_in("ChargePal1"));
    }
}
