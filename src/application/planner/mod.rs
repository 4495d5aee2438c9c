//! The planner: one sequential tick loop owning all planning state.
//!
//! Per tick, in fixed order: reconcile the live database into the
//! planning store, dispatch the booking diff, dispatch battery-state
//! changes, bind resources to open jobs, drain the RPC request queue,
//! commit. RPC handlers run concurrently but only ever talk to the
//! planner through [`PlannerHandle`].

mod bookings;
mod jobs;
mod scheduler;

use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::requests::{
    AssignedJob, JobDetails, PlannerHandle, PlannerRequest, SharedState,
};
use crate::application::services::{BatteryMonitor, Reconciler, StationPicker};
use crate::domain::{DomainError, DomainResult, JobState, JobType};
use crate::infrastructure::database::entities::job;
use crate::infrastructure::database::plan;
use crate::infrastructure::LiveStore;
use crate::shared::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Pause between ticks.
    pub update_interval: std::time::Duration,
    /// Estimated time a robot needs to actively handle a job; feeds the
    /// deadline derivation for bring jobs.
    pub robot_job_duration: chrono::Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            update_interval: std::time::Duration::from_secs(1),
            robot_job_duration: chrono::Duration::minutes(1),
        }
    }
}

pub struct Planner {
    live: Arc<LiveStore>,
    plan: DatabaseConnection,
    picker: Arc<StationPicker>,
    reconciler: Reconciler,
    monitor: BatteryMonitor,
    rx: mpsc::UnboundedReceiver<PlannerRequest>,
    state: Arc<SharedState>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(
        live: Arc<LiveStore>,
        plan: DatabaseConnection,
        picker: Arc<StationPicker>,
        config: PlannerConfig,
    ) -> (Self, PlannerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState::default());
        let handle = PlannerHandle::new(tx, state.clone());
        let planner = Self {
            live,
            plan,
            picker,
            reconciler: Reconciler::new(),
            monitor: BatteryMonitor::new(),
            rx,
            state,
            config,
        };
        (planner, handle)
    }

    /// Tick until shutdown. Only an invariant or protocol violation
    /// stops the loop; everything else is logged and the next tick
    /// starts from the committed state.
    pub async fn run(mut self, shutdown: ShutdownSignal) -> DomainResult<()> {
        info!(
            interval = ?self.config.update_interval,
            "Planner started"
        );
        loop {
            if shutdown.is_triggered() {
                break;
            }
            if let Err(e) = self.tick().await {
                if e.is_fatal() {
                    error!("Planner terminating: {e}");
                    return Err(e);
                }
                warn!("Tick failed: {e}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.update_interval) => {}
                _ = shutdown.wait() => break,
            }
        }
        info!("Planner stopped");
        Ok(())
    }

    /// One planner iteration. The transaction is committed even when
    /// the tick fails so that partial progress stays visible to
    /// downstream monitoring; the error is returned afterwards.
    pub async fn tick(&mut self) -> DomainResult<()> {
        let txn = self.plan.begin().await?;
        let result = self.tick_inner(&txn).await;
        txn.commit().await?;
        result
    }

    async fn tick_inner(&mut self, db: &DatabaseTransaction) -> DomainResult<()> {
        match self.reconciler.reconcile(&self.live, db).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // Live store unreachable: the planning store stays
                // authoritative until the next successful reconcile.
                warn!("Reconcile skipped: {e}");
            }
        }

        let changed = self.reconciler.updated_bookings(db).await?;
        self.handle_updated_bookings(db, &changed).await?;

        match self.monitor.poll(&self.live).await {
            Ok(deltas) => {
                for (cart, command) in deltas {
                    self.handle_charger_update(db, &cart, command).await?;
                }
            }
            Err(e) => debug!("Battery poll skipped: {e}"),
        }

        self.schedule_jobs(db).await?;
        self.drain_requests(db).await?;
        self.assert_invariants(db).await
    }

    // ── Assignment bookkeeping shared by scheduler and handlers ─

    /// Make a job visible to its robot: prepared for pickup plus the
    /// assignment snapshot the RPC handlers answer from.
    fn publish_assignment(&self, job: &job::Model) {
        let Some(robot) = job.robot_name.clone() else {
            return;
        };
        let Some(job_type) = job.job_type() else {
            return;
        };
        self.state
            .prepared_jobs
            .insert(robot.clone(), JobDetails::from_job(job));
        self.state.assignments.insert(
            robot,
            AssignedJob {
                job_id: job.id,
                job_type,
                booking_id: job.booking_id,
            },
        );
    }

    fn clear_assignment(&self, robot: &str) {
        self.state.prepared_jobs.remove(robot);
        self.state.assignments.remove(robot);
    }

    /// Robot base station a robot recharges itself at, derived from the
    /// robot's numeric suffix (`ChargePal2` → `RBS_2`).
    fn rbs_for(robot: &str) -> Option<String> {
        let digits: String = robot
            .chars()
            .rev()
            .take_while(char::is_ascii_digit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if digits.is_empty() {
            None
        } else {
            Some(format!("RBS_{digits}"))
        }
    }

    // ── Invariants (asserted at every commit) ───────────────────

    async fn assert_invariants(&self, db: &DatabaseTransaction) -> DomainResult<()> {
        let jobs = plan::jobs(db).await?;

        let mut assigned_per_robot: std::collections::HashMap<&str, u32> =
            std::collections::HashMap::new();
        for job in &jobs {
            let state = job.job_state().ok_or_else(|| {
                DomainError::invariant(format!("job {} has unknown state '{}'", job.id, job.state))
            })?;
            match state {
                JobState::Open | JobState::Pending => {
                    let anchored = job.booking_id.is_some()
                        || job.cart_name.is_some()
                        || (job.job_type() == Some(JobType::RechargeSelf)
                            && job.robot_name.is_some());
                    if !anchored {
                        return Err(DomainError::invariant(format!(
                            "job {} has neither booking nor cart",
                            job.id
                        )));
                    }
                }
                JobState::Ongoing => {
                    if job.robot_name.is_none() {
                        return Err(DomainError::invariant(format!(
                            "ongoing job {} has no robot",
                            job.id
                        )));
                    }
                }
                _ => {}
            }
            if job.currently_assigned {
                if !state.is_live() {
                    return Err(DomainError::invariant(format!(
                        "settled job {} is still assigned",
                        job.id
                    )));
                }
                if let Some(robot) = job.robot_name.as_deref() {
                    let count = assigned_per_robot.entry(robot).or_default();
                    *count += 1;
                    if *count > 1 {
                        return Err(DomainError::invariant(format!(
                            "robot {robot} holds more than one assigned job"
                        )));
                    }
                }
            }
        }

        let carts = plan::carts(db).await?;
        for cart in &carts {
            if cart.available && cart.booking_id.is_some() {
                return Err(DomainError::invariant(format!(
                    "available cart {} still bound to booking {:?}",
                    cart.name, cart.booking_id
                )));
            }
        }

        for station in plan::stations(db).await? {
            let Some(reserved_for) = station.reservation.as_deref() else {
                continue;
            };
            for cart in &carts {
                if cart.name != reserved_for && cart.location.contains(&station.name) {
                    return Err(DomainError::invariant(format!(
                        "cart {} occupies {} reserved for {}",
                        cart.name, station.name, reserved_for
                    )));
                }
            }
            for job in &jobs {
                let live = job.job_state().map(|s| s.is_live()).unwrap_or(false);
                if live
                    && job.target_station.as_deref() == Some(station.name.as_str())
                    && job.cart_name.as_deref() != Some(reserved_for)
                    && job.job_type() != Some(JobType::RechargeSelf)
                {
                    return Err(DomainError::invariant(format!(
                        "job {} targets {} reserved for {}",
                        job.id, station.name, reserved_for
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Settle a job into a terminal state, checking the lifecycle edge
/// first. Settled jobs are never assigned and carry an end timestamp.
async fn settle_job(
    db: &DatabaseTransaction,
    job: &job::Model,
    next: JobState,
) -> DomainResult<job::Model> {
    let current = job
        .job_state()
        .ok_or_else(|| DomainError::invariant(format!("job {} has unknown state", job.id)))?;
    if !current.may_become(next) {
        return Err(DomainError::invariant(format!(
            "job {} cannot move {current} -> {next}",
            job.id
        )));
    }
    use sea_orm::{ActiveModelTrait, Set};
    let mut active: job::ActiveModel = job.clone().into();
    active.state = Set(next.as_str().to_string());
    active.currently_assigned = Set(false);
    active.end = Set(Some(crate::shared::time::now()));
    Ok(active.update(db).await?)
}
