//! Job state machine: queued RPC mutations and charger commands.

use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use tracing::{debug, info, warn};

use crate::application::requests::PlannerRequest;
use crate::domain::{
    BookingState, ChargerCommand, DomainResult, JobState, JobStatus, JobType, PluginState,
};
use crate::infrastructure::database::entities::job;
use crate::infrastructure::database::plan::{self, NewJob};
use crate::shared::time::now;

use super::{settle_job, Planner};

impl Planner {
    /// Apply every queued RPC mutation against the reconciled store.
    pub(super) async fn drain_requests(&mut self, db: &DatabaseTransaction) -> DomainResult<()> {
        while let Ok(request) = self.rx.try_recv() {
            match request {
                PlannerRequest::JobFetched { robot, job_id } => {
                    self.on_job_fetched(db, &robot, job_id).await?;
                }
                PlannerRequest::RobotAvailable { robot } => {
                    self.on_robot_available(db, &robot).await?;
                }
                PlannerRequest::JobUpdate {
                    robot,
                    job_name,
                    status,
                } => {
                    self.on_job_update(db, &robot, &job_name, status).await?;
                }
                PlannerRequest::PluginHandshake { robot, observed } => {
                    self.on_plugin_handshake(db, &robot, observed).await?;
                }
                PlannerRequest::ResetBlockers { robot, prefix } => {
                    self.picker.reset_blockers(&robot, &prefix);
                }
            }
        }
        Ok(())
    }

    /// The robot picked up its prepared job: PENDING → ONGOING.
    async fn on_job_fetched(
        &self,
        db: &DatabaseTransaction,
        robot: &str,
        job_id: i32,
    ) -> DomainResult<()> {
        let job = plan::job(db, job_id).await?;
        if job.job_state() != Some(JobState::Pending) {
            // Canceled between preparation and pickup; the robot's next
            // report is rejected through the assignment snapshot.
            debug!(job = job_id, state = job.state.as_str(), "Stale fetch");
            return Ok(());
        }
        let mut active: job::ActiveModel = job.clone().into();
        active.state = Set(JobState::Ongoing.as_str().to_string());
        active.start = Set(Some(now()));
        active.update(db).await?;
        info!(job = job_id, robot, "Job sent");
        Ok(())
    }

    /// A robot polled with nothing prepared; it is available unless it
    /// still holds a job.
    async fn on_robot_available(&self, db: &DatabaseTransaction, robot: &str) -> DomainResult<()> {
        if plan::assigned_job_for_robot(db, robot).await?.is_some() {
            return Ok(());
        }
        plan::set_robot_available(db, robot, true).await?;
        Ok(())
    }

    async fn on_job_update(
        &self,
        db: &DatabaseTransaction,
        robot: &str,
        job_name: &str,
        status: JobStatus,
    ) -> DomainResult<()> {
        let Some(job) = plan::assigned_job_for_robot(db, robot).await? else {
            warn!(robot, job_name, ?status, "Job update for robot without assignment");
            return Ok(());
        };
        if job.job_type != job_name {
            warn!(
                robot,
                reported = job_name,
                assigned = job.job_type.as_str(),
                "Robot reported a different job than assigned"
            );
        }
        match status {
            JobStatus::Success => self.complete_job(db, job).await,
            JobStatus::Failure => self.fail_job(db, job).await,
            JobStatus::Recovery | JobStatus::Ongoing => {
                debug!(robot, job = job.id, ?status, "Informational job update");
                Ok(())
            }
        }
    }

    /// Success: settle the job, free the source, push the new location,
    /// and fire the per-type follow-ups.
    async fn complete_job(&self, db: &DatabaseTransaction, job: job::Model) -> DomainResult<()> {
        let job = settle_job(db, &job, JobState::Complete).await?;
        let robot = job.robot_name.clone().unwrap_or_default();
        info!(job = job.id, job_type = job.job_type.as_str(), robot = robot.as_str(), "Job complete");

        if let Some(source) = job.source_station.as_deref() {
            if plan::try_station(db, source).await?.is_some() {
                plan::set_station_available(db, source, true).await?;
            }
        }
        if let (Some(target), Some(cart)) = (job.target_station.as_deref(), job.cart_name.as_deref())
        {
            if let Some(station) = plan::try_station(db, target).await? {
                if station.reservation.as_deref() == Some(cart) {
                    plan::set_station_reservation(db, target, None).await?;
                }
            }
        }

        if let Some(target) = job.target_station.as_deref() {
            let carried = job.cart_name.as_deref();
            if let Err(e) = self.live.update_location(target, &robot, carried).await {
                warn!(robot = robot.as_str(), "Could not push location update: {e}");
            }
            plan::set_robot_location(db, &robot, target).await?;
            if let Some(cart) = carried {
                plan::set_cart_location(db, cart, target).await?;
            }
        }

        plan::set_robot_job(db, &robot, None).await?;
        self.clear_assignment(&robot);

        match job.job_type() {
            Some(JobType::BringCharger) => {
                if let Some(booking_id) = job.booking_id {
                    self.state.plugin_states.insert(booking_id, PluginState::Success);
                }
            }
            Some(JobType::StowCharger) => {
                if let Some(cart) = job.cart_name.as_deref() {
                    plan::bind_cart_booking(db, cart, None).await?;
                    plan::set_cart_available(db, cart, true).await?;
                    // The cart waits in storage; recharge it as soon as
                    // some charging slot frees up.
                    if !plan::stations_with_prefix(db, "BCS_").await?.is_empty() {
                        let mut new = NewJob::open(JobType::RechargeCharger, now());
                        new.cart_name = Some(cart.to_string());
                        new.source_station = job.target_station.clone();
                        let recharge = plan::insert_job(db, new).await?;
                        info!(job = recharge.id, cart, "Recharge queued after stow");
                    }
                }
            }
            Some(JobType::RechargeCharger) => {
                // Retrieve chain complete: the booking is done with this
                // cart. It stays unavailable while it recharges; the
                // battery monitor frees it on STOP_RECHARGING.
                if let Some(cart) = job.cart_name.as_deref() {
                    plan::bind_cart_booking(db, cart, None).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Failure: settle the job and return everything it held.
    async fn fail_job(&self, db: &DatabaseTransaction, job: job::Model) -> DomainResult<()> {
        let job = settle_job(db, &job, JobState::Failed).await?;
        warn!(job = job.id, job_type = job.job_type.as_str(), "Job failed");

        self.release_job_resources(db, &job).await?;

        if let Some(booking_id) = job.booking_id {
            self.state.plugin_states.remove(&booking_id);
            // Rewind the booking so a fresh delivery gets scheduled,
            // unless the producer already did; in that case the diff
            // will not fire again, so re-issue the delivery directly.
            let snapshot = plan::booking(db, booking_id).await?;
            let already_checked_in =
                snapshot.as_ref().and_then(|b| b.status()) == Some(BookingState::CheckedIn);
            if already_checked_in {
                if let Some(snapshot) = snapshot {
                    self.on_checked_in(db, &snapshot).await?;
                }
            } else if let Err(e) = self
                .live
                .update_session_status(booking_id, BookingState::CheckedIn)
                .await
            {
                warn!(booking = booking_id, "Could not rewind booking: {e}");
            }
        }
        Ok(())
    }

    /// Return the robot, cart, and station claims of a settled job.
    pub(super) async fn release_job_resources(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
    ) -> DomainResult<()> {
        if let Some(robot) = job.robot_name.as_deref() {
            plan::set_robot_job(db, robot, None).await?;
            plan::set_robot_available(db, robot, true).await?;
            self.clear_assignment(robot);
        }
        if let Some(cart) = job.cart_name.as_deref() {
            plan::bind_cart_booking(db, cart, None).await?;
            plan::set_cart_available(db, cart, true).await?;
        }
        if let Some(target) = job.target_station.as_deref() {
            if let Some(station) = plan::try_station(db, target).await? {
                if station.reservation.as_deref() == job.cart_name.as_deref()
                    && station.reservation.is_some()
                {
                    plan::set_station_reservation(db, target, None).await?;
                }
                // Only an assigned bring/stow job marked its target
                // unavailable; an OPEN job held no station claim.
                if job.robot_name.is_some()
                    && matches!(
                        job.job_type(),
                        Some(JobType::BringCharger) | Some(JobType::StowCharger)
                    )
                {
                    plan::set_station_available(db, target, true).await?;
                }
            }
        }
        Ok(())
    }

    /// Advance the plug-in handshake for the robot's current booking.
    /// Only acts when the state still matches what the handler answered
    /// from; a handshake answered against a stale state is a no-op.
    async fn on_plugin_handshake(
        &self,
        db: &DatabaseTransaction,
        robot: &str,
        observed: Option<PluginState>,
    ) -> DomainResult<()> {
        let Some(job) = plan::assigned_job_for_robot(db, robot).await? else {
            return Ok(());
        };
        let Some(booking_id) = job.booking_id else {
            return Ok(());
        };
        let current = self.state.plugin_states.get(&booking_id).map(|s| *s);
        if current != observed {
            return Ok(());
        }
        match current {
            Some(PluginState::BringCharger) => {
                self.state
                    .plugin_states
                    .insert(booking_id, PluginState::RobotReady2Plug);
                // Reserved live-store wording for "robot ready to plug".
                if let Err(e) = self
                    .live
                    .update_session_status(booking_id, BookingState::Pending)
                    .await
                {
                    warn!(booking = booking_id, "Could not push pending status: {e}");
                }
            }
            Some(PluginState::BevPending) => {
                self.state.plugin_states.insert(booking_id, PluginState::PlugIn);
            }
            _ => {}
        }
        Ok(())
    }

    /// React to a charger command derived from battery telemetry or a
    /// booking reaching `ready`.
    pub(super) async fn handle_charger_update(
        &self,
        db: &DatabaseTransaction,
        cart_name: &str,
        command: ChargerCommand,
    ) -> DomainResult<()> {
        info!(cart = cart_name, ?command, "Charger update");
        match command {
            ChargerCommand::StartCharging | ChargerCommand::StartRecharging => Ok(()),
            ChargerCommand::StopRecharging => {
                plan::set_cart_available(db, cart_name, true).await?;
                // If another cart is queued for a charging slot, move
                // this one out of the way.
                let wants_slot = plan::open_jobs(db).await?.into_iter().any(|j| {
                    j.job_type() == Some(JobType::RechargeCharger)
                        && j.cart_name.as_deref() != Some(cart_name)
                });
                if wants_slot {
                    let cart = plan::cart(db, cart_name).await?;
                    let mut new = NewJob::open(JobType::StowCharger, now());
                    new.cart_name = Some(cart.name.clone());
                    new.source_station = Some(cart.location.clone());
                    let stow = plan::insert_job(db, new).await?;
                    info!(job = stow.id, cart = cart_name, "Stow queued to free charging slot");
                }
                Ok(())
            }
            ChargerCommand::RetrieveCharger | ChargerCommand::BookingFulfilled => {
                let cart = plan::cart(db, cart_name).await?;
                let Some(booking_id) = cart.booking_id else {
                    warn!(cart = cart_name, ?command, "Charger command for cart without booking");
                    return Ok(());
                };
                // One retrieve chain per booking at a time.
                let chain_live = plan::live_jobs_for_booking(db, booking_id)
                    .await?
                    .iter()
                    .any(|j| {
                        matches!(
                            j.job_type(),
                            Some(JobType::RetrieveCharger)
                                | Some(JobType::RechargeCharger)
                                | Some(JobType::StowCharger)
                        )
                    });
                if chain_live {
                    return Ok(());
                }
                let source = plan::booking(db, booking_id)
                    .await?
                    .and_then(|b| {
                        super::bookings::normalize_ads(
                            b.actual_location.or(b.drop_location).as_deref(),
                        )
                    })
                    .unwrap_or_else(|| cart.location.clone());
                let mut new = NewJob::open(JobType::RetrieveCharger, now());
                new.booking_id = Some(booking_id);
                new.cart_name = Some(cart.name.clone());
                new.source_station = Some(source);
                let retrieve = plan::insert_job(db, new).await?;
                info!(job = retrieve.id, cart = cart_name, booking = booking_id, "Retrieve queued");
                Ok(())
            }
        }
    }
}
