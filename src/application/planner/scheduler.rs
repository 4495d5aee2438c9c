//! Resource binding: open jobs → (robot, cart, station).
//!
//! Deterministic per tick. Open jobs are walked in insertion order and
//! never preempted once assigned. Candidate pools are iterated in name
//! order, so distance ties resolve stably within a tick.

use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use tracing::{debug, info, warn};

use crate::domain::{DomainError, DomainResult, JobState, JobType};
use crate::infrastructure::database::entities::{cart, job, robot};
use crate::infrastructure::database::plan::{self, NewJob};
use crate::shared::time::now;

use super::Planner;

impl Planner {
    pub(super) async fn schedule_jobs(&self, db: &DatabaseTransaction) -> DomainResult<()> {
        let due = now();
        for job in plan::open_jobs(db).await? {
            match job.job_type() {
                Some(JobType::BringCharger) => {
                    if job.schedule <= due {
                        self.schedule_bring_charger(db, &job).await?;
                    }
                }
                Some(JobType::RetrieveCharger) => self.schedule_retrieve_charger(db, &job).await?,
                Some(JobType::RechargeCharger) => self.schedule_recharge_charger(db, &job).await?,
                Some(JobType::StowCharger) => self.schedule_stow_charger(db, &job).await?,
                Some(JobType::RechargeSelf) => {}
                None => {
                    return Err(DomainError::invariant(format!(
                        "job {} has unknown type '{}'",
                        job.id, job.job_type
                    )))
                }
            }
        }
        self.schedule_self_recharges(db).await
    }

    /// Deliver a cart to a vehicle. Skipped (left OPEN) while the
    /// target is occupied or no suitable cart or robot is free.
    async fn schedule_bring_charger(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
    ) -> DomainResult<()> {
        let booking_id = job.booking_id.ok_or_else(|| {
            DomainError::invariant(format!("bring job {} without booking", job.id))
        })?;
        let target = job.target_station.clone().ok_or_else(|| {
            DomainError::invariant(format!("bring job {} without target", job.id))
        })?;

        let target_free = plan::try_station(db, &target)
            .await?
            .map(|s| s.available)
            .unwrap_or(false);
        if !target_free || self.is_station_occupied(db, &target).await? {
            debug!(job = job.id, target = target.as_str(), "Target occupied, waiting");
            return Ok(());
        }

        let charge_request = plan::booking(db, booking_id)
            .await?
            .map(|b| b.charge_request)
            .unwrap_or(0.0);

        // Nearest cart able to deliver the requested charge, to prefer
        // transporting less.
        let Some(cart) = self.pop_nearest_cart(db, &target, charge_request).await? else {
            return Ok(());
        };
        let source = cart.location.clone();
        let Some(robot) = self.pop_nearest_robot(db, &source).await? else {
            // No robot free: give the cart back and retry next tick.
            plan::set_cart_available(db, &cart.name, true).await?;
            return Ok(());
        };

        plan::bind_cart_booking(db, &cart.name, Some(booking_id)).await?;
        plan::set_station_available(db, &target, false).await?;
        self.state
            .plugin_states
            .insert(booking_id, crate::domain::PluginState::BringCharger);

        self.assign(db, job, &robot, Some(&cart.name), &source, &target, None)
            .await
    }

    /// Pick up a cart from a vehicle. Upgraded in place to a recharge
    /// (nearest free BCS, reserved) or stow (free BWS via the station
    /// picker) job; downstream code keys on the upgraded type.
    async fn schedule_retrieve_charger(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
    ) -> DomainResult<()> {
        let cart_name = job.cart_name.clone().ok_or_else(|| {
            DomainError::invariant(format!("retrieve job {} without cart", job.id))
        })?;
        let source = job.source_station.clone().ok_or_else(|| {
            DomainError::invariant(format!("retrieve job {} without source", job.id))
        })?;

        let Some(robot) = self.pop_nearest_robot(db, &source).await? else {
            return Ok(());
        };

        let cart_location = plan::cart(db, &cart_name).await?.location;
        let upgrade = match self.pop_nearest_bcs(db, &cart_location).await? {
            Some(bcs) => {
                plan::set_station_reservation(db, &bcs, Some(&cart_name)).await?;
                (JobType::RechargeCharger, bcs)
            }
            None => {
                let bws = self
                    .picker
                    .search_free_station(&self.live, db, &robot.name, "BWS_")
                    .await?;
                if bws.is_empty() {
                    warn!(job = job.id, "No BCS or BWS free for retrieved cart");
                    plan::set_robot_available(db, &robot.name, true).await?;
                    return Ok(());
                }
                plan::set_station_available(db, &bws, false).await?;
                (JobType::StowCharger, bws)
            }
        };

        info!(job = job.id, upgraded = upgrade.0.as_str(), "Retrieve job upgraded");
        self.assign(db, job, &robot, Some(&cart_name), &source, &upgrade.1, Some(upgrade.0))
            .await
    }

    /// Move a recharged cart from its charging slot into storage.
    async fn schedule_stow_charger(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
    ) -> DomainResult<()> {
        let cart_name = job.cart_name.clone().ok_or_else(|| {
            DomainError::invariant(format!("stow job {} without cart", job.id))
        })?;
        let source = job.source_station.clone().ok_or_else(|| {
            DomainError::invariant(format!("stow job {} without source", job.id))
        })?;

        let Some(robot) = self.pop_nearest_robot(db, &source).await? else {
            return Ok(());
        };
        let bws = self
            .picker
            .search_free_station(&self.live, db, &robot.name, "BWS_")
            .await?;
        if bws.is_empty() {
            plan::set_robot_available(db, &robot.name, true).await?;
            return Ok(());
        }
        plan::set_station_available(db, &bws, false).await?;
        plan::set_cart_available(db, &cart_name, false).await?;

        self.assign(db, job, &robot, Some(&cart_name), &source, &bws, None)
            .await
    }

    /// Bring a waiting cart back to a charging slot.
    async fn schedule_recharge_charger(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
    ) -> DomainResult<()> {
        let cart_name = job.cart_name.clone().ok_or_else(|| {
            DomainError::invariant(format!("recharge job {} without cart", job.id))
        })?;
        let source = job.source_station.clone().ok_or_else(|| {
            DomainError::invariant(format!("recharge job {} without source", job.id))
        })?;

        let Some(bcs) = self.pop_nearest_bcs(db, &source).await? else {
            return Ok(());
        };
        let Some(robot) = self.pop_nearest_robot(db, &source).await? else {
            return Ok(());
        };
        plan::set_station_reservation(db, &bcs, Some(&cart_name)).await?;
        plan::set_cart_available(db, &cart_name, false).await?;

        self.assign(db, job, &robot, Some(&cart_name), &source, &bcs, None)
            .await
    }

    /// Every robot still free at the end of the tick recharges itself,
    /// unless it already stands at its base station.
    async fn schedule_self_recharges(&self, db: &DatabaseTransaction) -> DomainResult<()> {
        for robot in plan::available_robots(db).await? {
            if plan::assigned_job_for_robot(db, &robot.name).await?.is_some() {
                continue;
            }
            let Some(rbs) = Self::rbs_for(&robot.name) else {
                continue;
            };
            if robot.location == rbs {
                continue;
            }
            let mut new = NewJob::open(JobType::RechargeSelf, now());
            new.state = JobState::Pending;
            new.currently_assigned = true;
            new.robot_name = Some(robot.name.clone());
            new.source_station = Some(robot.location.clone());
            new.target_station = Some(rbs);
            let job = plan::insert_job(db, new).await?;
            plan::set_robot_available(db, &robot.name, false).await?;
            plan::set_robot_job(db, &robot.name, Some(job.id)).await?;
            self.publish_assignment(&job);
        }
        Ok(())
    }

    /// Bind resources into an OPEN job and hand it to the robot.
    #[allow(clippy::too_many_arguments)]
    async fn assign(
        &self,
        db: &DatabaseTransaction,
        job: &job::Model,
        robot: &robot::Model,
        cart_name: Option<&str>,
        source: &str,
        target: &str,
        upgrade: Option<JobType>,
    ) -> DomainResult<()> {
        let (charging_type, port_location) = match job.booking_id {
            Some(id) => match plan::booking(db, id).await? {
                Some(b) => (
                    Some(charging_type_for(b.bev_port_location.as_deref())),
                    b.bev_port_location,
                ),
                None => (None, None),
            },
            None => (None, None),
        };

        let mut active: job::ActiveModel = job.clone().into();
        if let Some(upgraded) = upgrade {
            active.job_type = Set(upgraded.as_str().to_string());
        }
        active.state = Set(JobState::Pending.as_str().to_string());
        active.currently_assigned = Set(true);
        active.robot_name = Set(Some(robot.name.clone()));
        active.cart_name = Set(cart_name.map(str::to_string));
        active.source_station = Set(Some(source.to_string()));
        active.target_station = Set(Some(target.to_string()));
        if charging_type.is_some() {
            active.charging_type = Set(charging_type);
        }
        if port_location.is_some() {
            active.port_location = Set(port_location);
        }
        let updated = active.update(db).await?;

        plan::set_robot_job(db, &robot.name, Some(updated.id)).await?;
        self.publish_assignment(&updated);
        info!(
            job = updated.id,
            job_type = updated.job_type.as_str(),
            robot = robot.name.as_str(),
            cart = cart_name.unwrap_or(""),
            source,
            target,
            "Job assigned"
        );
        Ok(())
    }

    // ── Pop helpers (candidate pools are the availability flags) ─

    /// Nearest available cart that can deliver `min_charge`; marked
    /// unavailable on return.
    pub(super) async fn pop_nearest_cart(
        &self,
        db: &DatabaseTransaction,
        location: &str,
        min_charge: f64,
    ) -> DomainResult<Option<cart::Model>> {
        let mut best: Option<(cart::Model, f64)> = None;
        for cart in plan::available_carts(db, min_charge).await? {
            let distance = plan::distance(db, &cart.location, location).await?;
            if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                best = Some((cart, distance));
            }
        }
        match best {
            Some((cart, _)) => {
                plan::set_cart_available(db, &cart.name, false).await?;
                Ok(Some(cart))
            }
            None => Ok(None),
        }
    }

    /// Nearest available robot; marked unavailable on return.
    pub(super) async fn pop_nearest_robot(
        &self,
        db: &DatabaseTransaction,
        location: &str,
    ) -> DomainResult<Option<robot::Model>> {
        let mut best: Option<(robot::Model, f64)> = None;
        for robot in plan::available_robots(db).await? {
            let distance = plan::distance(db, &robot.location, location).await?;
            if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                best = Some((robot, distance));
            }
        }
        match best {
            Some((robot, _)) => {
                plan::set_robot_available(db, &robot.name, false).await?;
                Ok(Some(robot))
            }
            None => Ok(None),
        }
    }

    /// Nearest unoccupied battery charging station, if any.
    pub(super) async fn pop_nearest_bcs(
        &self,
        db: &DatabaseTransaction,
        location: &str,
    ) -> DomainResult<Option<String>> {
        let mut best: Option<(String, f64)> = None;
        for station in plan::stations_with_prefix(db, "BCS_").await? {
            if self.is_station_occupied(db, &station.name).await? {
                continue;
            }
            let distance = plan::distance(db, &station.name, location).await?;
            if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                best = Some((station.name, distance));
            }
        }
        Ok(best.map(|(name, _)| name))
    }

    /// Occupied: reserved, or some cart's location names the station.
    pub(super) async fn is_station_occupied(
        &self,
        db: &DatabaseTransaction,
        station: &str,
    ) -> DomainResult<bool> {
        if let Some(model) = plan::try_station(db, station).await? {
            if model.reservation.is_some() {
                return Ok(true);
            }
        }
        for cart in plan::carts(db).await? {
            if cart.location.contains(station) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Charging type forwarded to the robot; the port location string marks
/// DC ports explicitly, everything else is AC.
fn charging_type_for(port_location: Option<&str>) -> String {
    match port_location {
        Some(port) if port.to_ascii_lowercase().contains("dc") => "DC".to_string(),
        _ => "AC".to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charging_type_defaults_to_ac() {
        assert_eq!(charging_type_for(None), "AC");
        assert_eq!(charging_type_for(Some("left")), "AC");
        assert_eq!(charging_type_for(Some("rear_DC")), "DC");
    }

    #[test]
    fn rbs_derived_from_robot_suffix() {
        assert_eq!(Planner::rbs_for("ChargePal1"), Some("RBS_1".to_string()));
        assert_eq!(Planner::rbs_for("ChargePal12"), Some("RBS_12".to_string()));
        assert_eq!(Planner::rbs_for("NoDigits"), None);
    }
}
