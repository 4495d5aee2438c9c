//! Booking state machine: reacting to reported booking changes.

use sea_orm::DatabaseTransaction;
use tracing::{debug, info, warn};

use crate::domain::{BookingState, DomainResult, JobState, JobType, PluginState};
use crate::infrastructure::database::entities::booking;
use crate::infrastructure::database::plan::{self, NewJob};
use crate::shared::time::now;

use super::{settle_job, Planner};

impl Planner {
    pub(super) async fn handle_updated_bookings(
        &mut self,
        db: &DatabaseTransaction,
        changed: &[booking::Model],
    ) -> DomainResult<()> {
        for model in changed {
            let Some(status) = model.status() else {
                warn!(
                    booking = model.id,
                    status = model.charging_session_status.as_str(),
                    "Booking carries unknown status"
                );
                continue;
            };
            match status {
                BookingState::CheckedIn => self.on_checked_in(db, model).await?,
                BookingState::Pending => {
                    // The vehicle side confirmed it is waiting for the
                    // plug-in; the handshake may now answer true.
                    self.state
                        .plugin_states
                        .insert(model.id, PluginState::BevPending);
                }
                BookingState::Ready => {
                    if let Some(cart) = plan::cart_with_booking(db, model.id).await? {
                        self.handle_charger_update(
                            db,
                            &cart.name,
                            crate::domain::ChargerCommand::BookingFulfilled,
                        )
                        .await?;
                    }
                }
                BookingState::Canceled => self.cancel_booking_jobs(db, model.id).await?,
                BookingState::Booked
                | BookingState::ChargingBev
                | BookingState::NoShow => {
                    debug!(booking = model.id, status = %status, "Booking update without planner action");
                }
            }
        }
        Ok(())
    }

    /// A freshly checked-in booking gets an OPEN bring job and is
    /// pushed back to the live store as scheduled ("booked").
    pub(super) async fn on_checked_in(
        &self,
        db: &DatabaseTransaction,
        model: &booking::Model,
    ) -> DomainResult<()> {
        // One delivery chain per booking at a time.
        if !plan::live_jobs_for_booking(db, model.id).await?.is_empty() {
            return Ok(());
        }
        if plan::cart_with_booking(db, model.id).await?.is_some() {
            return Ok(());
        }

        let Some(target) = normalize_ads(model.drop_location.as_deref()) else {
            warn!(booking = model.id, "Check-in without usable drop location");
            return Ok(());
        };

        let schedule = model.planned_drop_time.unwrap_or_else(now);
        let plug_duration = chrono::Duration::seconds(model.planned_plugintime_secs);
        let deadline = model
            .planned_pickup_time
            .map(|pickup| pickup - plug_duration - self.config.robot_job_duration);

        let mut new = NewJob::open(JobType::BringCharger, schedule);
        new.deadline = deadline;
        new.booking_id = Some(model.id);
        new.target_station = Some(target.clone());
        new.port_location = model.bev_port_location.clone();
        let job = plan::insert_job(db, new).await?;
        info!(job = job.id, booking = model.id, target = target.as_str(), "Bring job created");

        if let Err(e) = self
            .live
            .update_session_status(model.id, BookingState::Booked)
            .await
        {
            warn!(booking = model.id, "Could not push scheduled status: {e}");
        }
        Ok(())
    }

    /// Cancel every live job of a booking and return its robot, cart,
    /// and target-station reservations to the free pool.
    pub(super) async fn cancel_booking_jobs(
        &self,
        db: &DatabaseTransaction,
        booking_id: i64,
    ) -> DomainResult<()> {
        for job in plan::live_jobs_for_booking(db, booking_id).await? {
            info!(job = job.id, booking = booking_id, "Job canceled");
            let canceled = settle_job(db, &job, JobState::Canceled).await?;
            self.release_job_resources(db, &canceled).await?;
        }
        // A cart may still hold the booking after its delivery job
        // completed; unbind it as well.
        if let Some(cart) = plan::cart_with_booking(db, booking_id).await? {
            plan::bind_cart_booking(db, &cart.name, None).await?;
            plan::set_cart_available(db, &cart.name, true).await?;
        }
        self.state.plugin_states.remove(&booking_id);
        Ok(())
    }
}

/// Accept `ADS_<n>` directly or a bare slot number.
pub(super) fn normalize_ads(drop_location: Option<&str>) -> Option<String> {
    let raw = drop_location?.trim();
    if raw.starts_with("ADS_") {
        return Some(raw.to_string());
    }
    raw.parse::<u32>().ok().map(|n| format!("ADS_{n}"))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_drop_locations() {
        assert_eq!(normalize_ads(Some("ADS_2")), Some("ADS_2".to_string()));
        assert_eq!(normalize_ads(Some("3")), Some("ADS_3".to_string()));
        assert_eq!(normalize_ads(Some("parking lot")), None);
        assert_eq!(normalize_ads(None), None);
    }
}
