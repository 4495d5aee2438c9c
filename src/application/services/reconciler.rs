//! Per-tick reconciliation between the live database and the planning
//! store.
//!
//! Robots and carts are copied by name; bookings are upserted and then
//! value-diffed against the previously reported snapshot. The diff is
//! what the booking state machine consumes, so updates landing within
//! the same clock second are never lost: a row is reported exactly when
//! its content changed, regardless of its `last_change` timestamp.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime};
use sea_orm::ConnectionTrait;
use tracing::{debug, warn};

use crate::domain::DomainResult;
use crate::infrastructure::database::entities::booking;
use crate::infrastructure::database::live::{
    LiveStore, LiveValue, CART_INFO_HEADERS, ROBOT_INFO_HEADERS,
};
use crate::infrastructure::database::plan;
use crate::shared::time::now;

pub struct Reconciler {
    /// Snapshot of each booking as last reported to the state machine.
    reported: HashMap<i64, booking::Model>,
    /// Lower bound for the next live bookings query. Ties at the second
    /// boundary are re-fetched on purpose; the value diff dedupes them.
    watermark: NaiveDateTime,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            reported: HashMap::new(),
            watermark: DateTime::UNIX_EPOCH.naive_utc(),
        }
    }

    /// Copy live rows into the planning store (steps 1–3 of the tick).
    pub async fn reconcile<C: ConnectionTrait>(
        &mut self,
        live: &LiveStore,
        db: &C,
    ) -> DomainResult<()> {
        let robot_infos = live
            .fetch_by_first_header("robot_info", ROBOT_INFO_HEADERS)
            .await?;
        for (name, row) in &robot_infos {
            plan::update_robot_telemetry(
                db,
                name,
                text(row, "robot_location").as_deref().unwrap_or_default(),
                text(row, "ongoing_action"),
                text(row, "previous_action"),
                float(row, "robot_charge"),
                int(row, "error_count") as i32,
            )
            .await?;
        }

        let cart_infos = live
            .fetch_by_first_header("cart_info", CART_INFO_HEADERS)
            .await?;
        for (name, row) in &cart_infos {
            if let Some(location) = text(row, "cart_location") {
                plan::set_cart_location(db, name, &location).await?;
            }
        }

        let rows = live.fetch_updated_bookings(self.watermark).await?;
        for row in rows {
            let Some(parsed) = parse_booking_row(&row) else {
                warn!("Skipping booking row without a session id");
                continue;
            };
            if let Some(last_change) = parsed.last_change {
                if last_change > self.watermark {
                    self.watermark = last_change;
                }
            }
            let existing = plan::booking(db, parsed.id).await?;
            let model = merge_with_existing(parsed, existing.as_ref());
            plan::upsert_booking(db, model).await?;
        }
        Ok(())
    }

    /// Bookings whose snapshot changed since they were last reported.
    /// Calling this twice without an intervening live change returns an
    /// empty set the second time.
    pub async fn updated_bookings<C: ConnectionTrait>(
        &mut self,
        db: &C,
    ) -> DomainResult<Vec<booking::Model>> {
        let mut changed = Vec::new();
        for model in plan::bookings(db).await? {
            match self.reported.get(&model.id) {
                Some(previous) if *previous == model => {}
                _ => {
                    debug!(booking = model.id, status = %model.charging_session_status, "Booking changed");
                    self.reported.insert(model.id, model.clone());
                    changed.push(model);
                }
            }
        }
        Ok(changed)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Row parsing ─────────────────────────────────────────────────

type LiveRow = BTreeMap<String, LiveValue>;

fn text(row: &LiveRow, column: &str) -> Option<String> {
    row.get(column)
        .filter(|v| !v.is_null())
        .map(ToString::to_string)
}

fn float(row: &LiveRow, column: &str) -> f64 {
    row.get(column).and_then(LiveValue::as_float).unwrap_or(0.0)
}

fn int(row: &LiveRow, column: &str) -> i64 {
    row.get(column).and_then(LiveValue::as_int).unwrap_or(0)
}

fn datetime(row: &LiveRow, column: &str) -> Option<NaiveDateTime> {
    row.get(column).and_then(LiveValue::as_datetime)
}

fn duration_secs(row: &LiveRow, column: &str) -> i64 {
    row.get(column)
        .and_then(LiveValue::as_duration)
        .map(|d| d.num_seconds())
        .unwrap_or(0)
}

fn parse_booking_row(row: &LiveRow) -> Option<booking::Model> {
    let id = row.get("charging_session_id").and_then(LiveValue::as_int)?;
    let drop_location = text(row, "drop_location");
    Some(booking::Model {
        id,
        charging_session_status: text(row, "charging_session_status").unwrap_or_default(),
        last_change: datetime(row, "last_change"),
        planned_drop_time: datetime(row, "drop_date_time"),
        drop_location: drop_location.clone(),
        planned_plugintime_secs: duration_secs(row, "plugintime_calculated"),
        planned_pickup_time: datetime(row, "pick_up_date_time"),
        bev_slot_planned: text(row, "BEV_slot_planned"),
        bev_port_location: text(row, "bev_Port_Location"),
        actual_drop_time: datetime(row, "Actual_BEV_Drop_Time"),
        // Actual location reporting is not wired up yet; mirror the
        // planned drop location.
        actual_location: drop_location,
        actual_plugintime_secs: duration_secs(row, "Actual_plugintime_calculated"),
        actual_pickup_time: datetime(row, "Actual_BEV_Pickup_Time"),
        charge_request: float(row, "Actual_Target_SOC") - float(row, "Actual_Drop_SOC"),
        creation_time: datetime(row, "booking_date_time_dev").unwrap_or_else(now),
        completion_time: None,
    })
}

/// Keep locally-owned fields across upserts.
fn merge_with_existing(mut parsed: booking::Model, existing: Option<&booking::Model>) -> booking::Model {
    if let Some(existing) = existing {
        parsed.creation_time = existing.creation_time;
        parsed.completion_time = existing.completion_time;
    }
    parsed
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: &[(&str, LiveValue)]) -> LiveRow {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parses_a_minimal_booking_row() {
        let parsed = parse_booking_row(&row(&[
            ("charging_session_id", LiveValue::Int(5)),
            ("charging_session_status", LiveValue::Text("checked_in".into())),
            ("drop_location", LiveValue::Text("ADS_1".into())),
            ("plugintime_calculated", LiveValue::Int(30)),
            ("Actual_Drop_SOC", LiveValue::Int(20)),
            ("Actual_Target_SOC", LiveValue::Int(80)),
        ]))
        .unwrap();
        assert_eq!(parsed.id, 5);
        assert_eq!(parsed.charging_session_status, "checked_in");
        assert_eq!(parsed.drop_location.as_deref(), Some("ADS_1"));
        assert_eq!(parsed.planned_plugintime_secs, 30 * 60);
        assert_eq!(parsed.charge_request, 60.0);
    }

    #[test]
    fn row_without_id_is_rejected() {
        assert!(parse_booking_row(&row(&[(
            "charging_session_status",
            LiveValue::Text("checked_in".into())
        )]))
        .is_none());
    }

    #[test]
    fn sql_null_text_is_dropped() {
        let parsed = parse_booking_row(&row(&[
            ("charging_session_id", LiveValue::Int(1)),
            ("drop_location", LiveValue::Text("NULL".into())),
        ]))
        .unwrap();
        assert_eq!(parsed.drop_location, None);
    }
}
