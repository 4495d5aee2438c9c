//! Booking snapshot entity (planning store)
//!
//! Mirror of the live `orders_in` rows the planner cares about. The
//! reconciler upserts these every tick; the value-based diff against the
//! previous snapshot is what drives the booking state machine.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::BookingState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    /// `charging_session_id` in the live store.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    pub charging_session_status: String,

    #[sea_orm(nullable)]
    pub last_change: Option<DateTime>,

    #[sea_orm(nullable)]
    pub planned_drop_time: Option<DateTime>,

    #[sea_orm(nullable)]
    pub drop_location: Option<String>,

    /// Planned plug-in duration in seconds.
    pub planned_plugintime_secs: i64,

    #[sea_orm(nullable)]
    pub planned_pickup_time: Option<DateTime>,

    #[sea_orm(nullable)]
    pub bev_slot_planned: Option<String>,

    #[sea_orm(nullable)]
    pub bev_port_location: Option<String>,

    #[sea_orm(nullable)]
    pub actual_drop_time: Option<DateTime>,

    #[sea_orm(nullable)]
    pub actual_location: Option<String>,

    pub actual_plugintime_secs: i64,

    #[sea_orm(nullable)]
    pub actual_pickup_time: Option<DateTime>,

    /// target SOC − drop SOC, the charge the cart must deliver.
    pub charge_request: f64,

    pub creation_time: DateTime,

    #[sea_orm(nullable)]
    pub completion_time: Option<DateTime>,
}

impl Model {
    pub fn status(&self) -> Option<BookingState> {
        BookingState::parse(&self.charging_session_status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
