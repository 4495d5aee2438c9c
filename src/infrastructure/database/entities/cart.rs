//! Cart entity (planning store)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    pub location: String,

    /// Booking this cart is currently fulfilling. An available cart
    /// never carries a booking.
    #[sea_orm(nullable)]
    pub booking_id: Option<i64>,

    pub plugged: bool,

    #[sea_orm(nullable)]
    pub action_state: Option<String>,

    // Charger sub-states mirrored from the battery telemetry tables.
    #[sea_orm(nullable)]
    pub mode_response: Option<String>,

    #[sea_orm(nullable)]
    pub state_of_charge: Option<String>,

    #[sea_orm(nullable)]
    pub status_flag: Option<String>,

    pub charger_ok: bool,

    #[sea_orm(nullable)]
    pub charger_state: Option<String>,

    pub charger_error: bool,

    pub balancing_request: bool,

    /// Charge percentage available for delivery.
    pub cart_charge: f64,

    pub available: bool,

    pub error_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
