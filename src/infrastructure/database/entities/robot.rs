//! Robot entity (planning store)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "robots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Station the robot currently stands at.
    pub location: String,

    #[sea_orm(nullable)]
    pub current_job_id: Option<i32>,

    #[sea_orm(nullable)]
    pub ongoing_action: Option<String>,

    #[sea_orm(nullable)]
    pub previous_action: Option<String>,

    #[sea_orm(nullable)]
    pub cart_on_robot: Option<String>,

    /// Self-charge percentage.
    pub robot_charge: f64,

    pub available: bool,

    pub error_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
