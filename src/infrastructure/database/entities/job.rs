//! Job entity (planning store)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{JobState, JobType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Monotonically assigned by the planner, never reused.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    /// JobType string, e.g. "BRING_CHARGER".
    pub job_type: String,

    /// JobState string, e.g. "OPEN".
    pub state: String,

    /// Earliest time the job should be bound to resources.
    pub schedule: DateTime,

    #[sea_orm(nullable)]
    pub deadline: Option<DateTime>,

    #[sea_orm(nullable)]
    pub booking_id: Option<i64>,

    /// True while a robot holds this job (PENDING or ONGOING).
    pub currently_assigned: bool,

    #[sea_orm(nullable)]
    pub robot_name: Option<String>,

    #[sea_orm(nullable)]
    pub cart_name: Option<String>,

    #[sea_orm(nullable)]
    pub source_station: Option<String>,

    #[sea_orm(nullable)]
    pub target_station: Option<String>,

    #[sea_orm(nullable)]
    pub charging_type: Option<String>,

    #[sea_orm(nullable)]
    pub port_location: Option<String>,

    #[sea_orm(nullable)]
    pub start: Option<DateTime>,

    #[sea_orm(nullable)]
    pub end: Option<DateTime>,
}

impl Model {
    pub fn job_type(&self) -> Option<JobType> {
        JobType::parse(&self.job_type)
    }

    pub fn job_state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
