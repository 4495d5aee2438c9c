//! Station entity (planning store)
//!
//! Station names follow the prefix convention: `ADS_` adapter, `BCS_`
//! battery charging, `BWS_` battery waiting, `RBS_` robot base.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    pub pose: String,

    /// Cart the station is exclusively held for, if any.
    #[sea_orm(nullable)]
    pub reservation: Option<String>,

    pub available: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
