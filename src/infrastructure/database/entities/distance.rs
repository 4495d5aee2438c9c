//! Distance entity (planning store)
//!
//! Materialized layout distances, written once at startup.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "distances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub start: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub target: String,

    pub distance: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
