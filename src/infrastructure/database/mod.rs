//! Database infrastructure: the planning store (owned, SQLite) and the
//! bridge to the externally shared live database.

pub mod entities;
pub mod live;
pub mod migrator;
pub mod plan;

use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::domain::DomainResult;

/// Connect to the planning store and bring its schema up to date.
pub async fn init_plan_database(url: &str) -> DomainResult<DatabaseConnection> {
    let db = Database::connect(url).await?;
    migrator::Migrator::up(&db, None).await?;
    Ok(db)
}
