//! Planning store migrations

pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_robots;
mod m20240601_000002_create_carts;
mod m20240601_000003_create_stations;
mod m20240601_000004_create_jobs;
mod m20240601_000005_create_bookings;
mod m20240601_000006_create_distances;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_robots::Migration),
            Box::new(m20240601_000002_create_carts::Migration),
            Box::new(m20240601_000003_create_stations::Migration),
            Box::new(m20240601_000004_create_jobs::Migration),
            Box::new(m20240601_000005_create_bookings::Migration),
            Box::new(m20240601_000006_create_distances::Migration),
        ]
    }
}
