//! SeaORM entities for the planning store tables.

pub mod booking;
pub mod cart;
pub mod distance;
pub mod job;
pub mod robot;
pub mod station;
