//! External concerns: the two databases.

pub mod database;

pub use database::init_plan_database;
pub use database::live::{LiveStore, LiveStoreConfig};
