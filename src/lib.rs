//! # ChargePal Fleet Controller
//!
//! Central controller for a parking-lot robot charging service: mobile
//! robots move battery carts between adapter stations (where vehicles
//! dock), charging stations, waiting stations, and their own base
//! stations. The controller ingests an externally populated booking
//! table, plans which robot moves which cart where, exposes a job-fetch
//! RPC to the robots, and drives the booking and job state machines.
//!
//! ## Architecture
//!
//! - **domain**: job/booking/charger state machines, layout, errors
//! - **application**: the planner tick loop, its services, the RPC
//!   request queue, and the battery command protocol
//! - **infrastructure**: the planning store (SQLite via SeaORM) and the
//!   bridge to the externally shared live database (MySQL + SQLite
//!   fallback)
//! - **api**: the robot-facing RPC surface (axum)
//! - **config**: application configuration (TOML-based)

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export commonly used types at crate root
pub use api::{create_rpc_router, AppState};
pub use application::{Planner, PlannerConfig, PlannerHandle};
pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_plan_database, LiveStore, LiveStoreConfig};
pub use shared::ShutdownSignal;
