//! RPC router.
//!
//! Thin by design: every handler takes the single RPC mutex, enqueues
//! (or reads a snapshot) through the planner handle, and composes a
//! typed response. Handlers never raise to the transport; failures
//! come back as typed negatives.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{battery, health, jobs, ldb, stations};
use crate::application::{BatteryCommunicator, PlannerHandle, StationPicker};
use crate::infrastructure::LiveStore;

#[derive(Clone)]
pub struct AppState {
    pub handle: PlannerHandle,
    pub live: Arc<LiveStore>,
    pub plan: DatabaseConnection,
    pub picker: Arc<StationPicker>,
    pub battery: Arc<BatteryCommunicator>,
    pub logs_dir: PathBuf,
    /// One mutex for all RPCs; handlers serialize against each other,
    /// never against the planner tick.
    pub rpc_lock: Arc<tokio::sync::Mutex<()>>,
}

pub fn create_rpc_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/rpc/fetch_job", post(jobs::fetch_job))
        .route("/rpc/update_job_monitor", post(jobs::update_job_monitor))
        .route("/rpc/ready_to_plug_in_ads", post(jobs::ready_to_plug_in_ads))
        .route("/rpc/ask_free_station", post(stations::ask_free_station))
        .route(
            "/rpc/reset_station_blocker",
            post(stations::reset_station_blocker),
        )
        .route(
            "/rpc/battery_communication",
            post(battery::battery_communication),
        )
        .route("/rpc/operation_time", post(battery::operation_time))
        .route("/rpc/update_rdb", post(ldb::update_rdb))
        .route("/rpc/pull_ldb", post(ldb::pull_ldb))
        .route("/rpc/push_to_ldb", post(ldb::push_to_ldb))
        .route("/rpc/log_text", post(ldb::log_text))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
