//! Job-related RPCs: FetchJob, UpdateJobMonitor, Ready2PlugInADS.

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::api::dto::{FetchJobResponse, Ready2PlugResponse, RpcRequest, UpdateJobResponse};
use crate::api::router::AppState;

pub async fn fetch_job(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<FetchJobResponse> {
    let _guard = state.rpc_lock.lock().await;
    let job = state.handle.fetch_job(&request.robot_name);
    Json(FetchJobResponse {
        message: "finished processing".to_string(),
        job,
    })
}

pub async fn update_job_monitor(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<UpdateJobResponse> {
    let _guard = state.rpc_lock.lock().await;
    let success = match state.handle.update_job(
        &request.robot_name,
        &request.job_name,
        &request.job_status,
    ) {
        Ok(success) => success,
        Err(e) => {
            warn!(
                robot = request.robot_name.as_str(),
                status = request.job_status.as_str(),
                "Rejected job update: {e}"
            );
            false
        }
    };
    Json(UpdateJobResponse { success })
}

pub async fn ready_to_plug_in_ads(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<Ready2PlugResponse> {
    let _guard = state.rpc_lock.lock().await;
    let ready_to_plugin = state.handle.handshake_plug_in(&request.robot_name);
    Json(Ready2PlugResponse { ready_to_plugin })
}
