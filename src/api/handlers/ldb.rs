//! Live-database RPCs: UpdateRDB, PullLDB, PushToLDB, LogText.

use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::api::dto::{
    LogTextResponse, PullLdbResponse, PushToLdbResponse, RpcRequest, UpdateRdbResponse,
};
use crate::api::router::AppState;

pub async fn update_rdb(State(state): State<AppState>) -> Json<UpdateRdbResponse> {
    let tables = match state.live.dump_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            warn!("Live database dump failed: {e}");
            JsonValue::Null
        }
    };
    Json(UpdateRdbResponse { tables })
}

pub async fn pull_ldb(State(state): State<AppState>) -> Json<PullLdbResponse> {
    let ldb = match state.live.file_bytes().await {
        Ok(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        Err(e) => {
            warn!("Live database file read failed: {e}");
            String::new()
        }
    };
    Json(PullLdbResponse { ldb })
}

pub async fn push_to_ldb(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<PushToLdbResponse> {
    let _guard = state.rpc_lock.lock().await;
    let rows: Vec<Vec<JsonValue>> = match serde_json::from_value(request.rdbc_data.clone()) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(table = request.table_name.as_str(), "Malformed rdbc data: {e}");
            return Json(PushToLdbResponse { success: false });
        }
    };
    let success = match state.live.push_table_rows(&request.table_name, &rows).await {
        Ok(success) => success,
        Err(e) => {
            warn!(table = request.table_name.as_str(), "Push to live database failed: {e}");
            false
        }
    };
    Json(PushToLdbResponse { success })
}

pub async fn log_text(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<LogTextResponse> {
    // Robot names become file names; keep them to one path component.
    if request.robot_name.is_empty()
        || request
            .robot_name
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
    {
        warn!(robot = request.robot_name.as_str(), "Refusing log for unusable robot name");
        return Json(LogTextResponse { success: false });
    }
    let path = state.logs_dir.join(format!("{}.txt", request.robot_name));
    let success = match tokio::fs::create_dir_all(&state.logs_dir).await {
        Ok(()) => tokio::fs::write(&path, &request.log_text).await.is_ok(),
        Err(e) => {
            warn!("Could not create log directory: {e}");
            false
        }
    };
    Json(LogTextResponse { success })
}
