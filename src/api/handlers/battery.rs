//! Battery RPCs: BatteryCommunication, OperationTime.

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::api::dto::{BatteryCommunicationResponse, OperationTimeResponse, RpcRequest};
use crate::api::router::AppState;

pub async fn battery_communication(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<BatteryCommunicationResponse> {
    let _guard = state.rpc_lock.lock().await;
    let success = match state
        .battery
        .dispatch(&request.request_name, &request.cart_name, &request.station_name)
        .await
    {
        Ok(success) => success,
        Err(e) => {
            warn!(
                cart = request.cart_name.as_str(),
                request_name = request.request_name.as_str(),
                "Battery communication failed: {e}"
            );
            false
        }
    };
    Json(BatteryCommunicationResponse { success })
}

pub async fn operation_time(
    State(state): State<AppState>,
    Json(_request): Json<RpcRequest>,
) -> Json<OperationTimeResponse> {
    let _guard = state.rpc_lock.lock().await;
    // TODO: derive the remaining time from the cart's booking plug-in
    // duration once the charger reports charge progress.
    Json(OperationTimeResponse { msec: 30_000 })
}
