//! Station RPCs: AskFreeStation, ResetStationBlocker.

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::api::dto::{FreeStationResponse, ResetBlockerResponse, RpcRequest};
use crate::api::router::AppState;

fn prefix_for(request_name: &str) -> Option<&'static str> {
    match request_name {
        "ask_free_bcs" | "reset_bcs_blocker" => Some("BCS_"),
        "ask_free_bws" | "reset_bws_blocker" => Some("BWS_"),
        _ => None,
    }
}

pub async fn ask_free_station(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<FreeStationResponse> {
    let _guard = state.rpc_lock.lock().await;
    let Some(prefix) = prefix_for(&request.request_name) else {
        warn!(request_name = request.request_name.as_str(), "Unknown station request");
        return Json(FreeStationResponse {
            station_name: String::new(),
        });
    };
    let station_name = match state
        .picker
        .search_free_station(&state.live, &state.plan, &request.robot_name, prefix)
        .await
    {
        Ok(name) => name,
        Err(e) => {
            warn!(robot = request.robot_name.as_str(), "Free station search failed: {e}");
            String::new()
        }
    };
    Json(FreeStationResponse { station_name })
}

pub async fn reset_station_blocker(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<ResetBlockerResponse> {
    let _guard = state.rpc_lock.lock().await;
    let success = match prefix_for(&request.request_name) {
        Some(prefix) => state.handle.reset_blockers(&request.robot_name, prefix),
        None => {
            warn!(request_name = request.request_name.as_str(), "Unknown blocker reset");
            false
        }
    };
    Json(ResetBlockerResponse { success })
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_names_map_to_prefixes() {
        assert_eq!(prefix_for("ask_free_bcs"), Some("BCS_"));
        assert_eq!(prefix_for("ask_free_bws"), Some("BWS_"));
        assert_eq!(prefix_for("reset_bcs_blocker"), Some("BCS_"));
        assert_eq!(prefix_for("reset_bws_blocker"), Some("BWS_"));
        assert_eq!(prefix_for("ask_free_rbs"), None);
    }
}
