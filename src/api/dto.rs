//! Wire types for the robot-facing RPC surface.
//!
//! Requests mirror the single request message the robot client sends:
//! a bag of optional identifiers, of which each RPC reads its subset.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::application::JobDetails;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub robot_name: String,
    #[serde(default)]
    pub cart_name: String,
    #[serde(default)]
    pub station_name: String,
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub job_status: String,
    #[serde(default)]
    pub request_name: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub rdbc_data: JsonValue,
    #[serde(default)]
    pub log_text: String,
}

#[derive(Debug, Serialize)]
pub struct FetchJobResponse {
    pub message: String,
    pub job: JobDetails,
}

#[derive(Debug, Serialize)]
pub struct FreeStationResponse {
    pub station_name: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateJobResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetBlockerResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct Ready2PlugResponse {
    pub ready_to_plugin: bool,
}

#[derive(Debug, Serialize)]
pub struct BatteryCommunicationResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct OperationTimeResponse {
    pub msec: i64,
}

#[derive(Debug, Serialize)]
pub struct PushToLdbResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateRdbResponse {
    pub tables: JsonValue,
}

#[derive(Debug, Serialize)]
pub struct PullLdbResponse {
    /// Base64-encoded bytes of the embedded live database file.
    pub ldb: String,
}

#[derive(Debug, Serialize)]
pub struct LogTextResponse {
    pub success: bool,
}
