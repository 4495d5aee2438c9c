//! Bridge to the externally shared "live" database.
//!
//! This is the only module allowed to touch the live schema. The
//! primary backend is a networked MySQL server; a file-backed SQLite
//! database serves as fallback when the primary is unconfigured or
//! unreachable. Robot, cart, and env rows live in the embedded file;
//! bookings (`orders_in`) and the battery telemetry tables sit on the
//! primary when one exists.

pub mod value;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::domain::{BookingState, DomainError, DomainResult};
use crate::shared::time::{datetime_str, now};

pub use value::LiveValue;

/// Booking columns the core depends on (subset of `orders_in`).
pub const BOOKING_HEADERS: &[&str] = &[
    "charging_session_id",
    "drop_location",
    "charging_session_status",
    "drop_date_time",
    "pick_up_date_time",
    "plugintime_calculated",
    "booking_date_time_dev",
    "last_change",
    "Actual_Drop_SOC",
    "Actual_Target_SOC",
    "Actual_plugintime_calculated",
    "Actual_BEV_Drop_Time",
    "Actual_BEV_Pickup_Time",
    "BEV_slot_planned",
    "bev_Port_Location",
];

pub const ROBOT_INFO_HEADERS: &[&str] = &[
    "name",
    "robot_location",
    "current_job",
    "ongoing_action",
    "previous_action",
    "cart_on_robot",
    "job_status",
    "availability",
    "robot_charge",
    "error_count",
];

pub const CART_INFO_HEADERS: &[&str] = &[
    "name",
    "cart_location",
    "robot_on_cart",
    "plugged",
    "action_state",
    "error_count",
];

/// Battery telemetry table written by the charger gateway.
pub const BATTERY_TABLE: &str = "CAN_MSG_RX_LIVE";

#[derive(Debug, Clone)]
pub struct LiveStoreConfig {
    /// Primary backend; absent means fallback-only operation.
    pub mysql_url: Option<String>,
    /// Embedded fallback database file.
    pub sqlite_path: PathBuf,
}

pub struct LiveStore {
    primary: Option<DatabaseConnection>,
    fallback: DatabaseConnection,
    sqlite_path: PathBuf,
}

impl LiveStore {
    pub async fn connect(config: &LiveStoreConfig) -> DomainResult<Self> {
        let fallback_url = format!("sqlite://{}?mode=rwc", config.sqlite_path.display());
        let fallback = Database::connect(&fallback_url).await?;

        let primary = match &config.mysql_url {
            Some(url) => match Database::connect(url.as_str()).await {
                Ok(conn) => {
                    info!("Connected to primary live database");
                    Some(conn)
                }
                Err(e) => {
                    warn!(
                        "No primary live database reachable, using '{}' instead: {e}",
                        config.sqlite_path.display()
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            primary,
            fallback,
            sqlite_path: config.sqlite_path.clone(),
        })
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    // ── Backend routing ─────────────────────────────────────────

    /// Read from the primary, falling back to the embedded database
    /// when the primary is unconfigured or the read fails.
    async fn query_shared(
        &self,
        build: impl Fn(DbBackend) -> Statement,
    ) -> DomainResult<Vec<sea_orm::QueryResult>> {
        if let Some(primary) = &self.primary {
            match primary.query_all(build(primary.get_database_backend())).await {
                Ok(rows) => return Ok(rows),
                Err(e) => warn!("Primary live database read failed, using fallback: {e}"),
            }
        }
        Ok(self.fallback.query_all(build(DbBackend::Sqlite)).await?)
    }

    /// Mutate the shared tables. Failures on a configured primary are
    /// surfaced to the caller, never silently retargeted.
    async fn execute_shared(&self, build: impl Fn(DbBackend) -> Statement) -> DomainResult<()> {
        match &self.primary {
            Some(primary) => {
                primary.execute(build(primary.get_database_backend())).await?;
            }
            None => {
                self.fallback.execute(build(DbBackend::Sqlite)).await?;
            }
        }
        Ok(())
    }

    async fn query_embedded(&self, sql: String) -> DomainResult<Vec<sea_orm::QueryResult>> {
        Ok(self
            .fallback
            .query_all(Statement::from_string(DbBackend::Sqlite, sql))
            .await?)
    }

    // ── Robot / cart / env rows (embedded) ──────────────────────

    /// Return a mapping keyed by the first header column to a mapping
    /// of the remaining columns.
    pub async fn fetch_by_first_header(
        &self,
        table: &str,
        headers: &[&str],
    ) -> DomainResult<BTreeMap<String, BTreeMap<String, LiveValue>>> {
        check_identifier(table)?;
        let sql = format!("SELECT {} FROM {table}", headers.join(", "));
        let rows = self.query_embedded(sql).await?;
        let mut result = BTreeMap::new();
        for row in rows {
            let key = LiveValue::from_query(&row, headers[0]).to_string();
            let mut entry = BTreeMap::new();
            for header in &headers[1..] {
                entry.insert((*header).to_string(), LiveValue::from_query(&row, header));
            }
            result.insert(key, entry);
        }
        Ok(result)
    }

    /// Env-info rows parsed into name lists.
    pub async fn fetch_env_infos(&self) -> DomainResult<BTreeMap<String, Vec<String>>> {
        let rows = self
            .query_embedded("SELECT name, value FROM env_info".to_string())
            .await?;
        let mut infos = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get_by("name")?;
            let value: Option<String> = row.try_get_by("value")?;
            infos.insert(name, parse_name_list(value.as_deref().unwrap_or("")));
        }
        Ok(infos)
    }

    pub async fn fetch_env_count(&self, name: &str) -> DomainResult<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "SELECT count FROM env_info WHERE name = ?",
            [name.into()],
        );
        let row = self
            .fallback
            .query_one(stmt)
            .await?
            .ok_or_else(|| DomainError::not_found("env_info", "name", name))?;
        Ok(row.try_get_by::<i64, _>("count")?)
    }

    /// Update the locations of a robot and the cart it carries.
    pub async fn update_location(
        &self,
        location: &str,
        robot: &str,
        cart: Option<&str>,
    ) -> DomainResult<()> {
        self.fallback
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "UPDATE robot_info SET robot_location = ? WHERE name = ?",
                [location.into(), robot.into()],
            ))
            .await?;
        if let Some(cart) = cart {
            self.fallback
                .execute(Statement::from_sql_and_values(
                    DbBackend::Sqlite,
                    "UPDATE cart_info SET cart_location = ? WHERE name = ?",
                    [location.into(), cart.into()],
                ))
                .await?;
        }
        debug!(robot, cart, location, "Pushed location update");
        Ok(())
    }

    // ── Bookings (shared) ───────────────────────────────────────

    /// Bookings whose `last_change` is at or after `since`. Ties at the
    /// second boundary are returned again on purpose; the reconciler
    /// value-diffs, it does not trust the timestamp alone.
    pub async fn fetch_updated_bookings(
        &self,
        since: NaiveDateTime,
    ) -> DomainResult<Vec<BTreeMap<String, LiveValue>>> {
        let sql = format!(
            "SELECT {} FROM orders_in WHERE last_change >= ?",
            BOOKING_HEADERS.join(", ")
        );
        let threshold = datetime_str(since);
        let rows = self
            .query_shared(|backend| {
                Statement::from_sql_and_values(
                    backend,
                    sql.clone(),
                    [threshold.clone().into()],
                )
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                BOOKING_HEADERS
                    .iter()
                    .map(|header| ((*header).to_string(), LiveValue::from_query(&row, header)))
                    .collect()
            })
            .collect())
    }

    /// Clear the bookings table. Development mode only.
    pub async fn delete_bookings(&self) -> DomainResult<()> {
        self.execute_shared(|backend| {
            Statement::from_string(backend, "DELETE FROM orders_in".to_string())
        })
        .await
    }

    pub async fn get_session_statuses(&self) -> DomainResult<Vec<(i64, String)>> {
        let rows = self
            .query_shared(|backend| {
                Statement::from_string(
                    backend,
                    "SELECT charging_session_id, charging_session_status FROM orders_in"
                        .to_string(),
                )
            })
            .await?;
        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            let id = LiveValue::from_query(&row, "charging_session_id")
                .as_int()
                .unwrap_or_default();
            let status = LiveValue::from_query(&row, "charging_session_status").to_string();
            statuses.push((id, status));
        }
        Ok(statuses)
    }

    pub async fn update_session_status(
        &self,
        charging_session_id: i64,
        status: BookingState,
    ) -> DomainResult<()> {
        self.execute_shared(|backend| {
            Statement::from_sql_and_values(
                backend,
                "UPDATE orders_in SET charging_session_status = ? WHERE charging_session_id = ?",
                [status.as_str().into(), charging_session_id.into()],
            )
        })
        .await?;
        self.execute_shared(|backend| {
            Statement::from_sql_and_values(
                backend,
                "UPDATE orders_in SET last_change = ? WHERE charging_session_id = ?",
                [datetime_str(now()).into(), charging_session_id.into()],
            )
        })
        .await
    }

    // ── Battery telemetry (shared, read-mostly) ─────────────────

    /// Read one telemetry column for a battery cart.
    pub async fn read_battery_value(
        &self,
        table: &str,
        battery: &str,
        column: &str,
    ) -> DomainResult<LiveValue> {
        check_identifier(table)?;
        check_identifier(column)?;
        let sql = format!("SELECT {column} FROM {table} WHERE Battry_ID = ?");
        let rows = self
            .query_shared(|backend| {
                Statement::from_sql_and_values(backend, sql.clone(), [battery.into()])
            })
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| DomainError::not_found("battery", "Battry_ID", battery))?;
        Ok(LiveValue::from_query(row, column))
    }

    /// Battery state rows changed at or after `since`, as
    /// `(cart, state_text)` pairs.
    pub async fn fetch_battery_states(
        &self,
        since: NaiveDateTime,
    ) -> DomainResult<Vec<(String, String)>> {
        let threshold = datetime_str(since);
        let rows = self
            .query_shared(|backend| {
                Statement::from_sql_and_values(
                    backend,
                    format!(
                        "SELECT Battry_ID, Bat_State_actual FROM {BATTERY_TABLE} \
                         WHERE last_change >= ?"
                    ),
                    [threshold.clone().into()],
                )
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    LiveValue::from_query(&row, "Battry_ID").to_string(),
                    LiveValue::from_query(&row, "Bat_State_actual").to_string(),
                )
            })
            .collect())
    }

    /// Write one telemetry column and bump `last_change`.
    pub async fn update_battery(
        &self,
        battery: &str,
        column: &str,
        value: &str,
    ) -> DomainResult<()> {
        check_identifier(column)?;
        let sql =
            format!("UPDATE {BATTERY_TABLE} SET {column} = ?, last_change = ? WHERE Battry_ID = ?");
        self.execute_shared(|backend| {
            Statement::from_sql_and_values(
                backend,
                sql.clone(),
                [value.into(), datetime_str(now()).into(), battery.into()],
            )
        })
        .await
    }

    // ── Dump / push / pull (embedded file) ──────────────────────

    async fn table_columns(&self, table: &str) -> DomainResult<Vec<String>> {
        check_identifier(table)?;
        let rows = self
            .query_embedded(format!("PRAGMA table_info({table})"))
            .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get_by::<String, _>("name")?);
        }
        Ok(columns)
    }

    /// Serialize every embedded table: CREATE statement, column names,
    /// and all rows. Consumed by the `UpdateRDB` RPC.
    pub async fn dump_tables(&self) -> DomainResult<JsonValue> {
        let master = self
            .query_embedded(
                "SELECT name, sql FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%'"
                    .to_string(),
            )
            .await?;
        let mut tables = serde_json::Map::new();
        for row in master {
            let name: String = row.try_get_by("name")?;
            let schema: Option<String> = row.try_get_by("sql")?;
            let columns = self.table_columns(&name).await?;
            if columns.is_empty() {
                continue;
            }
            let rows = self
                .query_embedded(format!("SELECT {} FROM {name}", columns.join(", ")))
                .await?;
            let json_rows: Vec<JsonValue> = rows
                .iter()
                .map(|r| {
                    JsonValue::Array(
                        columns
                            .iter()
                            .map(|c| live_value_to_json(&LiveValue::from_query(r, c)))
                            .collect(),
                    )
                })
                .collect();
            tables.insert(
                name,
                serde_json::json!({
                    "schema": schema,
                    "columns": columns,
                    "rows": json_rows,
                }),
            );
        }
        Ok(JsonValue::Object(tables))
    }

    /// Raw bytes of the embedded database file, for the `PullLDB` RPC.
    pub async fn file_bytes(&self) -> DomainResult<Vec<u8>> {
        Ok(tokio::fs::read(&self.sqlite_path).await?)
    }

    /// Apply full-row updates pushed by a robot (`PushToLDB`). Rows are
    /// keyed by their first column (`name`); unknown names are skipped.
    pub async fn push_table_rows(
        &self,
        table: &str,
        rows: &[Vec<JsonValue>],
    ) -> DomainResult<bool> {
        if table != "robot_info" && table != "cart_info" {
            return Ok(false);
        }
        let columns = self.table_columns(table).await?;
        if columns.is_empty() {
            return Ok(false);
        }
        let assignments = columns
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        for row in rows {
            if row.len() != columns.len() {
                return Err(DomainError::Protocol(format!(
                    "pushed row has {} values, table {table} has {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            let Some(key) = row.first().and_then(JsonValue::as_str) else {
                continue;
            };
            let existing = self
                .fallback
                .query_one(Statement::from_sql_and_values(
                    DbBackend::Sqlite,
                    format!("SELECT name FROM {table} WHERE name = ?"),
                    [key.into()],
                ))
                .await?;
            if existing.is_none() {
                continue;
            }
            let mut values: Vec<Value> = row.iter().map(json_to_value).collect();
            values.push(key.into());
            self.fallback
                .execute(Statement::from_sql_and_values(
                    DbBackend::Sqlite,
                    format!("UPDATE {table} SET {assignments} WHERE name = ?"),
                    values,
                ))
                .await?;
        }
        Ok(true)
    }
}

/// Parse the bracketed, single-quoted name list stored in
/// `env_info.value`, e.g. `['ChargePal1', 'ChargePal2']`.
fn parse_name_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|part| part.trim().trim_matches('\'').trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Identifiers interpolated into SQL must stay plain words.
fn check_identifier(name: &str) -> DomainResult<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DomainError::Protocol(format!("invalid identifier '{name}'")))
    }
}

fn live_value_to_json(value: &LiveValue) -> JsonValue {
    match value {
        LiveValue::Null => JsonValue::Null,
        LiveValue::Int(i) => JsonValue::from(*i),
        LiveValue::Float(f) => JsonValue::from(*f),
        _ => JsonValue::String(value.to_string()),
    }
}

fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::String(None),
        JsonValue::Bool(b) => (*b).into(),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or_default().into()
            }
        }
        JsonValue::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_env_name_lists() {
        assert_eq!(
            parse_name_list("['ChargePal1', 'ChargePal2']"),
            vec!["ChargePal1".to_string(), "ChargePal2".to_string()]
        );
        assert_eq!(parse_name_list("[]"), Vec::<String>::new());
        assert_eq!(parse_name_list("['BAT_1']"), vec!["BAT_1".to_string()]);
    }

    #[test]
    fn rejects_hostile_identifiers() {
        assert!(check_identifier("Bat_State_actual").is_ok());
        assert!(check_identifier("state; DROP TABLE x").is_err());
        assert!(check_identifier("").is_err());
    }
}
