//! Battery command protocol.
//!
//! Drives the cart charger firmware through mode-request frames and
//! verifies each step against the battery telemetry tables. The frame
//! transport (MQTT in production) sits behind the [`MessagePublisher`]
//! port; this module owns the sequencing and feedback polling only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::DomainResult;
use crate::infrastructure::database::live::{LiveStore, BATTERY_TABLE};

const FEEDBACK_TABLE: &str = "TX_ChargeOrdersFeedback";

// CAN frames understood by the cart charger.
const MSG_WAKEUP: &str = "1793,2,1,0";
const MSG_MODE_REQ_EV_DC_CHARGE: &str = "1793,2,2,0";
const MSG_MODE_REQ_EV_AC_CHARGE: &str = "1793,2,4,0";
const MSG_MODE_REQ_BAT_AC_CHARGE: &str = "1793,2,8,0";
const MSG_MODE_REQ_STANDBY: &str = "1793,2,16,0";
const MSG_MODE_REQ_IDLE: &str = "1793,2,32,0";
const MSG_UNLOCK_REQUEST: &str = "1793,2,64,0";
const MSG_MODE_REQ_BAT_ONLY: &str = "1793,2,128,0";
const MSG_PLUG_PROCESS_FINISHED: &str = "1793,2,0,1";
const MSG_EMERGENCY_SHUTDOWN: &str = "1793,2,0,2";

/// Outbound frame transport. Production wires an MQTT client here.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, cart: &str, message: &str) -> DomainResult<()>;
}

/// Default publisher used until the broker connection is configured:
/// logs every frame and succeeds.
pub struct LogPublisher;

#[async_trait]
impl MessagePublisher for LogPublisher {
    async fn publish(&self, cart: &str, message: &str) -> DomainResult<()> {
        info!(cart, message, "Battery frame published");
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Expected {
    Int(i64),
    Flag(&'static str),
}

pub struct BatteryCommunicator {
    live: Arc<LiveStore>,
    publisher: Arc<dyn MessagePublisher>,
    /// How long to wait for the firmware to acknowledge a frame.
    feedback_timeout: Duration,
    /// How long to wait for a telemetry column to reach a value.
    monitor_timeout: Duration,
    poll_interval: Duration,
}

impl BatteryCommunicator {
    pub fn new(live: Arc<LiveStore>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            live,
            publisher,
            feedback_timeout: Duration::from_secs(60),
            monitor_timeout: Duration::from_secs(180),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_timeouts(mut self, feedback: Duration, monitor: Duration) -> Self {
        self.feedback_timeout = feedback;
        self.monitor_timeout = monitor;
        self
    }

    /// Dispatch a `BatteryCommunication` request by name.
    pub async fn dispatch(
        &self,
        request_name: &str,
        cart: &str,
        station: &str,
    ) -> DomainResult<bool> {
        match request_name {
            "wakeup" => self.wakeup(cart).await,
            "mode_req_bat_only" => self.mode_req_bat_only(cart).await,
            "mode_req_standby" => self.mode_req_standby(cart).await,
            "mode_req_idle" => self.mode_req_idle(cart).await,
            "mode_req_EV_AC_Charge" => self.mode_req_ev_ac_charge(cart).await,
            "mode_req_EV_DC_Charge" => self.mode_req_ev_dc_charge(cart).await,
            "mode_req_Bat_AC_Charge" => self.mode_req_bat_ac_charge(cart).await,
            "mode_req_emergency_shutdown" => self.mode_req_emergency_shutdown(cart).await,
            name if name.starts_with("ladeprozess_start") => {
                let charging_type = name
                    .strip_prefix("ladeprozess_start_")
                    .unwrap_or("ac")
                    .to_string();
                self.ladeprozess_start(cart, station, &charging_type).await
            }
            name if name.contains("ladeprozess_end") => self.ladeprozess_end(cart, station).await,
            _ => Ok(false),
        }
    }

    // ── Telemetry helpers ───────────────────────────────────────

    async fn battery_mode(&self, cart: &str) -> DomainResult<String> {
        Ok(self
            .live
            .read_battery_value(BATTERY_TABLE, cart, "State_bat_mod")
            .await?
            .to_string()
            .to_lowercase())
    }

    async fn mode_flags(&self, cart: &str) -> DomainResult<String> {
        Ok(self
            .live
            .read_battery_value(BATTERY_TABLE, cart, "Flag_Modus")
            .await?
            .to_string()
            .to_lowercase())
    }

    async fn bat_only(&self, cart: &str) -> DomainResult<i64> {
        Ok(self
            .live
            .read_battery_value(BATTERY_TABLE, cart, "Mode_Bat_only")
            .await?
            .as_int()
            .unwrap_or(0))
    }

    /// Wait for the firmware acknowledgement in the feedback table.
    async fn check_feedback(&self, cart: &str, expected: &str) -> DomainResult<bool> {
        let deadline = tokio::time::Instant::now() + self.feedback_timeout;
        loop {
            let actual = self
                .live
                .read_battery_value(FEEDBACK_TABLE, cart, "Bat_State_actual")
                .await?
                .to_string();
            if actual == expected {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(cart, expected, actual = actual.as_str(), "Feedback timeout");
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for a telemetry column to reach an expected value.
    async fn monitor_result(
        &self,
        cart: &str,
        column: &str,
        expected: Expected,
    ) -> DomainResult<bool> {
        let deadline = tokio::time::Instant::now() + self.monitor_timeout;
        loop {
            let value = self
                .live
                .read_battery_value(BATTERY_TABLE, cart, column)
                .await?;
            let reached = match &expected {
                Expected::Int(i) => value.as_int() == Some(*i),
                Expected::Flag(flag) => value.to_string().eq_ignore_ascii_case(flag),
            };
            if reached {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(cart, column, ?expected, "Monitor timeout");
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn monitor_plug_unlock(&self, cart: &str, station: &str) -> DomainResult<bool> {
        if station.contains("ADS") {
            self.monitor_result(cart, "AC_Car_inlet_UNLOCKED", Expected::Int(1))
                .await
        } else if station.contains("BCS") {
            self.monitor_result(cart, "AC_Charger_inlet_UNLOCKED", Expected::Int(1))
                .await
        } else {
            Ok(false)
        }
    }

    // ── Mode requests ───────────────────────────────────────────

    async fn wakeup(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        if mode.contains("standby") && !mode.contains("error") {
            self.publisher.publish(cart, MSG_WAKEUP).await?;
            if self.check_feedback(cart, "WakeUp_OK").await? {
                return self.monitor_result(cart, "Mode_Bat_only", Expected::Int(1)).await;
            }
            return Ok(false);
        }
        Ok(mode.contains("batok") && !mode.contains("error") && self.bat_only(cart).await? == 1)
    }

    async fn mode_req_bat_only(&self, cart: &str) -> DomainResult<bool> {
        self.publisher.publish(cart, MSG_MODE_REQ_BAT_ONLY).await?;
        if self.check_feedback(cart, "Bat_only_OK").await? {
            return self.monitor_result(cart, "Mode_Bat_only", Expected::Int(1)).await;
        }
        Ok(false)
    }

    async fn mode_req_standby(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        if mode.contains("standby") && !mode.contains("error") {
            return Ok(true);
        }
        if !mode.contains("error") && self.bat_only(cart).await? == 1 {
            self.publisher.publish(cart, MSG_MODE_REQ_STANDBY).await?;
            if self.check_feedback(cart, "Standby_OK").await? {
                return self.monitor_result(cart, "Mode_Bat_only", Expected::Int(1)).await;
            }
        }
        Ok(false)
    }

    async fn mode_req_idle(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        let flags = self.mode_flags(cart).await?;
        if mode.contains("batok") && flags.contains("flag_idle") {
            return Ok(true);
        }
        if !mode.contains("error") && self.bat_only(cart).await? == 1 {
            self.publisher.publish(cart, MSG_MODE_REQ_IDLE).await?;
            if self.check_feedback(cart, "Mode_request_idle_OK").await? {
                return self
                    .monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_idle"))
                    .await;
            }
        }
        Ok(false)
    }

    async fn mode_req_ev_ac_charge(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        let flags = self.mode_flags(cart).await?;
        if !mode.contains("error") && flags.contains("flag_ev_ac_charge") {
            return Ok(true);
        }
        if !mode.contains("error") && flags.contains("flag_idle") {
            self.publisher.publish(cart, MSG_MODE_REQ_EV_AC_CHARGE).await?;
            if self.check_feedback(cart, "EV_Ac_Charge_OK").await? {
                return self
                    .monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_EV_AC_Charge"))
                    .await;
            }
        }
        Ok(false)
    }

    async fn mode_req_ev_dc_charge(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        let flags = self.mode_flags(cart).await?;
        if !mode.contains("error") && flags.contains("flag_ev_dc_charge") {
            return Ok(true);
        }
        if !mode.contains("error") && flags.contains("flag_idle") {
            self.publisher.publish(cart, MSG_MODE_REQ_EV_DC_CHARGE).await?;
            if self.check_feedback(cart, "EV_Dc_Charge_OK").await? {
                return self
                    .monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_EV_DC_Charge"))
                    .await;
            }
        }
        Ok(false)
    }

    async fn mode_req_bat_ac_charge(&self, cart: &str) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        let flags = self.mode_flags(cart).await?;
        if !mode.contains("error") && flags.contains("flag_bat_ac_charge") {
            return Ok(true);
        }
        if !mode.contains("error") && flags.contains("flag_idle") {
            self.publisher.publish(cart, MSG_MODE_REQ_BAT_AC_CHARGE).await?;
            if self.check_feedback(cart, "Bat_Ac_Charge_OK").await? {
                return self
                    .monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_Bat_AC_Charge"))
                    .await;
            }
        }
        Ok(false)
    }

    async fn mode_req_emergency_shutdown(&self, cart: &str) -> DomainResult<bool> {
        self.publisher.publish(cart, MSG_EMERGENCY_SHUTDOWN).await?;
        Ok(true)
    }

    // ── Plug process sequences ──────────────────────────────────

    /// Conclude the physical plug-in at `station` and switch the cart
    /// into the charging mode matching the station and charging type.
    async fn ladeprozess_start(
        &self,
        cart: &str,
        station: &str,
        charging_type: &str,
    ) -> DomainResult<bool> {
        let mode = self.battery_mode(cart).await?;
        let flags = self.mode_flags(cart).await?;
        let in_charge_mode = flags.contains("flag_ev_ac_charge")
            || flags.contains("flag_ev_dc_charge")
            || (flags.contains("flag_bat_ac_charge") && mode.contains("enable"));
        if !in_charge_mode {
            return Ok(false);
        }

        // DC charging keeps the inlet locked for the whole session.
        if !flags.contains("flag_ev_dc_charge") {
            self.publisher.publish(cart, MSG_UNLOCK_REQUEST).await?;
            if !self.check_feedback(cart, "Unlock_request_OK").await?
                || !self.monitor_plug_unlock(cart, station).await?
            {
                return Ok(false);
            }
        }

        self.publisher.publish(cart, MSG_PLUG_PROCESS_FINISHED).await?;
        if !self.check_feedback(cart, "PlugProcessFinished_Received").await? {
            return Ok(false);
        }
        if station.contains("BCS") {
            self.monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_Bat_AC_Charge"))
                .await
        } else if station.contains("ADS") {
            if charging_type.eq_ignore_ascii_case("ac") {
                self.monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_EV_AC_Charge"))
                    .await
            } else {
                self.monitor_result(cart, "Flag_Modus", Expected::Flag("Flag_EV_DC_Charge"))
                    .await
            }
        } else {
            Ok(false)
        }
    }

    /// Unplug at `station` and hand the cart back to battery-only mode.
    async fn ladeprozess_end(&self, cart: &str, station: &str) -> DomainResult<bool> {
        let flags = self.mode_flags(cart).await?;
        let in_charge_mode = flags.contains("flag_ev_ac_charge")
            || flags.contains("flag_ev_dc_charge")
            || flags.contains("flag_bat_ac_charge");
        if !in_charge_mode {
            return Ok(false);
        }

        if !self.monitor_plug_unlock(cart, station).await? {
            self.publisher.publish(cart, MSG_MODE_REQ_IDLE).await?;
            if !self.check_feedback(cart, "Mode_request_idle_OK").await?
                || !self.monitor_plug_unlock(cart, station).await?
            {
                return Ok(false);
            }
        }

        self.publisher.publish(cart, MSG_PLUG_PROCESS_FINISHED).await?;
        if self.check_feedback(cart, "PlugProcessFinished_Received").await? {
            return self.monitor_result(cart, "Mode_Bat_only", Expected::Int(1)).await;
        }
        Ok(false)
    }
}
