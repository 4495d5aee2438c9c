//! Battery-state polling.
//!
//! Watches the charger telemetry table and turns state-text changes
//! into `ChargerCommand`s for the planner. Only changed states are
//! reported; the watermark bounds how much of the table each poll
//! reads.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::debug;

use crate::domain::{ChargerCommand, DomainResult};
use crate::infrastructure::database::live::LiveStore;
use crate::shared::time::now;

pub struct BatteryMonitor {
    /// Last known state text per cart.
    battery_states: HashMap<String, String>,
    last_time: NaiveDateTime,
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self {
            battery_states: HashMap::new(),
            last_time: now(),
        }
    }

    /// Query battery rows changed since the last poll and return one
    /// command per cart whose state text actually changed.
    pub async fn poll(&mut self, live: &LiveStore) -> DomainResult<Vec<(String, ChargerCommand)>> {
        let rows = live.fetch_battery_states(self.last_time).await?;
        self.last_time = now();

        let mut commands = Vec::new();
        for (cart, state) in rows {
            let previous = self.battery_states.get(&cart).cloned();
            if previous.as_deref() == Some(state.as_str()) {
                continue;
            }
            debug!("Battery state changed: cart={}, state={}", cart.as_str(), state.as_str());
            if let Some(command) = ChargerCommand::from_state_change(previous.as_deref(), &state) {
                commands.push((cart.clone(), command));
            }
            self.battery_states.insert(cart, state);
        }
        Ok(commands)
    }
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self::new()
    }
}
