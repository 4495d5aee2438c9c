//! Free-station search with per-robot blocker sets.
//!
//! A robot that just received station `BCS_2` must not be offered it
//! again while it is still deciding, even though nothing stands there
//! yet. The blocker set records every station handed to a robot (plus
//! the one it stands on) until an explicit reset clears it; this is
//! what stops a robot from ping-ponging between two equally free
//! stations across consecutive picks.

use std::collections::HashSet;

use dashmap::DashMap;
use regex::Regex;
use sea_orm::ConnectionTrait;
use tracing::debug;

use crate::domain::DomainResult;
use crate::infrastructure::database::live::LiveStore;
use crate::infrastructure::database::plan;

const ROBOT_COLUMNS: &[&str] = &["name", "robot_location", "ongoing_action"];
const CART_COLUMNS: &[&str] = &["name", "cart_location"];

pub struct StationPicker {
    /// (station prefix, robot) → stations withheld from that robot.
    blockers: DashMap<(String, String), HashSet<String>>,
}

impl StationPicker {
    pub fn new() -> Self {
        Self {
            blockers: DashMap::new(),
        }
    }

    fn blocker_key(prefix: &str, robot: &str) -> (String, String) {
        (prefix.to_string(), robot.to_string())
    }

    /// Find the nearest free station with `prefix` for `robot`, or an
    /// empty string when every candidate is blocked.
    pub async fn search_free_station<C: ConnectionTrait>(
        &self,
        live: &LiveStore,
        plan_db: &C,
        robot: &str,
        prefix: &str,
    ) -> DomainResult<String> {
        let robot_infos = live.fetch_by_first_header("robot_info", ROBOT_COLUMNS).await?;
        let robot_location = robot_infos
            .get(robot)
            .and_then(|row| row.get("robot_location"))
            .map(ToString::to_string)
            .unwrap_or_default();

        // Standing on a station of this prefix blocks it permanently
        // for this robot.
        if let Some(station) = station_name(&robot_location, prefix) {
            self.blockers
                .entry(Self::blocker_key(prefix, robot))
                .or_default()
                .insert(station);
        }

        // Stations referenced by any robot or cart are blocked for
        // this one pick.
        let mut blocked: HashSet<String> = HashSet::new();
        for row in robot_infos.values() {
            for value in row.values() {
                if let Some(station) = station_name(&value.to_string(), prefix) {
                    blocked.insert(station);
                }
            }
        }
        let cart_infos = live.fetch_by_first_header("cart_info", CART_COLUMNS).await?;
        for row in cart_infos.values() {
            for value in row.values() {
                if let Some(station) = station_name(&value.to_string(), prefix) {
                    blocked.insert(station);
                }
            }
        }

        let env_key = format!("{}names", prefix.to_lowercase());
        let station_count = live.fetch_env_count(&env_key).await?;

        let mut free_station = String::new();
        let mut best_distance = f64::INFINITY;
        for number in 1..=station_count {
            let station = format!("{prefix}{number}");
            if blocked.contains(&station) || self.is_blocked(prefix, robot, &station) {
                continue;
            }
            let distance = plan::distance(plan_db, &station, &robot_location).await?;
            if distance < best_distance {
                free_station = station;
                best_distance = distance;
            }
        }

        if !free_station.is_empty() {
            self.blockers
                .entry(Self::blocker_key(prefix, robot))
                .or_default()
                .insert(free_station.clone());
        }
        debug!(robot, prefix, station = free_station.as_str(), "Free station search");
        Ok(free_station)
    }

    fn is_blocked(&self, prefix: &str, robot: &str, station: &str) -> bool {
        self.blockers
            .get(&Self::blocker_key(prefix, robot))
            .map(|set| set.contains(station))
            .unwrap_or(false)
    }

    /// Clear the blockers for one robot and prefix.
    pub fn reset_blockers(&self, robot: &str, prefix: &str) -> bool {
        if let Some(mut set) = self.blockers.get_mut(&Self::blocker_key(prefix, robot)) {
            set.clear();
        }
        true
    }
}

impl Default for StationPicker {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `<prefix><digits>` from an arbitrary string field.
fn station_name(text: &str, prefix: &str) -> Option<String> {
    let pattern = Regex::new(&format!("{}\\d+", regex::escape(prefix))).ok()?;
    pattern.find(text).map(|m| m.as_str().to_string())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_station_names_from_fields() {
        assert_eq!(station_name("BCS_2", "BCS_"), Some("BCS_2".to_string()));
        assert_eq!(
            station_name("driving to BWS_12 now", "BWS_"),
            Some("BWS_12".to_string())
        );
        assert_eq!(station_name("RBS_1", "BCS_"), None);
        assert_eq!(station_name("", "BCS_"), None);
    }

    #[test]
    fn blockers_accumulate_until_reset() {
        let picker = StationPicker::new();
        picker
            .blockers
            .entry(StationPicker::blocker_key("BCS_", "ChargePal1"))
            .or_default()
            .insert("BCS_1".to_string());
        assert!(picker.is_blocked("BCS_", "ChargePal1", "BCS_1"));
        // Another robot is unaffected.
        assert!(!picker.is_blocked("BCS_", "ChargePal2", "BCS_1"));
        // Another prefix is unaffected.
        assert!(!picker.is_blocked("BWS_", "ChargePal1", "BCS_1"));

        picker.reset_blockers("ChargePal1", "BCS_");
        assert!(!picker.is_blocked("BCS_", "ChargePal1", "BCS_1"));
    }
}
