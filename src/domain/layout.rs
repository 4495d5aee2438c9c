//! Parking area layout.
//!
//! Station positions live on an integer grid; travel cost between two
//! stations is the Manhattan distance scaled by the cell size. Unknown
//! stations get `MAX_DISTANCE` so they lose every tie-break. The full
//! distance relation is materialized into the planning store at startup;
//! hot-path lookups go against that table, not this module.

/// Grid cell edge length in meters.
pub const CELL_SIZE: f64 = 2.5;

/// Distance reported for any pair involving an unknown station.
pub const MAX_DISTANCE: f64 = 16.0 * CELL_SIZE;

// Reference layout from the simulation domain; replace with the surveyed
// parking area once available.
//
// Legend: a = adapter, b = battery charging, p = parking, r = robot base,
// w = wall.
//
// .b.b...r.
// .........
// ...awa...
// ...pwp...
// ....w....
// ...awa...
// ...pwp...
const POSITIONS: &[(&str, (i64, i64))] = &[
    ("ADS_1", (3, 2)),
    ("ADS_2", (5, 2)),
    ("ADS_3", (3, 5)),
    ("ADS_4", (5, 5)),
    ("BCS_1", (1, 0)),
    ("BCS_2", (3, 0)),
    ("BWS_1", (1, 0)),
    ("BWS_2", (3, 0)),
    ("RBS_1", (7, 0)),
];

pub struct Layout;

impl Layout {
    fn position(station: &str) -> Option<(i64, i64)> {
        POSITIONS
            .iter()
            .find(|(name, _)| *name == station)
            .map(|(_, pos)| *pos)
    }

    fn manhattan(a: (i64, i64), b: (i64, i64)) -> f64 {
        ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as f64 * CELL_SIZE
    }

    /// Distance from `source` to `target`, or `MAX_DISTANCE` when either
    /// station has no known grid position.
    pub fn distance(source: &str, target: &str) -> f64 {
        match (Self::position(source), Self::position(target)) {
            (Some(a), Some(b)) => Self::manhattan(a, b),
            _ => MAX_DISTANCE,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_manhattan_times_cell_size() {
        // ADS_1 (3, 2) -> BCS_1 (1, 0): |3-1| + |2-0| = 4 cells.
        assert_eq!(Layout::distance("ADS_1", "BCS_1"), 4.0 * CELL_SIZE);
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(
            Layout::distance("ADS_2", "RBS_1"),
            Layout::distance("RBS_1", "ADS_2")
        );
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(Layout::distance("BWS_1", "BWS_1"), 0.0);
    }

    #[test]
    fn unknown_station_gets_max_distance() {
        assert_eq!(Layout::distance("ADS_1", "ADS_99"), MAX_DISTANCE);
        assert_eq!(Layout::distance("nowhere", "ADS_1"), MAX_DISTANCE);
    }

    #[test]
    fn colocated_stations_share_position() {
        // BCS_1 and BWS_1 share a grid cell in the reference layout.
        assert_eq!(Layout::distance("BCS_1", "BWS_1"), 0.0);
    }
}
