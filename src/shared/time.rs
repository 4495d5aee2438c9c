//! Wall-clock helpers shared by the planner and the live-store bridge.

use chrono::{Local, NaiveDateTime, Timelike};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current wall-clock time at second precision, the resolution the
/// shared live database stores.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Format a datetime the way the live database stores it.
pub fn datetime_str(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_live_store() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(datetime_str(dt), "2024-06-01 08:30:00");
    }

    #[test]
    fn now_is_second_precision() {
        assert_eq!(now().and_utc().timestamp_subsec_nanos(), 0);
    }
}
