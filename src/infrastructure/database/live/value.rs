//! Dynamic values read from the shared live database.
//!
//! The live schema is externally owned and loosely typed; every cell is
//! read dynamically and text is promoted by shape: `YYYY-MM-DD HH:MM:SS`
//! becomes a datetime, `HH:MM:SS` a duration, and a purely numeric
//! string without a leading zero an integer or float.

use chrono::{Duration, NaiveDateTime};
use sea_orm::QueryResult;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_clock_duration(s: &str) -> Option<Duration> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let part = |i: usize| parts[i].parse::<i64>().unwrap_or(0);
    Some(Duration::hours(part(0)) + Duration::minutes(part(1)) + Duration::seconds(part(2)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Duration(Duration),
}

impl LiveValue {
    /// Promote a raw string into its supported value type.
    pub fn promote(s: &str) -> Self {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
            return Self::DateTime(dt);
        }
        if let Some(duration) = parse_clock_duration(s) {
            return Self::Duration(duration);
        }
        if !s.is_empty()
            && !s.starts_with('0')
            && s.chars().all(|c| c.is_ascii_digit() || c == '.')
            && s.chars().filter(|c| *c == '.').count() <= 1
        {
            if s.contains('.') {
                if let Ok(f) = s.parse::<f64>() {
                    return Self::Float(f);
                }
            } else if let Ok(i) = s.parse::<i64>() {
                return Self::Int(i);
            }
        }
        Self::Text(s.to_string())
    }

    /// Read one column from a raw query row, trying the native types
    /// before falling back to text promotion.
    pub fn from_query(row: &QueryResult, column: &str) -> Self {
        if let Ok(Some(v)) = row.try_get_by::<Option<i64>, _>(column) {
            return Self::Int(v);
        }
        if let Ok(Some(v)) = row.try_get_by::<Option<f64>, _>(column) {
            return Self::Float(v);
        }
        if let Ok(Some(v)) = row.try_get_by::<Option<NaiveDateTime>, _>(column) {
            return Self::DateTime(v);
        }
        if let Ok(Some(v)) = row.try_get_by::<Option<String>, _>(column) {
            return Self::promote(&v);
        }
        Self::Null
    }

    /// Null, or one of the SQL spellings of null that leak through the
    /// shared tables as text.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => {
                s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null")
            }
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Int(i) => Some(*i != 0),
            Self::Text(s) => match s.as_str() {
                "true" | "True" | "1" => Some(true),
                "false" | "False" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) if !self.is_null() => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            // Plug-in durations are also written as plain minute counts.
            Self::Int(i) => Some(Duration::minutes(*i)),
            Self::Float(f) => Some(Duration::seconds((*f * 60.0) as i64)),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiveValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, ""),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Duration(d) => {
                let secs = d.num_seconds();
                write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_datetime() {
        let v = LiveValue::promote("2024-06-01 12:30:00");
        let dt = v.as_datetime().unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-06-01 12:30:00");
    }

    #[test]
    fn promotes_duration() {
        let v = LiveValue::promote("01:30:00");
        assert_eq!(v.as_duration().unwrap(), Duration::minutes(90));
    }

    #[test]
    fn promotes_numbers_without_leading_zero() {
        assert_eq!(LiveValue::promote("42"), LiveValue::Int(42));
        assert_eq!(LiveValue::promote("4.5"), LiveValue::Float(4.5));
        // Leading zero stays text (could be an identifier).
        assert_eq!(LiveValue::promote("007"), LiveValue::Text("007".into()));
    }

    #[test]
    fn plain_text_stays_text() {
        assert_eq!(LiveValue::promote("ADS_1"), LiveValue::Text("ADS_1".into()));
    }

    #[test]
    fn sql_null_spellings() {
        assert!(LiveValue::Null.is_null());
        assert!(LiveValue::Text("NONE".into()).is_null());
        assert!(LiveValue::Text("null".into()).is_null());
        assert!(LiveValue::Text("".into()).is_null());
        assert!(!LiveValue::Text("ADS_1".into()).is_null());
    }

    #[test]
    fn minute_counts_read_as_durations() {
        assert_eq!(LiveValue::Int(5).as_duration().unwrap(), Duration::minutes(5));
        assert_eq!(
            LiveValue::Float(1.5).as_duration().unwrap(),
            Duration::seconds(90)
        );
    }

    #[test]
    fn display_roundtrips_datetime_format() {
        let v = LiveValue::promote("2024-06-01 08:00:05");
        assert_eq!(v.to_string(), "2024-06-01 08:00:05");
        assert_eq!(LiveValue::Duration(Duration::minutes(90)).to_string(), "01:30:00");
    }
}
