//! Global functions available inside rule expressions

use chrono::{Local, NaiveTime};
use minijinja::{Error, ErrorKind};

/// Whether `check` lies strictly between `start` and `end`
///
/// A window whose end is before its start wraps past midnight
/// (`22:00`-`06:00` contains `23:30` and `01:00`).
pub fn in_time_span(start: NaiveTime, end: NaiveTime, check: NaiveTime) -> bool {
    if end < start {
        check > start || check < end
    } else {
        check > start && check < end
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("daily: invalid time '{}': {}", value, e),
        )
    })
}

/// `daily("HH:MM", "HH:MM")`: is the local wall clock inside the window
pub fn daily(from: &str, to: &str) -> Result<bool, Error> {
    let start = parse_clock(from)?;
    let end = parse_clock(to)?;
    Ok(in_time_span(start, end, Local::now().time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_plain_window() {
        assert!(in_time_span(t("08:00"), t("17:00"), t("12:00")));
        assert!(!in_time_span(t("08:00"), t("17:00"), t("18:00")));
        assert!(!in_time_span(t("08:00"), t("17:00"), t("07:59")));
    }

    #[test]
    fn test_window_over_midnight() {
        assert!(in_time_span(t("22:00"), t("06:00"), t("23:30")));
        assert!(in_time_span(t("22:00"), t("06:00"), t("01:00")));
        assert!(!in_time_span(t("22:00"), t("06:00"), t("12:00")));
    }

    #[test]
    fn test_invalid_clock() {
        assert!(daily("25:00", "10:00").is_err());
        assert!(daily("noon", "10:00").is_err());
    }
}
