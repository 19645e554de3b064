//! Date/time utilities for logingate.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use chrono_tz::Tz;

use crate::{GateError, Result};

/// Fixed pattern of string-encoded timestamps (`yyyy-MM-dd HH:mm:ss`, UTC).
pub const SQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time truncated to whole seconds.
///
/// Stored timestamps carry second precision, so every timestamp an
/// account holds is truncated the same way.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Parse a string-encoded timestamp as UTC wall-clock time.
///
/// Fails with [`GateError::MalformedTimestamp`] if the string does not
/// match [`SQL_TIME_FORMAT`] exactly.
pub fn parse_sql_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, SQL_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| GateError::MalformedTimestamp(s.to_string()))
}

/// Format a timestamp in the string encoding.
pub fn format_sql_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(SQL_TIME_FORMAT).to_string()
}

/// Format a DateTime<Utc> in the specified timezone.
///
/// # Arguments
///
/// * `dt` - DateTime in UTC
/// * `timezone` - Timezone name (e.g., "Europe/Berlin", "UTC")
/// * `format` - Output format string (e.g., "%Y/%m/%d %H:%M")
///
/// Falls back to UTC if the timezone name is unknown.
pub fn format_utc_datetime(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => return dt.format(format).to_string(),
    };
    dt.with_timezone(&tz).format(format).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_sql_timestamp() {
        let dt = parse_sql_timestamp("2024-03-05 10:15:30").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap());
        assert_eq!(dt.to_rfc3339(), "2024-03-05T10:15:30+00:00");
    }

    #[test]
    fn test_parse_sql_timestamp_malformed() {
        for bad in [
            "not-a-date",
            "",
            "2024-03-05",
            "2024-03-05T10:15:30",
            "2024-03-05 10:15:30Z",
            "2024-13-05 10:15:30",
        ] {
            let result = parse_sql_timestamp(bad);
            assert!(
                matches!(result, Err(GateError::MalformedTimestamp(ref s)) if s == bad),
                "expected MalformedTimestamp for {bad:?}"
            );
        }
    }

    #[test]
    fn test_format_sql_timestamp() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_sql_timestamp(&dt), "2024-12-31 23:59:59");
        assert_eq!(parse_sql_timestamp(&format_sql_timestamp(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_now_is_whole_seconds() {
        assert_eq!(now().nanosecond(), 0);
    }

    #[test]
    fn test_format_utc_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let result = format_utc_datetime(&dt, "Asia/Tokyo", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 19:30"); // UTC+9
    }

    #[test]
    fn test_format_utc_datetime_invalid_timezone() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let result = format_utc_datetime(&dt, "Invalid/Zone", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 10:30");
    }
}
