//! HTTP-date formatting (RFC 7231 IMF-fixdate).

use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, Utc};

/// `Sun, 06 Nov 1994 08:49:37 GMT`
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp as an HTTP date, dropping sub-second precision.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE).to_string()
}

/// The IMF-fixdate layout after the weekday.
const HTTP_DATE_TAIL: &str = "%d %b %Y %H:%M:%S GMT";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse an IMF-fixdate value. Other historic formats are rejected.
///
/// The weekday must be a valid abbreviation but need not agree with the date.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let (weekday, rest) = value.trim().split_once(", ")?;
    if !WEEKDAYS.contains(&weekday) {
        return None;
    }
    NaiveDateTime::parse_from_str(rest, HTTP_DATE_TAIL)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
