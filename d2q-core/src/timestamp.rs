use chrono::{SecondsFormat, Utc};

/// Current time as an RFC 3339 string with microsecond precision.
///
/// Stored records keep timestamps as strings and sort on them, so the format
/// must stay fixed-width.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
