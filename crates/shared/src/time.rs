//! Timestamp conversion helpers.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

/// Converts seconds since the Unix epoch into an absolute UTC timestamp.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn epoch_seconds_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Truncates a timestamp to the microsecond precision PostgreSQL stores.
pub fn to_storage_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}
