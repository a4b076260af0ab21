//! Timestamp formatting.
//!
//! Every timestamp the node writes (contact `last_seen`, queue enqueue time,
//! audit records, `MSG` send time) uses [`TIMESTAMP_FORMAT`]. The format is
//! zero-padded and most-significant first, so comparing two timestamps as
//! strings gives the same answer as comparing them as instants.

use chrono::Local;

/// `2024-06-01 13:05:09`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The current local time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
