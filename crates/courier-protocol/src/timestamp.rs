//! Wire timestamps.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as an ISO-8601 string with millisecond precision.
///
/// Every outbound event is stamped with this format; clients parse it
/// directly, so the shape must stay stable.
#[must_use]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
