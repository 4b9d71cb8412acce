use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Converts a store-native timestamp into an instant.
///
/// Accepts the exported forms of a document-store timestamp:
/// `{"seconds": s, "nanoseconds": n}`, the admin-SDK spelling
/// `{"_seconds": s, "_nanoseconds": n}` and the REST wrapper
/// `{"timestampValue": "<RFC 3339>"}`. Bare strings and numbers are not
/// timestamps and yield `None`, as do out-of-range values.
pub fn parse_store_timestamp(value: &Value) -> Option<OffsetDateTime> {
    let fields = value.as_object()?;

    if let Some(text) = fields.get("timestampValue") {
        return OffsetDateTime::parse(text.as_str()?, &Rfc3339).ok();
    }

    let seconds = fields
        .get("seconds")
        .or_else(|| fields.get("_seconds"))
        .and_then(integer)?;
    let nanoseconds = match fields
        .get("nanoseconds")
        .or_else(|| fields.get("_nanoseconds"))
    {
        Some(value) => integer(value)?,
        None => 0,
    };

    if !(0..NANOS_PER_SECOND).contains(&nanoseconds) {
        return None;
    }

    let unix_nanos = i128::from(seconds) * i128::from(NANOS_PER_SECOND) + i128::from(nanoseconds);
    OffsetDateTime::from_unix_timestamp_nanos(unix_nanos).ok()
}

/// Timestamps serialized over REST carry their integers as strings.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
