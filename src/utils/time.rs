//! Timestamp helpers shared by the wire types and the renderer.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// The `YYYY-MM-DD HH:MM:SS` profile used for message timestamps.
const MESSAGE_TIME: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Deserialize an RFC 3339 formatted string into an OffsetDateTime.
///
/// A missing or empty string yields the Unix epoch.
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    if s.is_empty() {
        return Ok(OffsetDateTime::UNIX_EPOCH);
    }
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string.
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Formats a datetime as RFC 3339, falling back to the Debug form if formatting fails.
pub fn format_rfc3339(datetime: &OffsetDateTime) -> String {
    datetime
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{datetime:?}"))
}

/// The local UTC offset, or UTC when it cannot be determined.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Formats epoch seconds as `YYYY-MM-DD HH:MM:SS` at the given offset.
pub fn format_epoch_seconds(epoch_seconds: i64, offset: UtcOffset) -> String {
    match OffsetDateTime::from_unix_timestamp(epoch_seconds) {
        Ok(dt) => dt
            .to_offset(offset)
            .format(MESSAGE_TIME)
            .unwrap_or_else(|_| epoch_seconds.to_string()),
        Err(_) => epoch_seconds.to_string(),
    }
}
