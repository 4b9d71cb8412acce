//! Settings shared by every widget of the dashboard.

use time::{UtcOffset, format_description::FormatItem, macros::format_description};

use crate::Error;

/// The collection loyalty visits are stored in.
pub const DEFAULT_COLLECTION: &str = "DatosFidelizacion";

/// The collection loyalty points are stored in.
pub const DEFAULT_POINTS_COLLECTION: &str = "Fidelizacion";

/// The offset local (store opening hours) times are evaluated at.
pub const DEFAULT_LOCAL_OFFSET: UtcOffset = time::macros::offset!(-5);

const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Configuration for a [crate::Dashboard].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// The name of the collection to fetch visits from.
    pub collection: String,
    /// The name of the collection to fetch loyalty points from.
    pub points_collection: String,
    /// The offset the payment widgets bucket days at.
    pub payments_offset: UtcOffset,
    /// The offset the product and time-of-day widgets bucket days and hours at.
    pub local_offset: UtcOffset,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_owned(),
            points_collection: DEFAULT_POINTS_COLLECTION.to_owned(),
            payments_offset: UtcOffset::UTC,
            local_offset: DEFAULT_LOCAL_OFFSET,
        }
    }
}

/// Parses a UTC offset written as `+HH:MM` or `-HH:MM`.
///
/// `Z` and `UTC` are accepted as shorthand for `+00:00`.
///
/// # Errors
/// Returns [Error::InvalidOffset] if `text` is not a valid offset.
pub fn parse_utc_offset(text: &str) -> Result<UtcOffset, Error> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(text, OFFSET_FORMAT).map_err(|_| Error::InvalidOffset(text.to_owned()))
}
