//! Loyalty points entries, one per document of the points collection.

use serde::Serialize;
use serde_json::Value;
use time::{format_description::FormatItem, macros::format_description};

use super::{DOCUMENT_ID_FIELD, coerce::parse_float, parse_store_timestamp};

/// Shown for a missing client or date.
pub const NOT_AVAILABLE: &str = "N/A";

const ID_FIELD: &str = "id";
const CLIENT_FIELD: &str = "cliente";
const DATE_FIELD: &str = "fecha";
const POINTS_FIELD: &str = "puntos";

const DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

/// The points a client holds, as recorded in one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsEntry {
    /// The document ID, or [NOT_AVAILABLE] if the store did not provide one.
    pub id: String,
    /// The client the points belong to.
    pub client: String,
    /// When the points were recorded, as display text.
    pub date: String,
    /// The number of points, `0` when missing or malformed.
    pub points: f64,
}

/// Builds one [PointsEntry] per document, skipping documents that are not maps.
///
/// Empty, missing or zero fields fall back to [NOT_AVAILABLE], and missing
/// points to `0`.
pub fn normalize_points(documents: &[Value]) -> Vec<PointsEntry> {
    documents
        .iter()
        .filter(|document| document.is_object())
        .map(|document| PointsEntry {
            id: display_text(
                document
                    .get(DOCUMENT_ID_FIELD)
                    .or_else(|| document.get(ID_FIELD)),
            ),
            client: display_text(document.get(CLIENT_FIELD)),
            date: display_text(document.get(DATE_FIELD)),
            points: parse_float(document.get(POINTS_FIELD)),
        })
        .collect()
}

fn display_text(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        Some(Value::Bool(true)) => Some("true".to_owned()),
        Some(value @ Value::Object(_)) => parse_store_timestamp(value)
            .and_then(|instant| instant.format(DATE_FORMAT).ok()),
        _ => None,
    };

    text.filter(|text| !text.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_owned())
}
