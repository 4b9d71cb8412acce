//! Visit records and the normalizer that builds them.
//!
//! Loyalty data is stored as loosely typed nested documents: every document
//! maps an owner (user) key to a map of visit entries, and each visit entry
//! may carry a start timestamp, a map of payments and a map of products.
//! [normalize] flattens that tree into [VisitRecord]s so the rest of the
//! crate never has to look at untyped maps.

mod coerce;
mod points;
mod timestamp;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use coerce::{identifier, parse_float, parse_int};
pub use points::{NOT_AVAILABLE, PointsEntry, normalize_points};
pub use timestamp::parse_store_timestamp;

/// A raw document as returned by a [crate::store::DocumentStore].
pub type RawDocument = Value;

/// The label used for identifiers that are missing from the source data.
pub const UNKNOWN_LABEL: &str = "unknown";

/// The key a store adds to a document to carry its document ID.
pub const DOCUMENT_ID_FIELD: &str = "_id";

const START_TIME_FIELD: &str = "fecha_inicio";
const END_TIME_FIELD: &str = "fecha_fin";
const PAYMENTS_FIELD: &str = "pago";
const PRODUCTS_FIELD: &str = "producto";

/// One loyalty-program visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitRecord {
    /// The key of the owner (user) the visit was recorded under.
    pub user_id: String,
    /// The key of the visit entry within the owner's map.
    pub visit_id: String,
    /// When the visit started.
    pub start_time: OffsetDateTime,
    /// When the visit ended, if the source recorded a valid end time.
    pub end_time: Option<OffsetDateTime>,
    /// Payments made during the visit, possibly empty.
    pub payments: Vec<PaymentEntry>,
    /// Products consumed during the visit, possibly empty.
    pub products: Vec<ProductEntry>,
}

/// A single payment made during a visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEntry {
    /// The tip, never negative.
    pub tip: f64,
    /// The payment method, e.g. "cash" or "card".
    pub method_type: String,
    /// The amount paid, never negative.
    pub total: f64,
}

/// A product line of a visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductEntry {
    /// How many units were consumed.
    pub quantity: i64,
    /// The catalogue ID of the product.
    pub product_id: String,
    /// The price of one unit.
    pub unit_price: f64,
    /// The product's display name.
    pub name: String,
}

impl ProductEntry {
    /// The amount spent on this product line, `quantity × unit_price`.
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

impl PaymentEntry {
    fn from_value(value: &Value) -> Self {
        Self {
            tip: parse_float(value.get("propina")).max(0.0),
            method_type: identifier(value.get("tipo")),
            total: parse_float(value.get("total")).max(0.0),
        }
    }
}

impl ProductEntry {
    fn from_value(value: &Value) -> Self {
        Self {
            quantity: parse_int(value.get("cantidad")),
            product_id: identifier(value.get("idproducto")),
            unit_price: parse_float(value.get("precio")),
            name: identifier(value.get("producto")),
        }
    }
}

/// Flattens raw loyalty documents into visit records.
///
/// Entries without a convertible start timestamp are skipped, as are owners
/// and entries that are not maps. Missing or malformed numbers become `0`
/// and missing identifiers become [UNKNOWN_LABEL]. The input is not modified.
pub fn normalize(documents: &[RawDocument]) -> Vec<VisitRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for document in documents {
        let Some(owners) = document.as_object() else {
            skipped += 1;
            continue;
        };

        for (user_id, entries) in owners {
            if user_id == DOCUMENT_ID_FIELD {
                continue;
            }

            let Some(entries) = entries.as_object() else {
                skipped += 1;
                continue;
            };

            for (visit_id, entry) in entries {
                match normalize_entry(user_id, visit_id, entry) {
                    Some(record) => records.push(record),
                    None => skipped += 1,
                }
            }
        }
    }

    tracing::debug!(
        "normalized {} visit records from {} documents ({skipped} entries skipped)",
        records.len(),
        documents.len()
    );

    records
}

fn normalize_entry(user_id: &str, visit_id: &str, entry: &Value) -> Option<VisitRecord> {
    let start_time = entry.get(START_TIME_FIELD).and_then(parse_store_timestamp)?;
    let end_time = entry.get(END_TIME_FIELD).and_then(parse_store_timestamp);

    let payments = sub_entries(entry.get(PAYMENTS_FIELD))
        .map(PaymentEntry::from_value)
        .collect();
    let products = sub_entries(entry.get(PRODUCTS_FIELD))
        .map(ProductEntry::from_value)
        .collect();

    Some(VisitRecord {
        user_id: user_id.to_owned(),
        visit_id: visit_id.to_owned(),
        start_time,
        end_time,
        payments,
        products,
    })
}

/// The values of a payment or product map. Arrays are accepted as well.
fn sub_entries(value: Option<&Value>) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Some(Value::Object(map)) => Box::new(map.values()),
        Some(Value::Array(values)) => Box::new(values.iter()),
        _ => Box::new(std::iter::empty()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::{PaymentEntry, ProductEntry, UNKNOWN_LABEL, normalize};

    fn timestamp(seconds: i64) -> serde_json::Value {
        json!({ "seconds": seconds, "nanoseconds": 0 })
    }

    #[test]
    fn normalizes_nested_entries() {
        let documents = vec![json!({
            "alice": {
                "visit-1": {
                    "fecha_inicio": timestamp(1_714_550_400),
                    "pago": {
                        "a": { "propina": 2, "tipo": "cash", "total": "10.5" }
                    },
                    "producto": {
                        "x": { "cantidad": "3", "idproducto": "p-1", "precio": 4, "producto": "Coffee" }
                    }
                }
            }
        })];

        let records = normalize(&documents);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.visit_id, "visit-1");
        assert_eq!(record.start_time, datetime!(2024-05-01 08:00 UTC));
        assert_eq!(record.end_time, None);
        assert_eq!(
            record.payments,
            vec![PaymentEntry {
                tip: 2.0,
                method_type: "cash".to_owned(),
                total: 10.5,
            }]
        );
        assert_eq!(
            record.products,
            vec![ProductEntry {
                quantity: 3,
                product_id: "p-1".to_owned(),
                unit_price: 4.0,
                name: "Coffee".to_owned(),
            }]
        );
    }

    #[test]
    fn drops_entries_without_valid_start_time() {
        let documents = vec![json!({
            "alice": {
                "missing": { "pago": { "a": { "tipo": "cash", "total": 5 } } },
                "string": { "fecha_inicio": "2024-05-01T08:00:00Z" },
                "null": { "fecha_inicio": null },
                "valid": { "fecha_inicio": timestamp(1_714_550_400) }
            }
        })];

        let records = normalize(&documents);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].visit_id, "valid");
    }

    #[test]
    fn missing_numbers_default_to_zero() {
        let documents = vec![json!({
            "bob": {
                "visit": {
                    "fecha_inicio": timestamp(0),
                    "pago": { "a": { "tipo": "card" } },
                    "producto": { "x": { "cantidad": 2, "producto": "Tea" } }
                }
            }
        })];

        let records = normalize(&documents);

        assert_eq!(records[0].payments[0].total, 0.0);
        assert_eq!(records[0].payments[0].tip, 0.0);
        assert_eq!(records[0].products[0].unit_price, 0.0);
        assert_eq!(records[0].products[0].subtotal(), 0.0);
    }

    #[test]
    fn missing_identifiers_become_unknown() {
        let documents = vec![json!({
            "bob": {
                "visit": {
                    "fecha_inicio": timestamp(0),
                    "pago": { "a": { "total": 1 }, "b": null },
                    "producto": { "x": { "tipo": "" } }
                }
            }
        })];

        let records = normalize(&documents);
        let record = &records[0];

        assert_eq!(record.payments.len(), 2);
        assert!(
            record
                .payments
                .iter()
                .all(|payment| payment.method_type == UNKNOWN_LABEL)
        );
        assert_eq!(record.products[0].name, UNKNOWN_LABEL);
        assert_eq!(record.products[0].product_id, UNKNOWN_LABEL);
    }

    #[test]
    fn skips_non_map_owners_and_documents() {
        let documents = vec![
            json!([1, 2, 3]),
            json!({ "alice": "not a map", "bob": { "visit": 7 } }),
        ];

        assert!(normalize(&documents).is_empty());
    }

    #[test]
    fn keeps_payments_and_products_independent() {
        let documents = vec![json!({
            "carol": {
                "paid": { "fecha_inicio": timestamp(0), "pago": [{ "tipo": "cash", "total": 3 }] },
                "ate": { "fecha_inicio": timestamp(0), "producto": [{ "producto": "Cake", "cantidad": 1, "precio": 2 }] }
            }
        })];

        let records = normalize(&documents);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payments.len(), 1);
        assert!(records[0].products.is_empty());
        assert!(records[1].payments.is_empty());
        assert_eq!(records[1].products.len(), 1);
    }

    #[test]
    fn does_not_modify_input() {
        let documents = vec![json!({
            "alice": { "visit": { "fecha_inicio": timestamp(0), "pago": { "a": { "total": "x" } } } }
        })];
        let before = documents.clone();

        normalize(&documents);

        assert_eq!(documents, before);
    }

    #[test]
    fn keeps_valid_end_time() {
        let documents = vec![json!({
            "alice": {
                "visit": {
                    "fecha_inicio": timestamp(1_714_550_400),
                    "fecha_fin": timestamp(1_714_554_000)
                }
            }
        })];

        let records = normalize(&documents);

        assert_eq!(records[0].end_time, Some(datetime!(2024-05-01 09:00 UTC)));
    }

    #[test]
    fn document_id_is_not_an_owner() {
        let documents = vec![json!({
            "_id": "doc-1",
            "alice": { "visit": { "fecha_inicio": timestamp(1_714_550_400) } }
        })];

        let records = normalize(&documents);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "alice");
    }
}
