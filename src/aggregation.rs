//! Grouping and summation of visit records for charts.
//!
//! Every aggregate keeps its keys in first-seen order so that labels (and
//! therefore colours and bar positions) do not jump around between redraws.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use time::UtcOffset;

use crate::record::VisitRecord;

/// Summed amounts keyed by group, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    groups: IndexMap<String, f64>,
}

impl AggregateResult {
    /// An aggregate without groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// An aggregate that already contains `keys`, each with the value `0`.
    pub fn seeded<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            groups: keys.into_iter().map(|key| (key.into(), 0.0)).collect(),
        }
    }

    /// Adds `amount` to the group `key`, creating the group if needed.
    ///
    /// Non-finite amounts count as `0`.
    pub fn add(&mut self, key: &str, amount: f64) {
        let amount = if amount.is_finite() { amount } else { 0.0 };

        match self.groups.get_mut(key) {
            Some(total) => *total += amount,
            None => {
                self.groups.insert(key.to_owned(), amount);
            }
        }
    }

    /// Makes sure the group `key` exists without changing its value.
    pub fn touch(&mut self, key: &str) {
        self.add(key, 0.0);
    }

    /// The value of the group `key`, if it exists.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.groups.get(key).copied()
    }

    /// The group keys in first-seen order.
    pub fn labels(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// The group values, aligned with [AggregateResult::labels].
    pub fn values(&self) -> Vec<f64> {
        self.groups.values().copied().collect()
    }

    /// The sum of all groups.
    pub fn total(&self) -> f64 {
        self.groups.values().sum()
    }

    /// The groups and their values in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.groups.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// The number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// What a per-user aggregate sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMeasure {
    /// Payment totals.
    Payments,
    /// Product subtotals (`quantity × unit_price`).
    Products,
}

/// The key an [AggregateResult] is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Payment totals by payment method.
    PaymentType,
    /// Spending by user.
    User(UserMeasure),
    /// Product subtotals by product name.
    Product,
    /// Units consumed by product name.
    ProductQuantity,
    /// Share of visits per part of the day, in percent, at the given offset.
    DayPart(UtcOffset),
}

impl Dimension {
    /// A human readable name for the grouping key, used in chart titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::PaymentType => "Payment method",
            Self::User(_) => "User",
            Self::Product | Self::ProductQuantity => "Product",
            Self::DayPart(_) => "Time of day",
        }
    }
}

/// Groups `records` by `dimension`.
pub fn aggregate(records: &[&VisitRecord], dimension: Dimension) -> AggregateResult {
    aggregate_into(AggregateResult::new(), records, dimension)
}

/// Groups `records` by `dimension` on top of `seed`.
///
/// Keys already present in `seed` keep their position, so a seed holding the
/// keys of the whole record cache gives stable labels for any filter.
pub fn aggregate_into(
    mut result: AggregateResult,
    records: &[&VisitRecord],
    dimension: Dimension,
) -> AggregateResult {
    match dimension {
        Dimension::PaymentType => {
            for payment in records.iter().flat_map(|record| &record.payments) {
                result.add(&payment.method_type, payment.total);
            }
        }
        Dimension::User(measure) => {
            for record in records {
                result.touch(&record.user_id);

                let amount = match measure {
                    UserMeasure::Payments => record.payments.iter().map(|p| p.total).sum(),
                    UserMeasure::Products => record.products.iter().map(|p| p.subtotal()).sum(),
                };
                result.add(&record.user_id, amount);
            }
        }
        Dimension::Product => {
            for product in records.iter().flat_map(|record| &record.products) {
                result.add(&product.name, product.subtotal());
            }
        }
        Dimension::ProductQuantity => {
            for product in records.iter().flat_map(|record| &record.products) {
                result.add(&product.name, product.quantity as f64);
            }
        }
        Dimension::DayPart(offset) => {
            let shares = day_part_shares(records, offset);
            for (part, share) in DayPart::ALL.into_iter().zip(shares) {
                result.add(part.label(), share);
            }
        }
    }

    result
}

/// The keys `dimension` produces over every record, in first-seen order.
pub fn known_keys(records: &[VisitRecord], dimension: Dimension) -> Vec<String> {
    let records: Vec<&VisitRecord> = records.iter().collect();
    aggregate(&records, dimension).labels()
}

/// A coarse classification of the hour a visit started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPart {
    /// 06:00 up to noon.
    Morning,
    /// Noon up to 17:00.
    Afternoon,
    /// Everything else.
    Night,
}

impl DayPart {
    /// Every day part, in chart order.
    pub const ALL: [DayPart; 3] = [DayPart::Morning, DayPart::Afternoon, DayPart::Night];

    /// The day part an hour (0-23) falls into.
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            _ => Self::Night,
        }
    }

    /// The day part `record` started in, at `offset`.
    pub fn of(record: &VisitRecord, offset: UtcOffset) -> Self {
        Self::from_hour(record.start_time.to_offset(offset).hour())
    }

    /// The label used in charts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Night => "Night",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Morning => 0,
            Self::Afternoon => 1,
            Self::Night => 2,
        }
    }
}

/// Percentage of `records` per [DayPart], in [DayPart::ALL] order, rounded to 2 decimals.
///
/// An empty slice yields `0` for every part.
pub fn day_part_shares(records: &[&VisitRecord], offset: UtcOffset) -> [f64; 3] {
    let mut counts = [0usize; 3];
    for record in records {
        counts[DayPart::of(record, offset).index()] += 1;
    }

    shares(counts)
}

fn shares(counts: [usize; 3]) -> [f64; 3] {
    let visits: usize = counts.iter().sum();
    if visits == 0 {
        return [0.0; 3];
    }

    counts.map(|count| round_to_cents(count as f64 / visits as f64 * 100.0))
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Several named series sharing one label axis.
///
/// Every series always holds exactly one value per label: adding a label
/// back-fills `0` into every existing series, and a new series starts
/// zero-filled to the current number of labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedSeries {
    labels: IndexSet<String>,
    series: IndexMap<String, Vec<f64>>,
}

impl GroupedSeries {
    /// An empty set of series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to `label` in `series`, creating either as needed.
    pub fn add(&mut self, series: &str, label: &str, amount: f64) {
        let index = self.label_index(label);
        let values = self.series_values(series);

        if let Some(value) = values.get_mut(index) {
            *value += if amount.is_finite() { amount } else { 0.0 };
        }
    }

    /// Makes sure `series` exists.
    pub fn touch_series(&mut self, series: &str) {
        self.series_values(series);
    }

    fn label_index(&mut self, label: &str) -> usize {
        if let Some(index) = self.labels.get_index_of(label) {
            return index;
        }

        let (index, _) = self.labels.insert_full(label.to_owned());
        for values in self.series.values_mut() {
            values.push(0.0);
        }

        index
    }

    fn series_values(&mut self, series: &str) -> &mut Vec<f64> {
        let width = self.labels.len();
        self.series
            .entry(series.to_owned())
            .or_insert_with(|| vec![0.0; width])
    }

    /// The shared labels in first-seen order.
    pub fn labels(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    /// The series in first-seen order.
    pub fn series(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.series
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// The sum of each series.
    pub fn totals(&self) -> AggregateResult {
        let mut totals = AggregateResult::new();
        for (name, values) in self.series() {
            totals.add(name, values.iter().sum());
        }

        totals
    }

    /// Whether there is nothing to draw: no series or no labels.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty() || self.labels.is_empty()
    }
}

/// Product subtotals with one series per user and one label per product.
pub fn by_user_by_product(records: &[&VisitRecord]) -> GroupedSeries {
    let mut grouped = GroupedSeries::new();

    for record in records {
        grouped.touch_series(&record.user_id);

        for product in &record.products {
            grouped.add(&record.user_id, &product.name, product.subtotal());
        }
    }

    grouped
}

/// Day-part shares of each user's visits, with one label per user and one
/// series per [DayPart].
pub fn day_part_shares_by_user(records: &[&VisitRecord], offset: UtcOffset) -> GroupedSeries {
    let mut counts: IndexMap<&str, [usize; 3]> = IndexMap::new();
    for record in records {
        counts.entry(record.user_id.as_str()).or_default()[DayPart::of(record, offset).index()] +=
            1;
    }

    let mut grouped = GroupedSeries::new();
    for part in DayPart::ALL {
        grouped.touch_series(part.label());
    }

    for (user, counts) in counts {
        for (part, share) in DayPart::ALL.into_iter().zip(shares(counts)) {
            grouped.add(part.label(), user, share);
        }
    }

    grouped
}
