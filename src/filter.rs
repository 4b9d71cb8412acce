//! Time-range filtering of visit records by day, month or year.
//!
//! A [Selection] pairs a [BucketKind] with the value typed into the matching
//! input (`YYYY-MM-DD`, `YYYY-MM` or `YYYY`). [TimeFilter] turns a selection
//! into an inclusive [TimeRange] at an explicit UTC offset and keeps the
//! records whose start time falls inside it.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

use crate::{Error, record::VisitRecord};

/// The granularity of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketKind {
    /// A calendar day, selected as `YYYY-MM-DD`.
    Day,
    /// A calendar month, selected as `YYYY-MM`.
    Month,
    /// A calendar year, selected as `YYYY`.
    Year,
}

impl BucketKind {
    /// Every bucket kind, from finest to coarsest.
    pub const ALL: [BucketKind; 3] = [BucketKind::Day, BucketKind::Month, BucketKind::Year];

    /// The value this kind has in query strings and form fields.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// A human readable name, e.g. "Month".
    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }

    /// The HTML input type used to pick a value of this kind.
    pub fn input_type(self) -> &'static str {
        match self {
            Self::Day => "date",
            Self::Month => "month",
            Self::Year => "number",
        }
    }

    /// The selector value for the bucket containing `date`.
    pub fn value_for(self, date: Date) -> String {
        match self {
            Self::Day => format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            ),
            Self::Month => format!("{:04}-{:02}", date.year(), u8::from(date.month())),
            Self::Year => format!("{:04}", date.year()),
        }
    }
}

impl Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_value())
    }
}

/// A bucket kind together with the selected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// The granularity of the selection.
    pub bucket: BucketKind,
    /// The selected day, month or year, possibly empty.
    pub value: String,
}

impl Selection {
    /// Create a selection of `value` for `bucket`.
    pub fn new(bucket: BucketKind, value: impl Into<String>) -> Self {
        Self {
            bucket,
            value: value.into(),
        }
    }

    /// A selection with no value.
    pub fn unset(bucket: BucketKind) -> Self {
        Self::new(bucket, "")
    }

    /// The selection of the bucket containing `today`.
    pub fn current(bucket: BucketKind, today: Date) -> Self {
        Self::new(bucket, bucket.value_for(today))
    }

    /// Whether the value is blank.
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// An inclusive range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// The first instant in the range.
    pub start: OffsetDateTime,
    /// The last instant in the range.
    pub end: OffsetDateTime,
}

impl TimeRange {
    /// The range covered by the bucket `value` at `offset`.
    ///
    /// The range runs from the first instant of the bucket through the last
    /// instant before the next bucket starts.
    ///
    /// # Errors
    /// Returns [Error::InvalidSelection] if `value` is not a valid selector for `bucket`.
    pub fn for_bucket(bucket: BucketKind, value: &str, offset: UtcOffset) -> Result<Self, Error> {
        let (first_day, next_first_day) =
            bucket_bounds(bucket, value.trim()).ok_or_else(|| Error::InvalidSelection {
                bucket,
                value: value.to_owned(),
            })?;

        Ok(Self {
            start: first_day.midnight().assume_offset(offset),
            end: next_first_day.midnight().assume_offset(offset) - Duration::nanoseconds(1),
        })
    }

    /// Everything from the Unix epoch through the end of the day containing `now` at `offset`.
    pub fn until_end_of_day(now: OffsetDateTime, offset: UtcOffset) -> Self {
        let today = now.to_offset(offset).date();
        let end = match today.next_day() {
            Some(tomorrow) => tomorrow.midnight().assume_offset(offset) - Duration::nanoseconds(1),
            None => now,
        };

        Self {
            start: OffsetDateTime::UNIX_EPOCH,
            end,
        }
    }

    /// Whether `instant` lies within the range, ends included.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// What an empty selection matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptySelection {
    /// No filter configured, so nothing matches.
    #[default]
    Nothing,
    /// Every record from the Unix epoch through the end of today.
    Everything,
}

/// Filters records by a [Selection] at a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    /// The offset days, months and years start at.
    pub offset: UtcOffset,
    /// What an empty selection matches.
    pub empty_selection: EmptySelection,
}

impl TimeFilter {
    /// Create a filter that buckets at `offset`.
    pub fn new(offset: UtcOffset, empty_selection: EmptySelection) -> Self {
        Self {
            offset,
            empty_selection,
        }
    }

    /// Resolves `selection` into a range, or `None` if nothing can match.
    ///
    /// # Errors
    /// Returns [Error::InvalidSelection] for a non-empty value that does not
    /// parse for the selected bucket kind.
    pub fn resolve(
        &self,
        selection: &Selection,
        now: OffsetDateTime,
    ) -> Result<Option<TimeRange>, Error> {
        if selection.is_empty() {
            return Ok(match self.empty_selection {
                EmptySelection::Nothing => None,
                EmptySelection::Everything => Some(TimeRange::until_end_of_day(now, self.offset)),
            });
        }

        TimeRange::for_bucket(selection.bucket, &selection.value, self.offset).map(Some)
    }

    /// The records whose start time falls within `selection`, in their original order.
    ///
    /// # Errors
    /// Returns [Error::InvalidSelection] if the selection cannot be parsed.
    pub fn apply<'a>(
        &self,
        records: &'a [VisitRecord],
        selection: &Selection,
        now: OffsetDateTime,
    ) -> Result<Vec<&'a VisitRecord>, Error> {
        let Some(range) = self.resolve(selection, now)? else {
            return Ok(Vec::new());
        };

        Ok(records
            .iter()
            .filter(|record| range.contains(record.start_time))
            .collect())
    }
}

/// The first day of the bucket and the first day of the bucket after it.
fn bucket_bounds(bucket: BucketKind, value: &str) -> Option<(Date, Date)> {
    match bucket {
        BucketKind::Day => {
            let day = parse_day(value)?;
            Some((day, day.next_day()?))
        }
        BucketKind::Month => {
            let (year, month) = value.split_once('-')?;
            let year = parse_year(year)?;
            let month = parse_month(month)?;
            let (next_year, next_month) = match month {
                Month::December => (year + 1, Month::January),
                month => (year, month.next()),
            };

            Some((
                Date::from_calendar_date(year, month, 1).ok()?,
                Date::from_calendar_date(next_year, next_month, 1).ok()?,
            ))
        }
        BucketKind::Year => {
            let year = parse_year(value)?;

            Some((
                Date::from_calendar_date(year, Month::January, 1).ok()?,
                Date::from_calendar_date(year + 1, Month::January, 1).ok()?,
            ))
        }
    }
}

fn parse_day(value: &str) -> Option<Date> {
    let (year, rest) = value.split_once('-')?;
    let (month, day) = rest.split_once('-')?;

    Date::from_calendar_date(
        parse_year(year)?,
        parse_month(month)?,
        parse_digits(day, 2)?,
    )
    .ok()
}

fn parse_year(text: &str) -> Option<i32> {
    parse_digits(text, 4)
}

fn parse_month(text: &str) -> Option<Month> {
    Month::try_from(parse_digits::<u8>(text, 2)?).ok()
}

fn parse_digits<T: std::str::FromStr>(text: &str, width: usize) -> Option<T> {
    if text.len() != width || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    text.parse().ok()
}
