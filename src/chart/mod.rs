//! Presentation of aggregates as chart-ready series.
//!
//! [present] turns an [AggregateResult] into labels, values and colours.
//! [ChartSpec] is the output boundary of the pipeline: it is serialized as-is
//! for API clients and converted into ECharts options for the HTML dashboard.

mod color;
mod echarts;

use serde::Serialize;

use crate::aggregation::{AggregateResult, GroupedSeries};

pub use color::{Color, Palette};

/// The category shown in place of an empty aggregate.
pub const NO_DATA_LABEL: &str = "No data";

/// Chart-ready data for a single-series aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    /// The dimension the values were grouped by.
    pub title: String,
    /// One label per value.
    pub labels: Vec<String>,
    /// The aggregated values.
    pub values: Vec<f64>,
    /// One colour per value.
    pub colors: Vec<Color>,
    /// The sum of `values`.
    pub total: f64,
}

/// Presents `result` with colours hashed from its keys.
pub fn present(result: &AggregateResult, dimension_label: &str) -> Presentation {
    present_with(result, dimension_label, Palette::Hashed)
}

/// Presents `result`, picking colours from `palette`.
///
/// An empty aggregate becomes a single grey [NO_DATA_LABEL] category with
/// the value `0`.
pub fn present_with(result: &AggregateResult, dimension_label: &str, palette: Palette) -> Presentation {
    if result.is_empty() {
        return Presentation {
            title: dimension_label.to_owned(),
            labels: vec![NO_DATA_LABEL.to_owned()],
            values: vec![0.0],
            colors: vec![Color::PLACEHOLDER],
            total: 0.0,
        };
    }

    let labels = result.labels();
    let values = result.values();
    let colors = labels.iter().map(|label| palette.color_for(label)).collect();
    let total = values.iter().sum();

    Presentation {
        title: dimension_label.to_owned(),
        labels,
        values,
        colors,
        total,
    }
}

/// The shape of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    /// Vertical bars, stacked when there are several datasets.
    Bar,
    /// A ring chart of one dataset.
    Doughnut,
}

/// How the values of a chart are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Unit {
    /// Money, shown with two decimals.
    Currency,
    /// A share out of 100.
    Percent,
    /// A plain number of things.
    Count,
}

/// One named sequence of values aligned with [ChartSpec::labels].
///
/// `colors` holds either one colour per value or a single colour for the
/// whole series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// The series name shown in the legend.
    pub label: String,
    /// One value per label of the chart.
    pub values: Vec<f64>,
    /// The colours to draw `values` with.
    pub colors: Vec<Color>,
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    /// The shape of the chart.
    pub kind: ChartKind,
    /// The chart's title.
    pub title: String,
    /// How values are formatted in tooltips and tables.
    pub unit: Unit,
    /// The category axis.
    pub labels: Vec<String>,
    /// The series drawn over `labels`.
    pub datasets: Vec<Dataset>,
    /// Whether bars of different datasets are stacked.
    pub stacked: bool,
    /// Per-label totals for a single series, per-series totals otherwise.
    pub totals: AggregateResult,
}

impl ChartSpec {
    /// A single-series chart with one colour per label.
    pub fn single(kind: ChartKind, title: &str, unit: Unit, presentation: Presentation) -> Self {
        let mut totals = AggregateResult::new();
        for (label, value) in presentation.labels.iter().zip(&presentation.values) {
            totals.add(label, *value);
        }

        Self {
            kind,
            title: title.to_owned(),
            unit,
            labels: presentation.labels,
            datasets: vec![Dataset {
                label: presentation.title,
                values: presentation.values,
                colors: presentation.colors,
            }],
            stacked: false,
            totals,
        }
    }

    /// A stacked bar chart with one coloured dataset per series.
    ///
    /// Empty series become the same grey placeholder as [present].
    pub fn grouped(title: &str, unit: Unit, series: &GroupedSeries, palette: Palette) -> Self {
        if series.is_empty() {
            let placeholder = present(&AggregateResult::new(), NO_DATA_LABEL);
            return Self {
                stacked: true,
                ..Self::single(ChartKind::Bar, title, unit, placeholder)
            };
        }

        let datasets = series
            .series()
            .map(|(name, values)| Dataset {
                label: name.to_owned(),
                values: values.to_vec(),
                colors: vec![palette.color_for(name)],
            })
            .collect();

        Self {
            kind: ChartKind::Bar,
            title: title.to_owned(),
            unit,
            labels: series.labels(),
            datasets,
            stacked: true,
            totals: series.totals(),
        }
    }

    /// The sum of every dataset.
    pub fn grand_total(&self) -> f64 {
        self.totals.total()
    }
}
