//! Conversion of [ChartSpec]s into ECharts options with `charming`.

use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title},
    datatype::{DataPoint, DataPointItem},
    element::{
        AxisLabel, AxisPointer, AxisPointerType, AxisType, Emphasis, EmphasisFocus, ItemStyle,
        JsFunction, Tooltip, Trigger,
    },
    series::{Pie, bar},
};

use super::{ChartKind, ChartSpec, Dataset, Unit};

impl ChartSpec {
    /// Builds the `charming` chart for this spec.
    pub fn to_chart(&self) -> Chart {
        match self.kind {
            ChartKind::Bar => self.bar_chart(),
            ChartKind::Doughnut => self.doughnut_chart(),
        }
    }

    /// The ECharts options for this spec.
    ///
    /// Formatters are emitted as function literals, so the result is meant to
    /// be evaluated as a JavaScript object rather than parsed as JSON.
    pub fn echarts_options(&self) -> String {
        self.to_chart().to_string()
    }

    fn bar_chart(&self) -> Chart {
        let mut chart = Chart::new()
            .title(Title::new().text(self.title.as_str()))
            .tooltip(
                Tooltip::new()
                    .trigger(Trigger::Axis)
                    .value_formatter(value_formatter(self.unit))
                    .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow)),
            )
            .grid(
                Grid::new()
                    .left("3%")
                    .right("4%")
                    .bottom("3%")
                    .top(80)
                    .contain_label(true),
            )
            .x_axis(
                Axis::new()
                    .type_(AxisType::Category)
                    .data(self.labels.clone()),
            )
            .y_axis(
                Axis::new()
                    .type_(AxisType::Value)
                    .axis_label(AxisLabel::new().formatter(value_formatter(self.unit))),
            );

        if self.datasets.len() > 1 {
            chart = chart.legend(Legend::new().top(30));
        }

        for dataset in &self.datasets {
            let mut series = bar::Bar::new()
                .name(dataset.label.as_str())
                .data(data_points(dataset, &self.labels));

            if let Some(color) = dataset.colors.first() {
                series = series.item_style(ItemStyle::new().color(color.to_hex().as_str()));
            }

            if self.stacked {
                series = series
                    .stack("total")
                    .emphasis(Emphasis::new().focus(EmphasisFocus::Series));
            }

            chart = chart.series(series);
        }

        chart
    }

    fn doughnut_chart(&self) -> Chart {
        let mut chart = Chart::new()
            .title(Title::new().text(self.title.as_str()))
            .tooltip(
                Tooltip::new()
                    .trigger(Trigger::Item)
                    .value_formatter(value_formatter(self.unit)),
            )
            .legend(Legend::new().bottom(0));

        for dataset in &self.datasets {
            chart = chart.series(
                Pie::new()
                    .name(dataset.label.as_str())
                    .radius(vec!["40%", "70%"])
                    .data(data_points(dataset, &self.labels)),
            );
        }

        chart
    }
}

/// Points named after their label, each with its own colour when the dataset
/// has one per value.
fn data_points(dataset: &Dataset, labels: &[String]) -> Vec<DataPoint> {
    let per_point = dataset.colors.len() == dataset.values.len();

    dataset
        .values
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(index, (value, label))| {
            let mut item = DataPointItem::new(*value).name(label.as_str());
            if per_point && let Some(color) = dataset.colors.get(index) {
                item = item.item_style(ItemStyle::new().color(color.to_hex().as_str()));
            }

            item.into()
        })
        .collect()
}

#[inline]
fn value_formatter(unit: Unit) -> JsFunction {
    match unit {
        Unit::Currency => JsFunction::new_with_args(
            "number",
            "const currencyFormatter = new Intl.NumberFormat('en-US', {
                  style: 'currency',
                  currency: 'USD'
                });
                return (typeof number === 'number') ? currencyFormatter.format(number) : \"-\";",
        ),
        Unit::Percent => JsFunction::new_with_args(
            "number",
            "return (typeof number === 'number') ? number.toFixed(2) + '%' : \"-\";",
        ),
        Unit::Count => JsFunction::new_with_args("number", "return number;"),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        aggregation::{AggregateResult, GroupedSeries},
        chart::{ChartKind, ChartSpec, Color, Palette, Unit, present},
    };

    fn payments() -> AggregateResult {
        let mut result = AggregateResult::new();
        result.add("cash", 13.0);
        result.add("card", 5.0);
        result
    }

    #[test]
    fn bar_options_contain_labels_and_colors() {
        let spec = ChartSpec::single(
            ChartKind::Bar,
            "Payment methods",
            Unit::Currency,
            present(&payments(), "Payment method"),
        );

        let options = spec.echarts_options();

        assert!(options.contains("Payment methods"));
        assert!(options.contains("\"cash\""));
        assert!(options.contains(&Color::for_key("card").to_hex()));
        assert!(!options.contains("\"stack\""));
    }

    #[test]
    fn currency_formatter_keeps_zero_values() {
        let mut result = payments();
        result.add("voucher", 0.0);
        let spec = ChartSpec::single(
            ChartKind::Bar,
            "Payment methods",
            Unit::Currency,
            present(&result, "Payment method"),
        );

        let options = spec.echarts_options();

        assert!(options.contains("typeof number === 'number'"));
        assert!(!options.contains("(number) ?"));
    }

    #[test]
    fn doughnut_options_use_ring_radius() {
        let spec = ChartSpec::single(
            ChartKind::Doughnut,
            "Visits",
            Unit::Percent,
            present(&payments(), "Time of day"),
        );

        let options = spec.echarts_options();

        assert!(options.contains("\"pie\""));
        assert!(options.contains("\"40%\""));
        assert!(options.contains("toFixed(2)"));
    }

    #[test]
    fn grouped_options_are_stacked() {
        let mut series = GroupedSeries::new();
        series.add("alice", "Tea", 2.0);
        series.add("bob", "Tea", 1.0);
        let spec = ChartSpec::grouped("Products by user", Unit::Currency, &series, Palette::Hashed);

        let options = spec.echarts_options();

        assert!(options.contains("\"stack\""));
        assert!(options.contains("\"alice\""));
        assert!(options.contains("\"bob\""));
    }
}
