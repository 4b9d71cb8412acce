//! The widgets shown on the dashboard.

use crate::{
    aggregation::{Dimension, UserMeasure},
    chart::{ChartKind, Unit},
    config::DashboardConfig,
    filter::{EmptySelection, TimeFilter},
    widget::{Breakdown, PanelLayout, WidgetDefinition},
};

/// Every widget of the dashboard, in display order.
pub fn widget_definitions(config: &DashboardConfig) -> Vec<WidgetDefinition> {
    let payments = TimeFilter::new(config.payments_offset, EmptySelection::Nothing);
    let local = TimeFilter::new(config.local_offset, EmptySelection::Nothing);
    let local_or_everything = TimeFilter::new(config.local_offset, EmptySelection::Everything);

    vec![
        WidgetDefinition {
            id: "payment-methods",
            title: "Payments by method",
            breakdown: Breakdown::Totals {
                dimension: Dimension::PaymentType,
                kind: ChartKind::Bar,
                unit: Unit::Currency,
                zero_fill: true,
            },
            layout: PanelLayout::PerBucket,
            filter: payments,
        },
        WidgetDefinition {
            id: "user-spending",
            title: "Spending by user",
            breakdown: Breakdown::Totals {
                dimension: Dimension::User(UserMeasure::Payments),
                kind: ChartKind::Bar,
                unit: Unit::Currency,
                zero_fill: false,
            },
            layout: PanelLayout::Switchable,
            filter: local_or_everything,
        },
        WidgetDefinition {
            id: "product-totals",
            title: "Sales by product",
            breakdown: Breakdown::Totals {
                dimension: Dimension::Product,
                kind: ChartKind::Bar,
                unit: Unit::Currency,
                zero_fill: false,
            },
            layout: PanelLayout::PerBucket,
            filter: local,
        },
        WidgetDefinition {
            id: "user-products",
            title: "Products by user",
            breakdown: Breakdown::UserProducts,
            layout: PanelLayout::PerBucket,
            filter: local,
        },
        WidgetDefinition {
            id: "visits-by-day-part",
            title: "Visits by time of day",
            breakdown: Breakdown::Totals {
                dimension: Dimension::DayPart(config.local_offset),
                kind: ChartKind::Doughnut,
                unit: Unit::Percent,
                zero_fill: false,
            },
            layout: PanelLayout::PerBucket,
            filter: local,
        },
        WidgetDefinition {
            id: "user-visits-by-day-part",
            title: "Time of day by user",
            breakdown: Breakdown::DayPartsByUser,
            layout: PanelLayout::Switchable,
            filter: local_or_everything,
        },
        WidgetDefinition {
            id: "product-quantities",
            title: "Products consumed",
            breakdown: Breakdown::Totals {
                dimension: Dimension::ProductQuantity,
                kind: ChartKind::Bar,
                unit: Unit::Count,
                zero_fill: false,
            },
            layout: PanelLayout::Switchable,
            filter: local_or_everything,
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use time::{UtcOffset, macros::offset};

    use crate::{
        aggregation::Dimension,
        config::DashboardConfig,
        widget::{Breakdown, PanelLayout},
    };

    use super::widget_definitions;

    #[test]
    fn widget_ids_are_unique_kebab_case() {
        let definitions = widget_definitions(&DashboardConfig::default());
        let ids: HashSet<_> = definitions.iter().map(|definition| definition.id).collect();

        assert_eq!(ids.len(), definitions.len());
        assert!(ids.iter().all(|id| {
            id.chars()
                .all(|c| c.is_ascii_lowercase() || c == '-')
        }));
    }

    #[test]
    fn payment_widget_uses_payments_offset() {
        let config = DashboardConfig {
            payments_offset: offset!(+1),
            ..Default::default()
        };

        let definitions = widget_definitions(&config);
        let payments = definitions
            .iter()
            .find(|definition| definition.id == "payment-methods")
            .unwrap();

        assert_eq!(payments.filter.offset, offset!(+1));
        assert_eq!(payments.layout, PanelLayout::PerBucket);
    }

    #[test]
    fn day_part_widgets_use_local_offset() {
        let definitions = widget_definitions(&DashboardConfig::default());

        for definition in definitions.iter().filter(|definition| {
            matches!(
                definition.breakdown,
                Breakdown::DayPartsByUser
                    | Breakdown::Totals {
                        dimension: Dimension::DayPart(_),
                        ..
                    }
            )
        }) {
            assert_eq!(definition.filter.offset, offset!(-5), "{}", definition.id);
            assert_ne!(definition.filter.offset, UtcOffset::UTC);
        }
    }
}
