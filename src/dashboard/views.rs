//! HTML views for the dashboard page and its panels.

use maud::{Markup, PreEscaped, html};
use time::{format_description::FormatItem, macros::format_description};

use crate::{
    chart::{ChartSpec, Unit},
    dashboard::Dashboard,
    endpoints,
    filter::BucketKind,
    record::PointsEntry,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, HeadElement,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
        format_currency, format_percent, loading_spinner,
    },
    widget::{EchartsChart, EchartsSurface, Panel, PanelLayout, Widget},
};

const ECHARTS_SCRIPT: &str = "https://cdn.jsdelivr.net/npm/echarts@6.0.0/dist/echarts.min.js";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute] UTC");

/// Disposes ECharts instances before HTMX removes their elements.
const CHART_CLEANUP_SCRIPT: &str = r#"
document.addEventListener('htmx:beforeCleanupElement', function(event) {
    const chart = echarts.getInstanceByDom(event.target);
    if (chart) {
        chart.dispose();
    }
});
"#;

/// The full dashboard page.
pub(super) fn dashboard_view(dashboard: &Dashboard) -> Markup {
    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        HeadElement::ScriptSource(PreEscaped(CHART_CLEANUP_SCRIPT.to_owned())),
    ];

    base("Dashboard", &scripts, &dashboard_content(dashboard))
}

/// Everything below the page head, swapped in after a refresh.
pub(super) fn dashboard_content(dashboard: &Dashboard) -> Markup {
    let last_loaded = dashboard
        .last_loaded()
        .and_then(|instant| instant.format(TIMESTAMP_FORMAT).ok());

    html!(
        div
            id="dashboard-content"
            class=(PAGE_CONTAINER_STYLE)
        {
            header class="flex flex-wrap items-center justify-between w-full mb-6 gap-4"
            {
                div
                {
                    h1 class="text-2xl font-bold" { "Loyalty dashboard" }

                    p id="dashboard-status" class="text-sm text-gray-600 dark:text-gray-400"
                    {
                        @match last_loaded {
                            Some(timestamp) => {
                                (dashboard.record_count()) " visits from "
                                (dashboard.collection()) ", loaded " (timestamp)
                            }
                            None => "No visits loaded yet. Charts will fill in once data is refreshed."
                        }
                    }
                }

                button
                    type="button"
                    hx-post=(endpoints::REFRESH)
                    hx-target="#dashboard-content"
                    hx-target-error="#alert-container"
                    hx-swap="outerHTML"
                    hx-indicator="this"
                    class=(BUTTON_PRIMARY_STYLE)
                {
                    span class="htmx-indicator" { (loading_spinner()) }
                    "Refresh"
                }
            }

            @for widget in dashboard.widgets() {
                (widget_view(widget))
            }

            (points_table(dashboard.points()))
        }
    )
}

fn widget_view(widget: &Widget<EchartsSurface>) -> Markup {
    let definition = widget.definition();

    html!(
        section
            id=(definition.id)
            class="w-full mb-8"
        {
            h2 class="text-xl font-semibold mb-4" { (definition.title) }

            div class="grid grid-cols-1 xl:grid-cols-3 gap-4"
            {
                @for (index, panel) in widget.panels().iter().enumerate() {
                    (panel_view(definition.id, definition.layout, index, panel))
                }
            }
        }
    )
}

/// One panel: its selection form, its chart and the totals under it.
pub(super) fn panel_view(
    widget_id: &str,
    layout: PanelLayout,
    index: usize,
    panel: &Panel<EchartsChart>,
) -> Markup {
    let panel_id = panel_id(widget_id, index);
    let chart_id = format!("{panel_id}-chart");
    let value_id = format!("{panel_id}-value");
    let selection = panel.selection();
    let bucket = selection.bucket;
    let is_year = bucket == BucketKind::Year;

    html!(
        div
            id=(panel_id)
            class="flex flex-col gap-2 p-4 rounded bg-white dark:bg-gray-800"
        {
            form
                hx-get=(endpoints::format_panel_endpoint(endpoints::DASHBOARD_PANEL, widget_id, index))
                hx-trigger="change"
                hx-target={ "#" (panel_id) }
                hx-target-error="#alert-container"
                hx-swap="outerHTML"
                class="flex flex-wrap items-end gap-2"
            {
                @match layout {
                    PanelLayout::PerBucket => {
                        input type="hidden" name="bucket" value=(bucket.as_query_value());
                    }
                    PanelLayout::Switchable => {
                        select
                            name="bucket"
                            aria-label="Group by"
                            class=(FORM_TEXT_INPUT_STYLE)
                        {
                            @for kind in BucketKind::ALL {
                                option
                                    value=(kind.as_query_value())
                                    selected[kind == bucket]
                                {
                                    (kind.label())
                                }
                            }
                        }
                    }
                }

                div class="flex-1"
                {
                    label for=(value_id) class=(FORM_LABEL_STYLE) { (bucket.label()) }

                    input
                        id=(value_id)
                        type=(bucket.input_type())
                        name="value"
                        value=(selection.value)
                        min=[is_year.then_some("1970")]
                        max=[is_year.then_some("9999")]
                        step=[is_year.then_some("1")]
                        class=(FORM_TEXT_INPUT_STYLE);
                }
            }

            div
                id=(chart_id)
                class="min-h-[380px] rounded dark:bg-gray-100"
            {}

            script { (chart_script(&chart_id, panel.handle())) }

            (totals_table(panel.spec()))
        }
    )
}

fn panel_id(widget_id: &str, index: usize) -> String {
    format!("{widget_id}-panel-{index}")
}

/// Initializes the chart in the element `chart_id`, replacing any chart already there.
fn chart_script(chart_id: &str, chart: &EchartsChart) -> PreEscaped<String> {
    // Labels come from user data, so a closing tag must not end the script early.
    let options = chart.options.replace("</", "<\\/");

    PreEscaped(format!(
        r#"(function() {{
            const chartDom = document.getElementById("{chart_id}");
            const existing = echarts.getInstanceByDom(chartDom);
            if (existing) {{
                existing.dispose();
            }}
            const chart = echarts.init(chartDom);
            const option = {options};
            chart.setOption(option);
            window.addEventListener('resize', () => chart.resize());
        }})();"#
    ))
}

fn totals_table(spec: &ChartSpec) -> Markup {
    html!(
        table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
        {
            thead class=(TABLE_HEADER_STYLE)
            {
                tr
                {
                    th scope="col" class=(TABLE_CELL_STYLE) { "Name" }
                    th scope="col" class={ (TABLE_CELL_STYLE) " text-right" } { "Total" }
                }
            }

            tbody
            {
                @for (label, value) in spec.totals.iter() {
                    tr class=(TABLE_ROW_STYLE)
                    {
                        td class=(TABLE_CELL_STYLE) { (label) }
                        td class={ (TABLE_CELL_STYLE) " text-right" } { (format_value(spec.unit, value)) }
                    }
                }

                @if spec.unit != Unit::Percent {
                    tr class={ (TABLE_ROW_STYLE) " font-semibold" }
                    {
                        td class=(TABLE_CELL_STYLE) { "Total" }
                        td class={ (TABLE_CELL_STYLE) " text-right" } { (format_value(spec.unit, spec.grand_total())) }
                    }
                }
            }
        }
    )
}

/// The loyalty points of every client, one row per entry.
fn points_table(points: &[PointsEntry]) -> Markup {
    html!(
        section
            id="loyalty-points"
            class="w-full mb-8"
        {
            h2 class="text-xl font-semibold mb-4" { "Loyalty points" }

            div class="p-4 rounded bg-white dark:bg-gray-800"
            {
                table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "ID" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Client" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            th scope="col" class={ (TABLE_CELL_STYLE) " text-right" } { "Points" }
                        }
                    }

                    tbody
                    {
                        @for entry in points {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE) { (entry.id) }
                                td class=(TABLE_CELL_STYLE) { (entry.client) }
                                td class=(TABLE_CELL_STYLE) { (entry.date) }
                                td class={ (TABLE_CELL_STYLE) " text-right" } { (format_value(Unit::Count, entry.points)) }
                            }
                        }

                        @if points.is_empty() {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td colspan="4" class=(TABLE_CELL_STYLE) { "No loyalty points loaded." }
                            }
                        }
                    }
                }
            }
        }
    )
}

fn format_value(unit: Unit, value: f64) -> String {
    match unit {
        Unit::Currency => format_currency(value),
        Unit::Percent => format_percent(value),
        Unit::Count => format!("{value}"),
    }
}
