//! Dashboard widgets: the owned state behind one or more charts.
//!
//! A [Widget] is created on mount, has its records replaced wholesale on every
//! refresh and is torn down on unmount. Each of its panels re-runs
//! filter → aggregate → present whenever its selection changes and swaps the
//! drawn chart for a new one.

use time::{Date, OffsetDateTime};

use crate::{
    Error,
    aggregation::{
        AggregateResult, Dimension, aggregate_into, by_user_by_product, day_part_shares_by_user,
        known_keys,
    },
    chart::{ChartKind, ChartSpec, Palette, Unit, present_with},
    filter::{BucketKind, Selection, TimeFilter},
    record::{RawDocument, VisitRecord, normalize},
    store::{DocumentStore, fetch_collection},
};

/// Something that can draw charts and later remove them.
pub trait ChartSurface {
    /// Identifies a drawn chart.
    type Handle;

    /// Draw a chart for `spec`.
    fn draw(&mut self, spec: &ChartSpec) -> Self::Handle;

    /// Remove a chart previously returned by [ChartSurface::draw].
    fn teardown(&mut self, handle: Self::Handle);
}

/// Draws charts as ECharts options for the HTML dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchartsSurface;

/// A chart drawn by [EchartsSurface].
#[derive(Debug, Clone, PartialEq)]
pub struct EchartsChart {
    /// The ECharts options, as a JavaScript object literal.
    pub options: String,
}

impl ChartSurface for EchartsSurface {
    type Handle = EchartsChart;

    fn draw(&mut self, spec: &ChartSpec) -> EchartsChart {
        EchartsChart {
            options: spec.echarts_options(),
        }
    }

    fn teardown(&mut self, _handle: EchartsChart) {}
}

/// What a widget charts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Breakdown {
    /// One series of totals grouped by `dimension`.
    Totals {
        /// What the totals are grouped by.
        dimension: Dimension,
        /// How the totals are drawn.
        kind: ChartKind,
        /// How values are formatted.
        unit: Unit,
        /// Keep every key seen in the whole record cache, reporting `0` for
        /// keys with no data in the selected range.
        zero_fill: bool,
    },
    /// Product subtotals stacked per user.
    UserProducts,
    /// Day-part shares of each user's visits.
    DayPartsByUser,
}

/// How a widget lays out its panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelLayout {
    /// One panel per bucket kind, starting on the current day, month and year.
    PerBucket,
    /// A single panel whose bucket kind can be switched, starting empty.
    Switchable,
}

/// The static description of a widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetDefinition {
    /// A kebab-case identifier, used in URLs and element IDs.
    pub id: &'static str,
    /// The heading shown above the widget's panels.
    pub title: &'static str,
    /// What the widget charts.
    pub breakdown: Breakdown,
    /// How many panels the widget has and whether their bucket kind can change.
    pub layout: PanelLayout,
    /// How panel selections turn into time ranges.
    pub filter: TimeFilter,
}

impl WidgetDefinition {
    fn initial_selections(&self, today: Date) -> Vec<Selection> {
        match self.layout {
            PanelLayout::PerBucket => BucketKind::ALL
                .into_iter()
                .map(|bucket| Selection::current(bucket, today))
                .collect(),
            PanelLayout::Switchable => vec![Selection::unset(BucketKind::Month)],
        }
    }

    fn panel_title(&self, bucket: BucketKind) -> String {
        match self.layout {
            PanelLayout::PerBucket => format!("{} by {}", self.title, bucket.as_query_value()),
            PanelLayout::Switchable => self.title.to_owned(),
        }
    }

    fn palette(&self) -> Palette {
        match self.breakdown {
            Breakdown::Totals {
                dimension: Dimension::DayPart(_),
                ..
            }
            | Breakdown::DayPartsByUser => Palette::DayParts,
            _ => Palette::Hashed,
        }
    }
}

/// One chart of a widget together with its selection.
#[derive(Debug)]
pub struct Panel<H> {
    selection: Selection,
    spec: ChartSpec,
    handle: H,
}

impl<H> Panel<H> {
    /// The bucket and value the panel is filtered by.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The chart currently shown.
    pub fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    /// The chart currently drawn for this panel.
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// A mounted widget.
pub struct Widget<S: ChartSurface> {
    definition: WidgetDefinition,
    records: Vec<VisitRecord>,
    known_keys: Vec<String>,
    panels: Vec<Panel<S::Handle>>,
    surface: S,
}

impl<S: ChartSurface> Widget<S> {
    /// Create the widget with no records and draw its initial panels.
    ///
    /// Per-bucket panels start on the bucket containing `today`.
    pub fn mount(
        definition: WidgetDefinition,
        mut surface: S,
        today: Date,
        now: OffsetDateTime,
    ) -> Self {
        let panels = definition
            .initial_selections(today)
            .into_iter()
            .map(|selection| {
                let spec = build_chart(&definition, &[], &[], &selection, now)
                    .unwrap_or_else(|error| placeholder_chart(&definition, &selection, error));
                let handle = surface.draw(&spec);

                Panel {
                    selection,
                    spec,
                    handle,
                }
            })
            .collect();

        Self {
            definition,
            records: Vec::new(),
            known_keys: Vec::new(),
            panels,
            surface,
        }
    }

    /// What the widget charts and how its panels are laid out.
    pub fn definition(&self) -> &WidgetDefinition {
        &self.definition
    }

    /// The widget's ID, unique within the dashboard.
    pub fn id(&self) -> &'static str {
        self.definition.id
    }

    /// The cached records every panel is built from.
    pub fn records(&self) -> &[VisitRecord] {
        &self.records
    }

    /// The panels in display order.
    pub fn panels(&self) -> &[Panel<S::Handle>] {
        &self.panels
    }

    /// Get the panel at `index`.
    ///
    /// # Errors
    /// Returns [Error::UnknownPanel] if the widget has no such panel.
    pub fn panel(&self, index: usize) -> Result<&Panel<S::Handle>, Error> {
        self.panels.get(index).ok_or_else(|| Error::UnknownPanel {
            widget: self.definition.id.to_owned(),
            panel: index,
        })
    }

    /// Replace the record cache and redraw every panel.
    pub fn replace_records(&mut self, records: Vec<VisitRecord>, now: OffsetDateTime) {
        self.known_keys = match self.definition.breakdown {
            Breakdown::Totals {
                dimension,
                zero_fill: true,
                ..
            } => known_keys(&records, dimension),
            _ => Vec::new(),
        };
        self.records = records;

        for index in 0..self.panels.len() {
            let selection = self.panels[index].selection.clone();
            let spec = self.chart_or_placeholder(&selection, now);
            self.redraw(index, spec);
        }
    }

    /// Normalize `documents` and use them as the new record cache.
    pub fn load(&mut self, documents: &[RawDocument], now: OffsetDateTime) {
        self.replace_records(normalize(documents), now);
    }

    /// Re-fetch `collection` from `store` and redraw.
    ///
    /// # Errors
    /// Returns the store error if the fetch fails. The failure is logged and
    /// the previous records and charts are kept.
    pub async fn refresh<D: DocumentStore>(
        &mut self,
        store: &D,
        collection: &str,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        let documents = fetch_collection(store, collection).await?;
        self.load(&documents, now);

        Ok(())
    }

    /// Change the selection of the panel at `index` and redraw it.
    ///
    /// Switching the bucket kind of a switchable panel clears its value, since
    /// a value typed for one kind is meaningless for another.
    ///
    /// # Errors
    /// Returns [Error::UnknownPanel] for a missing panel and
    /// [Error::InvalidSelection] for a selection that cannot be parsed or that
    /// names a different bucket kind than a per-bucket panel. The panel is
    /// left unchanged on error.
    pub fn select(
        &mut self,
        index: usize,
        selection: Selection,
        now: OffsetDateTime,
    ) -> Result<&ChartSpec, Error> {
        let current = self.panel(index)?.selection.bucket;

        let selection = match self.definition.layout {
            PanelLayout::PerBucket if selection.bucket != current => {
                return Err(Error::InvalidSelection {
                    bucket: selection.bucket,
                    value: selection.value,
                });
            }
            PanelLayout::Switchable if selection.bucket != current => {
                Selection::unset(selection.bucket)
            }
            _ => selection,
        };

        let spec = self.build_chart(&selection, now)?;
        self.panels[index].selection = selection;
        self.redraw(index, spec);

        Ok(&self.panels[index].spec)
    }

    /// Run filter, aggregate and present for `selection` against the record cache.
    ///
    /// # Errors
    /// Returns [Error::InvalidSelection] if the selection cannot be parsed.
    pub fn build_chart(&self, selection: &Selection, now: OffsetDateTime) -> Result<ChartSpec, Error> {
        build_chart(
            &self.definition,
            &self.records,
            &self.known_keys,
            selection,
            now,
        )
    }

    /// Tear down every chart and give back the surface.
    pub fn unmount(mut self) -> S {
        for panel in self.panels.drain(..) {
            self.surface.teardown(panel.handle);
        }

        self.surface
    }

    fn chart_or_placeholder(&self, selection: &Selection, now: OffsetDateTime) -> ChartSpec {
        self.build_chart(selection, now)
            .unwrap_or_else(|error| placeholder_chart(&self.definition, selection, error))
    }

    /// Draw `spec` first, then tear down the chart it replaces.
    fn redraw(&mut self, index: usize, spec: ChartSpec) {
        let handle = self.surface.draw(&spec);
        let panel = &mut self.panels[index];

        let previous = std::mem::replace(&mut panel.handle, handle);
        panel.spec = spec;
        self.surface.teardown(previous);
    }
}

fn build_chart(
    definition: &WidgetDefinition,
    records: &[VisitRecord],
    known_keys: &[String],
    selection: &Selection,
    now: OffsetDateTime,
) -> Result<ChartSpec, Error> {
    let filtered = definition.filter.apply(records, selection, now)?;
    let title = definition.panel_title(selection.bucket);
    let palette = definition.palette();

    let spec = match definition.breakdown {
        Breakdown::Totals {
            dimension,
            kind,
            unit,
            zero_fill,
        } => {
            let seed = if zero_fill {
                AggregateResult::seeded(known_keys.iter().cloned())
            } else {
                AggregateResult::new()
            };
            let result = aggregate_into(seed, &filtered, dimension);

            ChartSpec::single(kind, &title, unit, present_with(&result, dimension.label(), palette))
        }
        Breakdown::UserProducts => ChartSpec::grouped(
            &title,
            Unit::Currency,
            &by_user_by_product(&filtered),
            palette,
        ),
        Breakdown::DayPartsByUser => ChartSpec::grouped(
            &title,
            Unit::Percent,
            &day_part_shares_by_user(&filtered, definition.filter.offset),
            palette,
        ),
    };

    Ok(spec)
}

/// Stored selections were validated when they were set, so this only guards
/// against a selection that stopped parsing.
fn placeholder_chart(definition: &WidgetDefinition, selection: &Selection, error: Error) -> ChartSpec {
    tracing::error!(
        "could not build chart for widget {}: {error}",
        definition.id
    );

    let unit = match definition.breakdown {
        Breakdown::Totals { unit, .. } => unit,
        Breakdown::UserProducts => Unit::Currency,
        Breakdown::DayPartsByUser => Unit::Percent,
    };

    ChartSpec::grouped(
        &definition.panel_title(selection.bucket),
        unit,
        &Default::default(),
        Palette::Hashed,
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::{
        OffsetDateTime, UtcOffset,
        macros::{date, datetime},
    };

    use crate::{
        Error,
        aggregation::Dimension,
        chart::{ChartKind, NO_DATA_LABEL, Unit},
        filter::{BucketKind, EmptySelection, Selection, TimeFilter},
        store::MemoryStore,
    };

    use super::{Breakdown, ChartSurface, PanelLayout, Widget, WidgetDefinition};

    /// Records every draw and teardown so tests can check chart lifetimes.
    #[derive(Debug, Default)]
    struct RecordingSurface {
        drawn: usize,
        live: Vec<usize>,
        torn_down: Vec<usize>,
    }

    impl ChartSurface for RecordingSurface {
        type Handle = usize;

        fn draw(&mut self, _spec: &crate::chart::ChartSpec) -> usize {
            self.drawn += 1;
            self.live.push(self.drawn);
            self.drawn
        }

        fn teardown(&mut self, handle: usize) {
            self.live.retain(|live| *live != handle);
            self.torn_down.push(handle);
        }
    }

    const NOW: OffsetDateTime = datetime!(2024-05-20 12:00 UTC);

    fn payment_methods() -> WidgetDefinition {
        WidgetDefinition {
            id: "payment-methods",
            title: "Payment methods",
            breakdown: Breakdown::Totals {
                dimension: Dimension::PaymentType,
                kind: ChartKind::Bar,
                unit: Unit::Currency,
                zero_fill: true,
            },
            layout: PanelLayout::PerBucket,
            filter: TimeFilter::new(UtcOffset::UTC, EmptySelection::Nothing),
        }
    }

    fn product_quantities() -> WidgetDefinition {
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
            filter: TimeFilter::new(UtcOffset::UTC, EmptySelection::Everything),
        }
    }

    fn documents() -> Vec<serde_json::Value> {
        vec![json!({
            "alice": {
                "v1": {
                    "fecha_inicio": { "seconds": 1_714_550_400, "nanoseconds": 0 },
                    "pago": { "a": { "tipo": "cash", "total": 10 } },
                    "producto": { "x": { "producto": "Coffee", "cantidad": 2, "precio": 5 } }
                },
                "v2": {
                    "fecha_inicio": { "seconds": 1_714_636_800, "nanoseconds": 0 },
                    "pago": { "a": { "tipo": "card", "total": 5 } }
                }
            }
        })]
    }

    fn mounted(definition: WidgetDefinition) -> Widget<RecordingSurface> {
        let mut widget = Widget::mount(
            definition,
            RecordingSurface::default(),
            date!(2024 - 05 - 01),
            NOW,
        );
        widget.load(&documents(), NOW);
        widget
    }

    #[test]
    fn mount_draws_one_chart_per_panel() {
        let widget = Widget::mount(
            payment_methods(),
            RecordingSurface::default(),
            date!(2024 - 05 - 01),
            NOW,
        );

        assert_eq!(widget.panels().len(), 3);
        assert_eq!(widget.surface.live, vec![1, 2, 3]);
        assert_eq!(
            widget.panels()[0].selection(),
            &Selection::new(BucketKind::Day, "2024-05-01")
        );
        assert_eq!(widget.panels()[0].spec().labels, vec![NO_DATA_LABEL]);
    }

    #[test]
    fn loading_records_redraws_every_panel() {
        let widget = mounted(payment_methods());

        assert_eq!(widget.records().len(), 2);
        assert_eq!(widget.surface.torn_down, vec![1, 2, 3]);
        assert_eq!(widget.surface.live, vec![4, 5, 6]);
    }

    #[test]
    fn day_panel_zero_fills_known_payment_types() {
        let widget = mounted(payment_methods());

        let day = widget.panels()[0].spec();
        let month = widget.panels()[1].spec();

        assert_eq!(day.labels, vec!["cash", "card"]);
        assert_eq!(day.datasets[0].values, vec![10.0, 0.0]);
        assert_eq!(month.datasets[0].values, vec![10.0, 5.0]);
    }

    #[test]
    fn select_redraws_and_tears_down_previous_chart() {
        let mut widget = mounted(payment_methods());
        let before = *widget.panels()[0].handle();

        let spec = widget
            .select(0, Selection::new(BucketKind::Day, "2024-05-02"), NOW)
            .unwrap();

        assert_eq!(spec.datasets[0].values, vec![0.0, 5.0]);
        assert!(widget.surface.torn_down.contains(&before));
        assert_eq!(widget.surface.live.len(), 3);
    }

    #[test]
    fn select_tears_down_previous_chart_for_empty_data() {
        let mut widget = mounted(product_quantities());
        let before = *widget.panels()[0].handle();

        let spec = widget
            .select(0, Selection::new(BucketKind::Month, "1999-01"), NOW)
            .unwrap();

        assert_eq!(spec.labels, vec![NO_DATA_LABEL]);
        assert!(widget.surface.torn_down.contains(&before));
        assert_eq!(widget.surface.live, vec![*widget.panels()[0].handle()]);
    }

    #[test]
    fn invalid_selection_leaves_panel_unchanged() {
        let mut widget = mounted(payment_methods());
        let before_selection = widget.panels()[1].selection().clone();
        let before_handle = *widget.panels()[1].handle();

        let result = widget.select(1, Selection::new(BucketKind::Month, "2024-13"), NOW);

        assert_eq!(
            result.err(),
            Some(Error::InvalidSelection {
                bucket: BucketKind::Month,
                value: "2024-13".to_owned()
            })
        );
        assert_eq!(widget.panels()[1].selection(), &before_selection);
        assert_eq!(*widget.panels()[1].handle(), before_handle);
    }

    #[test]
    fn per_bucket_panel_rejects_other_bucket_kinds() {
        let mut widget = mounted(payment_methods());

        let result = widget.select(0, Selection::new(BucketKind::Year, "2024"), NOW);

        assert!(matches!(result, Err(Error::InvalidSelection { .. })));
    }

    #[test]
    fn unknown_panel_is_an_error() {
        let mut widget = mounted(payment_methods());

        let result = widget.select(7, Selection::unset(BucketKind::Day), NOW);

        assert_eq!(
            result.err(),
            Some(Error::UnknownPanel {
                widget: "payment-methods".to_owned(),
                panel: 7
            })
        );
    }

    #[test]
    fn switching_bucket_kind_clears_value() {
        let mut widget = mounted(product_quantities());

        widget
            .select(0, Selection::new(BucketKind::Day, "2024-05"), NOW)
            .unwrap();

        assert_eq!(
            widget.panels()[0].selection(),
            &Selection::unset(BucketKind::Day)
        );
    }

    #[test]
    fn switchable_panel_starts_with_everything() {
        let widget = mounted(product_quantities());

        let spec = widget.panels()[0].spec();

        assert_eq!(spec.labels, vec!["Coffee"]);
        assert_eq!(spec.datasets[0].values, vec![2.0]);
    }

    #[tokio::test]
    async fn refresh_replaces_records() {
        let store = MemoryStore::with_collection("visits", Vec::new());
        let mut widget = mounted(payment_methods());

        widget.refresh(&store, "visits", NOW).await.unwrap();

        assert!(widget.records().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_records() {
        let store = MemoryStore::new();
        let mut widget = mounted(payment_methods());
        let before = widget.panels()[1].spec().clone();

        let result = widget.refresh(&store, "visits", NOW).await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(widget.records().len(), 2);
        assert_eq!(widget.panels()[1].spec(), &before);
    }

    #[test]
    fn unmount_tears_down_every_chart() {
        let widget = mounted(payment_methods());

        let surface = widget.unmount();

        assert!(surface.live.is_empty());
        assert_eq!(surface.torn_down.len(), 6);
    }
}
