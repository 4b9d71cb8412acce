//! Dashboard module
//!
//! Mounts every widget of the catalogue, shares one normalized record cache
//! between them and serves them as HTML pages and JSON chart specs.

mod catalog;
mod handlers;
mod views;

use time::{Date, OffsetDateTime};

pub use catalog::widget_definitions;
pub(crate) use handlers::{
    DashboardState, get_dashboard_page, get_panel, get_panel_spec, post_refresh,
};

use crate::{
    Error,
    config::DashboardConfig,
    record::{PointsEntry, RawDocument, normalize, normalize_points},
    store::{DocumentStore, fetch_collection},
    widget::{EchartsSurface, Widget},
};

/// The mounted widgets of the dashboard.
pub struct Dashboard {
    config: DashboardConfig,
    widgets: Vec<Widget<EchartsSurface>>,
    points: Vec<PointsEntry>,
    record_count: usize,
    last_loaded: Option<OffsetDateTime>,
}

impl Dashboard {
    /// Mount every widget of the catalogue with no records.
    pub fn mount(config: DashboardConfig, today: Date, now: OffsetDateTime) -> Self {
        let widgets = widget_definitions(&config)
            .into_iter()
            .map(|definition| Widget::mount(definition, EchartsSurface, today, now))
            .collect();

        Self {
            config,
            widgets,
            points: Vec::new(),
            record_count: 0,
            last_loaded: None,
        }
    }

    /// The configuration the widgets were mounted with.
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The collection visits are fetched from.
    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// The collection loyalty points are fetched from.
    pub fn points_collection(&self) -> &str {
        &self.config.points_collection
    }

    /// The mounted widgets, in catalogue order.
    pub fn widgets(&self) -> &[Widget<EchartsSurface>] {
        &self.widgets
    }

    /// The loyalty points currently loaded, in store order.
    pub fn points(&self) -> &[PointsEntry] {
        &self.points
    }

    /// The number of visit records currently loaded.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// When records were last loaded, if ever.
    pub fn last_loaded(&self) -> Option<OffsetDateTime> {
        self.last_loaded
    }

    /// Look up a widget by ID.
    ///
    /// # Errors
    /// Returns [Error::UnknownWidget] if no widget has the ID `id`.
    pub fn widget(&self, id: &str) -> Result<&Widget<EchartsSurface>, Error> {
        self.widgets
            .iter()
            .find(|widget| widget.id() == id)
            .ok_or_else(|| Error::UnknownWidget(id.to_owned()))
    }

    /// # Errors
    /// Returns [Error::UnknownWidget] if no widget has the ID `id`.
    pub fn widget_mut(&mut self, id: &str) -> Result<&mut Widget<EchartsSurface>, Error> {
        self.widgets
            .iter_mut()
            .find(|widget| widget.id() == id)
            .ok_or_else(|| Error::UnknownWidget(id.to_owned()))
    }

    /// Normalize `documents` once and give every widget its own copy of the records.
    pub fn load(&mut self, documents: &[RawDocument], now: OffsetDateTime) {
        let records = normalize(documents);
        self.record_count = records.len();
        self.last_loaded = Some(now);

        for widget in &mut self.widgets {
            widget.replace_records(records.clone(), now);
        }

        tracing::info!(
            "loaded {} visit records into {} widgets",
            self.record_count,
            self.widgets.len()
        );
    }

    /// Replace the loyalty points table with entries built from `documents`.
    pub fn load_points(&mut self, documents: &[RawDocument]) {
        self.points = normalize_points(documents);

        tracing::info!("loaded {} loyalty points entries", self.points.len());
    }

    /// Load whatever a refresh managed to fetch.
    ///
    /// Points are loaded when they were fetched, independently of the visits.
    ///
    /// # Errors
    /// Returns the visits' fetch error, in which case every widget keeps its
    /// previous records.
    pub(crate) fn finish_refresh(
        &mut self,
        visits: Result<Vec<RawDocument>, Error>,
        points: Result<Vec<RawDocument>, Error>,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        if let Ok(points) = points {
            self.load_points(&points);
        }

        self.load(&visits?, now);

        Ok(())
    }

    /// Re-fetch the configured collections from `store` and reload every widget
    /// and the points table.
    ///
    /// # Errors
    /// Returns the store error if the visits cannot be fetched, in which case
    /// the failure is logged and every widget keeps its previous records. A
    /// failed points fetch is logged and keeps the previous points.
    pub async fn refresh<D: DocumentStore>(
        &mut self,
        store: &D,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        let visits = fetch_collection(store, &self.config.collection).await;
        let points = fetch_collection(store, &self.config.points_collection).await;

        self.finish_refresh(visits, points, now)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::{date, datetime};

    use crate::{Error, config::DashboardConfig, store::MemoryStore};

    use super::Dashboard;

    fn documents() -> Vec<serde_json::Value> {
        vec![json!({
            "alice": {
                "v1": {
                    "fecha_inicio": { "seconds": 1_714_550_400, "nanoseconds": 0 },
                    "pago": { "a": { "tipo": "cash", "total": 10 } }
                }
            }
        })]
    }

    fn dashboard() -> Dashboard {
        Dashboard::mount(
            DashboardConfig::default(),
            date!(2024 - 05 - 01),
            datetime!(2024-05-01 12:00 UTC),
        )
    }

    #[test]
    fn mounts_every_widget() {
        let dashboard = dashboard();

        assert_eq!(dashboard.widgets().len(), 7);
        assert_eq!(dashboard.record_count(), 0);
        assert_eq!(dashboard.last_loaded(), None);
    }

    #[test]
    fn load_shares_records_with_every_widget() {
        let mut dashboard = dashboard();
        let now = datetime!(2024-05-01 12:00 UTC);

        dashboard.load(&documents(), now);

        assert_eq!(dashboard.record_count(), 1);
        assert_eq!(dashboard.last_loaded(), Some(now));
        assert!(
            dashboard
                .widgets()
                .iter()
                .all(|widget| widget.records().len() == 1)
        );
    }

    #[test]
    fn unknown_widget_is_an_error() {
        let dashboard = dashboard();

        assert_eq!(
            dashboard.widget("nope").err(),
            Some(Error::UnknownWidget("nope".to_owned()))
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_records() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.load(&documents(), datetime!(2024-05-01 12:00 UTC));

        let result = dashboard
            .refresh(&store, datetime!(2024-05-02 12:00 UTC))
            .await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(dashboard.record_count(), 1);
        assert_eq!(
            dashboard.last_loaded(),
            Some(datetime!(2024-05-01 12:00 UTC))
        );
    }

    fn points_documents() -> Vec<serde_json::Value> {
        vec![
            json!({ "_id": "p1", "cliente": "alice", "fecha": "2024-05-01", "puntos": 30 }),
            json!({ "_id": "p2" }),
        ]
    }

    #[tokio::test]
    async fn refresh_loads_points_collection() {
        let store = MemoryStore::with_collection("DatosFidelizacion", documents());
        store.replace_collection("Fidelizacion", points_documents());
        let mut dashboard = dashboard();

        dashboard
            .refresh(&store, datetime!(2024-05-01 12:00 UTC))
            .await
            .unwrap();

        assert_eq!(dashboard.record_count(), 1);
        let points = dashboard.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].client, "alice");
        assert_eq!(points[0].points, 30.0);
        assert_eq!(points[1].client, "N/A");
        assert_eq!(points[1].points, 0.0);
    }

    #[tokio::test]
    async fn missing_points_collection_still_loads_visits() {
        let store = MemoryStore::with_collection("DatosFidelizacion", documents());
        let mut dashboard = dashboard();
        dashboard.load_points(&points_documents()[..1]);

        dashboard
            .refresh(&store, datetime!(2024-05-01 12:00 UTC))
            .await
            .unwrap();

        assert_eq!(dashboard.record_count(), 1);
        assert_eq!(dashboard.points().len(), 1);
    }

    #[tokio::test]
    async fn failed_visits_fetch_still_loads_points() {
        let store = MemoryStore::with_collection("Fidelizacion", points_documents());
        let mut dashboard = dashboard();

        let result = dashboard
            .refresh(&store, datetime!(2024-05-01 12:00 UTC))
            .await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(dashboard.record_count(), 0);
        assert_eq!(dashboard.points().len(), 2);
    }

    #[tokio::test]
    async fn refresh_reads_configured_collection() {
        let store = MemoryStore::with_collection("DatosFidelizacion", documents());
        let mut dashboard = dashboard();

        dashboard
            .refresh(&store, datetime!(2024-05-01 12:00 UTC))
            .await
            .unwrap();

        assert_eq!(dashboard.record_count(), 1);
    }
}
