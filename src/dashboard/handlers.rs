//! Route handlers for the dashboard page, its panels and the refresh action.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRequest;
use maud::Markup;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    chart::ChartSpec,
    dashboard::{
        Dashboard,
        views::{dashboard_content, dashboard_view, panel_view},
    },
    filter::{BucketKind, Selection},
    store::{StoreBackend, fetch_collection},
};

/// The state needed for displaying and refreshing the dashboard.
#[derive(Clone)]
pub struct DashboardState {
    /// The mounted widgets and their record cache.
    pub dashboard: Arc<Mutex<Dashboard>>,
    /// Where visits are fetched from.
    pub store: Arc<StoreBackend>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            dashboard: state.dashboard.clone(),
            store: state.store.clone(),
        }
    }
}

impl DashboardState {
    fn lock_dashboard(&self) -> Result<MutexGuard<'_, Dashboard>, Error> {
        self.dashboard
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire dashboard lock: {error}"))
            .map_err(|_| Error::DashboardLockError)
    }

    /// Fetch the configured collections and reload every widget and the
    /// points table.
    ///
    /// The store is queried without holding the dashboard lock so panels can
    /// still be served while a slow fetch is in flight.
    pub(crate) async fn refresh(&self) -> Result<(), Error> {
        let (collection, points_collection) = {
            let dashboard = self.lock_dashboard()?;
            (
                dashboard.collection().to_owned(),
                dashboard.points_collection().to_owned(),
            )
        };

        let visits = fetch_collection(self.store.as_ref(), &collection).await;
        let points = fetch_collection(self.store.as_ref(), &points_collection).await;

        self.lock_dashboard()?
            .finish_refresh(visits, points, OffsetDateTime::now_utc())
    }
}

/// The query string sent by a panel's selection form.
///
/// A request without a bucket re-renders the panel as it is.
#[derive(Debug, Default, Deserialize)]
pub struct PanelQuery {
    /// The bucket kind picked in the form.
    pub bucket: Option<BucketKind>,
    /// The day, month or year typed in the form.
    pub value: Option<String>,
}

/// Display the dashboard page with every widget.
pub async fn get_dashboard_page(State(state): State<DashboardState>) -> Response {
    match state.lock_dashboard() {
        Ok(dashboard) => dashboard_view(&dashboard).into_response(),
        Err(error) => error.into_response(),
    }
}

/// Apply the selection in `query` to a panel and return the redrawn panel.
///
/// Errors are returned as an alert for HTMX requests so the panel keeps
/// showing its last chart, and as an error page otherwise.
pub async fn get_panel(
    State(state): State<DashboardState>,
    HxRequest(is_htmx_request): HxRequest,
    Path((widget_id, panel)): Path<(String, usize)>,
    Query(query): Query<PanelQuery>,
) -> Response {
    let result = state.lock_dashboard().and_then(|mut dashboard| {
        render_panel(
            &mut dashboard,
            &widget_id,
            panel,
            query,
            OffsetDateTime::now_utc(),
        )
    });

    match result {
        Ok(markup) => markup.into_response(),
        Err(error) if is_htmx_request => error.into_alert_response(),
        Err(error) => error.into_response(),
    }
}

fn render_panel(
    dashboard: &mut Dashboard,
    widget_id: &str,
    index: usize,
    query: PanelQuery,
    now: OffsetDateTime,
) -> Result<Markup, Error> {
    let widget = dashboard.widget_mut(widget_id)?;

    if let Some(bucket) = query.bucket {
        let selection = Selection::new(bucket, query.value.unwrap_or_default());
        widget.select(index, selection, now)?;
    }

    let layout = widget.definition().layout;
    let panel = widget.panel(index)?;

    Ok(panel_view(widget.id(), layout, index, panel))
}

/// The chart spec a panel currently shows.
pub async fn get_panel_spec(
    State(state): State<DashboardState>,
    Path((widget_id, panel)): Path<(String, usize)>,
) -> Result<Json<ChartSpec>, Error> {
    let dashboard = state.lock_dashboard()?;
    let spec = dashboard.widget(&widget_id)?.panel(panel)?.spec().clone();

    Ok(Json(spec))
}

/// Re-fetch the visits and return the redrawn dashboard content.
pub async fn post_refresh(State(state): State<DashboardState>) -> Response {
    if let Err(error) = state.refresh().await {
        return error.into_alert_response();
    }

    match state.lock_dashboard() {
        Ok(dashboard) => dashboard_content(&dashboard).into_response(),
        Err(error) => error.into_alert_response(),
    }
}
