//! The API endpoints URIs.
//!
//! For panel endpoints, e.g., '/dashboard/widgets/{widget_id}/{panel}', use [format_panel_endpoint].

/// The root route which redirects to the dashboard.
pub const ROOT: &str = "/";
/// The dashboard page with every widget.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The HTML fragment for a single panel, re-rendered when its selection changes.
pub const DASHBOARD_PANEL: &str = "/dashboard/widgets/{widget_id}/{panel}";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route to re-fetch the visits and redraw every widget.
pub const REFRESH: &str = "/api/refresh";
/// The chart spec of a single panel as JSON.
pub const PANEL_SPEC: &str = "/api/widgets/{widget_id}/{panel}";

/// Replace the `{widget_id}` and `{panel}` parameters in `endpoint_path`.
///
/// Parameters that do not appear in `endpoint_path` are ignored.
pub fn format_panel_endpoint(endpoint_path: &str, widget_id: &str, panel: usize) -> String {
    endpoint_path
        .replace("{widget_id}", widget_id)
        .replace("{panel}", &panel.to_string())
}
