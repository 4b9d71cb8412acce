//! Loyalty dashboard is a web app that charts loyalty-program visits.
//!
//! Visits are read from a document store, normalized into typed records,
//! filtered by day, month or year, aggregated by payment method, user,
//! product and time of day, and served as ECharts charts in HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

pub mod aggregation;
mod app_state;
pub mod chart;
pub mod config;
pub mod dashboard;
mod endpoints;
pub mod filter;
mod html;
mod logging;
pub mod record;
mod routing;
pub mod store;
mod timezone;
pub mod widget;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use timezone::get_local_offset;

use crate::{filter::BucketKind, html::error_view};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install the terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A non-empty selector that does not parse for its bucket kind, e.g.
    /// `2024-13` for a month.
    #[error("\"{value}\" is not a valid {bucket} selection")]
    InvalidSelection {
        /// The bucket kind the value was entered for.
        bucket: BucketKind,
        /// The value as entered.
        value: String,
    },

    /// The document store could not provide a collection.
    ///
    /// The string describes the failure for the server logs.
    #[error("could not fetch documents: {0}")]
    Store(String),

    /// Reading from disk failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A document export was not valid JSON, or not a collection of documents.
    #[error("could not parse documents as JSON: {0}")]
    Json(String),

    /// A collection name that is empty or contains characters other than
    /// ASCII letters, digits, `-` and `_`.
    #[error("invalid collection name \"{0}\"")]
    InvalidCollectionName(String),

    /// No widget with the given ID is mounted.
    #[error("there is no widget \"{0}\"")]
    UnknownWidget(String),

    /// The widget has no panel with the given index.
    #[error("widget \"{widget}\" has no panel {panel}")]
    UnknownPanel {
        /// The widget ID.
        widget: String,
        /// The requested panel index.
        panel: usize,
    },

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A UTC offset that is not of the form `+HH:MM` or `-HH:MM`.
    #[error("invalid UTC offset \"{0}\", expected e.g. -05:00")]
    InvalidOffset(String),

    /// Could not acquire the dashboard lock.
    #[error("could not acquire the dashboard lock")]
    DashboardLockError,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value.to_string())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidSelection { .. } => StatusCode::BAD_REQUEST,
            Error::UnknownWidget(_) | Error::UnknownPanel { .. } => StatusCode::NOT_FOUND,
            Error::Store(_) | Error::Io(_) | Error::Json(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short title and a hint on how to fix the error, safe to show to the client.
    fn user_message(&self) -> (&'static str, String) {
        match self {
            Error::InvalidSelection { bucket, value } => (
                "Invalid selection",
                format!(
                    "\"{value}\" is not a valid {bucket}. Pick a {bucket} with the date picker."
                ),
            ),
            Error::UnknownWidget(_) | Error::UnknownPanel { .. } => (
                "Chart not found",
                "The chart could not be found. Try reloading the dashboard.".to_owned(),
            ),
            Error::Store(_) | Error::Io(_) | Error::Json(_) => (
                "Could not load data",
                "The loyalty data could not be fetched. The charts still show the last data \
                that was loaded."
                    .to_owned(),
            ),
            Error::InvalidTimezoneError(timezone) => (
                "Invalid Timezone Settings",
                format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            ),
            _ => (
                "Something went wrong",
                "An unexpected error occurred, check the server logs for more details.".to_owned(),
            ),
        }
    }

    /// Render the error as an alert fragment for HTMX requests.
    pub(crate) fn into_alert_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("{self}");
        }

        let (message, details) = self.user_message();

        (status_code, Html(html::alert_view(message, &details).into_string())).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("An unexpected error occurred: {self}");
        }

        let (description, fix) = self.user_message();
        let header = status_code.as_str();

        (
            status_code,
            Html(error_view(description, header, description, &fix).into_string()),
        )
            .into_response()
    }
}
