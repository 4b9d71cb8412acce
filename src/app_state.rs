//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use time::OffsetDateTime;

use crate::{
    Error,
    config::DashboardConfig,
    dashboard::{Dashboard, DashboardState},
    store::StoreBackend,
    timezone::local_date,
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "America/Bogota".
    pub local_timezone: String,

    /// The mounted widgets and their record cache.
    pub dashboard: Arc<Mutex<Dashboard>>,

    /// Where visits are fetched from.
    pub store: Arc<StoreBackend>,
}

impl AppState {
    /// Create a new [AppState] with every widget mounted and no records loaded.
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "America/Bogota".
    /// It decides which day, month and year the panels select when first shown.
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if `local_timezone` is not a known timezone.
    pub fn new(
        config: DashboardConfig,
        store: StoreBackend,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        let now = OffsetDateTime::now_utc();
        let today = local_date(local_timezone, now)?;
        let dashboard = Dashboard::mount(config, today, now);

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            dashboard: Arc::new(Mutex::new(dashboard)),
            store: Arc::new(store),
        })
    }

    /// Fetch the visits and loyalty points from the store and reload the dashboard.
    ///
    /// # Errors
    /// Returns the store error if the visits could not be fetched, in which
    /// case the dashboard keeps its previous records.
    pub async fn refresh(&self) -> Result<(), Error> {
        DashboardState::from_ref(self).refresh().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        Error,
        config::DashboardConfig,
        store::{MemoryStore, StoreBackend},
    };

    use super::AppState;

    #[test]
    fn rejects_unknown_timezone() {
        let result = AppState::new(
            DashboardConfig::default(),
            StoreBackend::Memory(MemoryStore::new()),
            "Not/AZone",
        );

        assert!(matches!(result, Err(Error::InvalidTimezoneError(_))));
    }

    #[tokio::test]
    async fn refresh_loads_collection() {
        let store = MemoryStore::with_collection(
            "DatosFidelizacion",
            vec![json!({
                "alice": {
                    "v1": { "fecha_inicio": { "seconds": 1_714_550_400, "nanoseconds": 0 } }
                }
            })],
        );
        let state = AppState::new(
            DashboardConfig::default(),
            StoreBackend::Memory(store),
            "America/Bogota",
        )
        .unwrap();

        state.refresh().await.unwrap();

        assert_eq!(state.dashboard.lock().unwrap().record_count(), 1);
    }
}
