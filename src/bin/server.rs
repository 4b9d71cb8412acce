use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use time::UtcOffset;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_dashboard::{
    AppState, DashboardConfig, build_router,
    config::{DEFAULT_COLLECTION, DEFAULT_POINTS_COLLECTION, parse_utc_offset},
    graceful_shutdown, logging_middleware,
    store::{JsonFileStore, StoreBackend},
};

/// The web server for the loyalty dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding one JSON export per collection, e.g. `DatosFidelizacion.json`.
    #[arg(long)]
    data_dir: PathBuf,

    /// The collection to read visits from.
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// The collection to read loyalty points from.
    #[arg(long, default_value = DEFAULT_POINTS_COLLECTION)]
    points_collection: String,

    /// The port to serve the dashboard from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical timezone used to pick today's date, e.g. "America/Bogota".
    #[arg(long, default_value = "America/Bogota")]
    timezone: String,

    /// The UTC offset payments are bucketed into days at.
    #[arg(long, default_value = "+00:00", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    payments_offset: UtcOffset,

    /// The UTC offset products and times of day are evaluated at.
    #[arg(long, default_value = "-05:00", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    local_offset: UtcOffset,

    /// File to write debug logs to.
    #[arg(long, default_value = "debug.log")]
    log_path: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_path);

    let config = DashboardConfig {
        collection: args.collection,
        points_collection: args.points_collection,
        payments_offset: args.payments_offset,
        local_offset: args.local_offset,
    };
    let store = StoreBackend::JsonFile(JsonFileStore::new(args.data_dir.clone()));

    let state = match AppState::new(config, store, &args.timezone) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not start the dashboard: {error}");
            return ExitCode::FAILURE;
        }
    };

    // The server still starts without data, a later refresh can fill the charts in.
    if let Err(error) = state.refresh().await {
        tracing::warn!(
            "Starting without visits from {}: {error}",
            args.data_dir.display()
        );
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state))
        .layer(middleware::from_fn(logging_middleware));

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn setup_logging(log_path: &Path) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
