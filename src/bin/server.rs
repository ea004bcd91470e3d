use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finsecure::{
    AppState, FraudScorer, PaginationConfig, build_router, graceful_shutdown, logging_middleware,
};

/// The REST API server for FinSecure.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// The URL of the fraud scoring service. Transactions are not flagged if
    /// this is not set.
    #[arg(long, env = "FRAUD_ORACLE_URL")]
    oracle_url: Option<String>,

    /// How long to wait for the fraud scoring service, in milliseconds.
    #[arg(long, env = "FRAUD_ORACLE_TIMEOUT_MS", default_value_t = 3000)]
    oracle_timeout_ms: u64,

    /// The number of transactions per page when a client does not ask for a page size.
    #[arg(long, default_value_t = 10)]
    page_size: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let fraud_scorer = FraudScorer::from_endpoint(
        args.oracle_url.as_deref(),
        Duration::from_millis(args.oracle_timeout_ms),
    )
    .expect("Could not create the fraud scoring client.");

    if fraud_scorer.has_oracle() {
        tracing::info!("Scoring transactions with {:?}", args.oracle_url);
    } else {
        tracing::warn!("No fraud scoring service configured, transactions will not be flagged.");
    }

    let pagination_config = PaginationConfig {
        default_page_size: args.page_size,
        ..Default::default()
    };
    let state = AppState::new(conn, fraud_scorer, pagination_config)
        .expect("Could not initialize the database.");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state))
        .layer(middleware::from_fn(logging_middleware));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");

    tracing::info!("Server shut down.");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
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
        // Errors are already logged where they are handled.
        .on_failure(());

    router.layer(tracing_layer)
}
