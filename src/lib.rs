//! FinSecure is the backend of a personal finance dashboard.
//!
//! Every new transaction is scored for fraud before it is stored: behavioural
//! features are derived from the owner's transaction history, an optional
//! external scoring oracle is consulted, and the resulting verdict is saved
//! alongside the transaction. The same transaction history feeds spending
//! analytics and the dashboard summary.
//!
//! This library provides a JSON REST API over those operations.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod analytics;
mod app_state;
mod database_id;
mod db;
mod endpoints;
mod extract;
mod fraud;
mod identity;
mod logging;
mod pagination;
mod routing;
mod transaction;
mod user;

pub use analytics::{
    CategoryTotal, DashboardSummary, MonthlyTotal, SpendingSummary, get_dashboard_summary,
    get_spending_stats,
};
pub use app_state::AppState;
pub use database_id::TransactionId;
pub use db::initialize as initialize_db;
pub use fraud::{
    DEFAULT_ORACLE_TIMEOUT, FeatureVector, FraudScorer, FraudVerdict, HttpScoringOracle,
    OracleError, ScoringOracle, create_scored_transaction, extract_features,
    list_flagged_transactions, mark_legitimate,
};
pub use identity::USER_ID_HEADER;
pub use logging::logging_middleware;
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use transaction::{
    NewTransaction, Transaction, TransactionInput, TransactionPage, TransactionStatus,
    TransactionType, TransactionUpdate,
};
pub use user::{User, UserID, create_user, get_user_by_id};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
    /// A required field was missing or had an invalid value.
    ///
    /// The string is a message that is safe to show to the client.
    #[error("{0}")]
    Validation(String),

    /// The requested resource was not found.
    ///
    /// This is also returned when the resource exists but belongs to another
    /// user, so that clients cannot discover other users' data.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The request did not carry a valid caller identity.
    #[error("the request is missing a valid user identity")]
    MissingCallerIdentity,

    /// The HTTP client for the scoring oracle could not be built.
    #[error("could not build the scoring oracle client: {0}")]
    OracleClientError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Error::NotFound => (StatusCode::NOT_FOUND, "Not found".to_owned()),
            Error::MissingCallerIdentity => (
                StatusCode::UNAUTHORIZED,
                "User identity missing or invalid".to_owned(),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred, check the server logs for more details."
                        .to_owned(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
