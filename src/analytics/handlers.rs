//! HTTP handlers for the spending summary and the dashboard summary.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    analytics::stats::{DashboardSummary, SpendingSummary, get_dashboard_summary, get_spending_stats},
    db::lock_connection,
    user::UserID,
};

/// The state needed for the analytics endpoints.
#[derive(Debug, Clone)]
pub struct AnalyticsState {
    /// The database connection for reading transactions and users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AnalyticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Returns the caller's spending summary as of now.
pub async fn get_spending_stats_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<SpendingSummary>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_spending_stats(user_id, OffsetDateTime::now_utc(), &connection)
        .inspect_err(|error| tracing::error!("could not compute spending stats: {error}"))
        .map(Json)
}

/// Returns the caller's balance, latest transactions and fraud alert count.
pub async fn get_dashboard_summary_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<DashboardSummary>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_dashboard_summary(user_id, &connection).map(Json)
}
