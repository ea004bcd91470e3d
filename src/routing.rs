//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use serde_json::json;

use crate::{
    AppState, Error,
    analytics::{get_dashboard_summary_endpoint, get_spending_stats_endpoint},
    endpoints,
    fraud::{get_flagged_transactions_endpoint, mark_legitimate_endpoint},
    identity::identity_guard,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new().route(endpoints::HEALTH, get(get_health));

    let protected_routes = Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION_STATS,
            get(get_spending_stats_endpoint),
        )
        .route(
            endpoints::FLAGGED_TRANSACTIONS,
            get(get_flagged_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::MARK_LEGITIMATE, patch(mark_legitimate_endpoint))
        .route(
            endpoints::DASHBOARD_SUMMARY,
            get(get_dashboard_summary_endpoint),
        )
        .layer(middleware::from_fn(identity_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Report that the server is up.
async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
