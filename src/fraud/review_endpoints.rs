//! Route handlers for reviewing flagged transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    fraud::{list_flagged_transactions, mark_legitimate},
    transaction::Transaction,
    user::UserID,
};

/// The state needed to review flagged transactions.
#[derive(Debug, Clone)]
pub struct ReviewState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReviewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that lists the caller's flagged transactions, most suspicious first.
pub async fn get_flagged_transactions_endpoint(
    State(state): State<ReviewState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_flagged_transactions(user_id, &connection)
        .inspect_err(|error| tracing::error!("could not get flagged transactions: {error}"))
        .map(Json)
}

/// A route handler that clears the fraud flag on one of the caller's transactions.
///
/// Responds with 404 if the transaction does not exist or belongs to someone else.
pub async fn mark_legitimate_endpoint(
    State(state): State<ReviewState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    mark_legitimate(
        transaction_id,
        user_id,
        OffsetDateTime::now_utc(),
        &connection,
    )
    .map(Json)
}
