//! Defines the endpoints for reading, updating and deleting a single transaction.
//!
//! All three respond with 404 when the transaction does not exist or belongs
//! to another user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    db::lock_connection,
    extract::ApiJson,
    transaction::{
        Transaction, TransactionUpdate,
        core::{delete_transaction, get_transaction, update_transaction},
    },
    user::UserID,
};

/// The state needed to get, update or delete a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns one of the caller's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(transaction_id, user_id, &connection).map(Json)
}

/// A route handler that updates the editable fields of one of the caller's transactions.
///
/// The fraud verdict cannot be changed here, see the mark legitimate endpoint.
pub async fn update_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    ApiJson(update): ApiJson<TransactionUpdate>,
) -> Result<Json<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_transaction(
        transaction_id,
        user_id,
        update,
        OffsetDateTime::now_utc(),
        &connection,
    )
    .map(Json)
}

/// A route handler that deletes one of the caller's transactions.
pub async fn delete_transaction_endpoint(
    State(state): State<EditTransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_transaction(transaction_id, user_id, &connection)?;
    tracing::info!("User {user_id} deleted transaction {transaction_id}");

    Ok(StatusCode::NO_CONTENT)
}
