//! Defines the endpoint for creating a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    extract::ApiJson,
    fraud::{FraudScorer, create_scored_transaction},
    transaction::TransactionInput,
    user::UserID,
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Scores new transactions for fraud.
    pub fraud_scorer: FraudScorer,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            fraud_scorer: state.fraud_scorer.clone(),
        }
    }
}

/// A route handler for creating a new transaction.
///
/// The transaction is scored for fraud before it is stored. Responds with
/// 201 and the stored transaction on success, or 400 if a required field is
/// missing or invalid.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(input): ApiJson<TransactionInput>,
) -> Result<Response, Error> {
    let transaction = create_scored_transaction(
        user_id,
        input,
        &state.fraud_scorer,
        &state.db_connection,
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Transaction created successfully",
            "transaction": transaction,
        })),
    )
        .into_response())
}
