//! Defines the endpoint for listing the caller's transactions a page at a time.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    db::lock_connection,
    extract::ApiQuery,
    pagination::PaginationConfig,
    transaction::{
        TransactionType,
        query::{TransactionPage, TransactionQuery, query_transactions},
    },
    user::UserID,
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls how to page transactions.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListParams {
    /// The 1-based page number.
    pub page: Option<u64>,
    /// The number of transactions per page.
    pub limit: Option<u64>,
    /// Only include transactions with this category.
    pub category: Option<String>,
    /// Only include debits or credits.
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

/// A route handler that returns one page of the caller's transactions, newest first.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Extension(user_id): Extension<UserID>,
    ApiQuery(params): ApiQuery<TransactionListParams>,
) -> Result<Json<TransactionPage>, Error> {
    let (page, page_size) = state
        .pagination_config
        .resolve(params.page, params.limit);
    let transaction_type = params
        .transaction_type
        .filter(|transaction_type| !transaction_type.is_empty())
        .map(|transaction_type| transaction_type.parse::<TransactionType>())
        .transpose()?;
    let query = TransactionQuery {
        category: params.category.filter(|category| !category.is_empty()),
        transaction_type,
        page,
        page_size,
    };

    let connection = lock_connection(&state.db_connection)?;

    query_transactions(user_id, &query, &connection)
        .inspect_err(|error| tracing::error!("could not list transactions: {error}"))
        .map(Json)
}
