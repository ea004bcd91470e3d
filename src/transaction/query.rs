//! Paginated, filtered listing of a user's transactions.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    transaction::{
        Transaction, TransactionType,
        core::{TRANSACTION_COLUMNS, map_transaction_row},
    },
    user::UserID,
};

/// Which page of transactions to fetch and how to filter them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    /// Only include transactions with exactly this category.
    pub category: Option<String>,
    /// Only include transactions of this type.
    pub transaction_type: Option<TransactionType>,
    /// The 1-based page number.
    pub page: u64,
    /// The number of transactions per page, at least one.
    pub page_size: u64,
}

/// One page of a user's transactions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    /// The number of transactions matching the filters across all pages.
    pub total_transactions: u64,
    /// The 1-based page number of this page.
    pub current_page: u64,
    /// The number of pages needed to show every matching transaction.
    pub total_pages: u64,
    /// The transactions on this page.
    pub transactions: Vec<Transaction>,
}

/// Get one page of `owner`'s transactions matching the filters in `query`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn query_transactions(
    owner: UserID,
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let page = query.page.max(1);
    let page_size = query.page_size.max(1);
    let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
    let offset = i64::try_from(page - 1)
        .unwrap_or(i64::MAX)
        .saturating_mul(limit);
    let category = query.category.as_deref();

    let total_transactions: u32 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\"
         WHERE user_id = ?1
            AND (?2 IS NULL OR category = ?2)
            AND (?3 IS NULL OR type = ?3)",
        (owner.as_i64(), category, query.transaction_type),
        |row| row.get(0),
    )?;

    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1
                AND (?2 IS NULL OR category = ?2)
                AND (?3 IS NULL OR type = ?3)
             ORDER BY created_at DESC, id DESC
             LIMIT ?4 OFFSET ?5"
        ))?
        .query_map(
            (
                owner.as_i64(),
                category,
                query.transaction_type,
                limit,
                offset,
            ),
            map_transaction_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let total_transactions = u64::from(total_transactions);

    Ok(TransactionPage {
        total_transactions,
        current_page: page,
        total_pages: total_transactions.div_ceil(page_size),
        transactions,
    })
}
