//! Database queries for the debit history behind the spending summary.
//!
//! This module provides a slimmed down view of a transaction that only
//! carries the fields needed for aggregation (amount, category, creation time).

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{Error, transaction::TransactionType, user::UserID};

/// A debit as seen by the spending aggregations.
#[derive(Debug)]
pub(super) struct Debit {
    pub amount: f64,
    pub category: String,
    pub created_at: OffsetDateTime,
}

/// Gets every debit of `owner`, oldest first.
///
/// # Errors
/// Returns [Error::SqlError] if the query could not be prepared or executed.
pub(super) fn get_debits(owner: UserID, connection: &Connection) -> Result<Vec<Debit>, Error> {
    connection
        .prepare(
            "SELECT amount, category, created_at FROM \"transaction\"
             WHERE user_id = ?1 AND type = ?2
             ORDER BY created_at ASC, id ASC",
        )?
        .query_map((owner.as_i64(), TransactionType::Debit), |row| {
            Ok(Debit {
                amount: row.get(0)?,
                category: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<Debit>, rusqlite::Error>>()
        .map_err(|error| error.into())
}
