//! The spending summary and the dashboard summary.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    analytics::{
        aggregation::{
            CategoryTotal, MonthlyTotal, monthly_totals, total_spent, totals_by_category,
            trend_window_start,
        },
        history::get_debits,
    },
    transaction::{Transaction, count_flagged_transactions, get_recent_transactions},
    user::{UserID, get_user_by_id},
};

/// How many transactions the dashboard summary shows.
const RECENT_TRANSACTION_COUNT: u32 = 5;

/// Where a user's money went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSummary {
    /// The sum of all debits ever made.
    pub total_spent: f64,
    /// Debit totals per category, sorted by category.
    pub spending_by_category: Vec<CategoryTotal>,
    /// Debit totals per calendar month over the last six months, oldest first.
    pub monthly_spending: Vec<MonthlyTotal>,
}

/// What the user sees first on their dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// The user's account balance as stored on their user record.
    pub balance: f64,
    /// The most recently created transactions, newest first.
    pub recent_transactions: Vec<Transaction>,
    /// How many of the user's transactions are currently flagged as fraudulent.
    pub fraud_alert_count: u32,
}

/// Summarise the debits of `owner` as of `now`.
///
/// Only debits count as spending. Categories and months without debits are
/// left out.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_spending_stats(
    owner: UserID,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<SpendingSummary, Error> {
    let debits = get_debits(owner, connection)?;

    Ok(SpendingSummary {
        total_spent: total_spent(&debits),
        spending_by_category: totals_by_category(&debits),
        monthly_spending: monthly_totals(&debits, trend_window_start(now)..=now),
    })
}

/// Get the balance, latest transactions and fraud alert count of `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `owner` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_dashboard_summary(
    owner: UserID,
    connection: &Connection,
) -> Result<DashboardSummary, Error> {
    let user = get_user_by_id(owner, connection)?;

    Ok(DashboardSummary {
        balance: user.account_balance,
        recent_transactions: get_recent_transactions(owner, RECENT_TRANSACTION_COUNT, connection)?,
        fraud_alert_count: count_flagged_transactions(owner, connection)?,
    })
}
