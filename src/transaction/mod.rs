//! Transaction management for the fraud-aware finance dashboard.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model, the validated `NewTransaction` and the raw `TransactionInput`
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction REST API

mod core;
mod create_endpoint;
mod edit_endpoint;
mod list_endpoint;
mod query;

pub use core::{
    NewTransaction, Transaction, TransactionInput, TransactionStatus, TransactionType,
    TransactionUpdate, clear_fraud_verdict, count_flagged_transactions, create_transaction,
    create_transaction_table, get_flagged_transactions, get_recent_transactions,
};
pub use create_endpoint::create_transaction_endpoint;
pub use edit_endpoint::{
    delete_transaction_endpoint, get_transaction_endpoint, update_transaction_endpoint,
};
pub use list_endpoint::list_transactions_endpoint;
pub use query::TransactionPage;

#[cfg(test)]
pub use core::get_transaction;
