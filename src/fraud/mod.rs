//! Fraud scoring for new transactions and the review of flagged ones.
//!
//! This module contains:
//! - The feature extractor that summarises a transaction against its owner's history
//! - The scoring oracle abstraction and its fail-open adapter
//! - The pipeline that scores and stores new transactions
//! - Route handlers for reviewing flagged transactions

mod features;
mod oracle;
mod pipeline;
mod review_endpoints;

pub use features::{FeatureVector, extract_features};
pub use oracle::{
    DEFAULT_ORACLE_TIMEOUT, FraudScorer, FraudVerdict, HttpScoringOracle, OracleError,
    ScoringOracle,
};
pub use pipeline::{create_scored_transaction, list_flagged_transactions, mark_legitimate};
pub use review_endpoints::{get_flagged_transactions_endpoint, mark_legitimate_endpoint};
