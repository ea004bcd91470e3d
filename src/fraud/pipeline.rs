//! Creates scored transactions and handles the review of flagged ones.
//!
//! A transaction moves through these states:
//!
//! ```text
//! unscored --create--> clean
//! unscored --create--> flagged --mark legitimate--> clean
//! ```
//!
//! Only creation can flag a transaction. Marking a transaction as legitimate
//! resets its verdict to the default and nothing flags it again afterwards.

use std::sync::Mutex;

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    db::lock_connection,
    fraud::{FraudScorer, extract_features},
    transaction::{
        Transaction, TransactionInput, clear_fraud_verdict, create_transaction,
        get_flagged_transactions,
    },
    user::UserID,
};

/// Validate `input`, score it against `owner`'s history and store it.
///
/// The database lock is released while the oracle is consulted, so
/// concurrent creations for the same owner may see slightly different
/// histories.
///
/// # Errors
/// This function will return a:
/// - [Error::Validation] if `input` is missing a required field or has an
///   invalid type or amount, in which case nothing is scored or stored,
/// - [Error::DatabaseLockError] if the database lock is poisoned,
/// - or [Error::SqlError] if there is an SQL error.
///
/// Oracle failures are never returned, see [FraudScorer::score].
pub async fn create_scored_transaction(
    owner: UserID,
    input: TransactionInput,
    scorer: &FraudScorer,
    db_connection: &Mutex<Connection>,
    now: OffsetDateTime,
) -> Result<Transaction, Error> {
    let transaction = input.validate()?;

    let features = {
        let connection = lock_connection(db_connection)?;
        extract_features(owner, &transaction, now, &connection)?
    };
    tracing::debug!("Extracted features for user {owner}: {features:?}");

    let verdict = scorer.score(&features).await;

    let connection = lock_connection(db_connection)?;
    let transaction = create_transaction(owner, transaction, verdict, now, &connection)?;

    if transaction.is_fraudulent {
        tracing::info!(
            "Transaction {} for user {owner} was flagged with a fraud score of {}",
            transaction.id,
            transaction.fraud_score
        );
    }

    Ok(transaction)
}

/// Get `owner`'s flagged transactions, most suspicious first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_flagged_transactions(
    owner: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    get_flagged_transactions(owner, connection)
}

/// Mark the transaction `id` as legitimate, clearing its fraud flag and score.
///
/// Marking an already legitimate transaction succeeds without changing the
/// verdict.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the transaction does not exist or is not owned by
///   `owner`,
/// - or [Error::SqlError] if there is an SQL error.
pub fn mark_legitimate(
    id: TransactionId,
    owner: UserID,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = clear_fraud_verdict(id, owner, now, connection)?;
    tracing::info!("User {owner} marked transaction {id} as legitimate");

    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration as StdDuration,
    };

    use async_trait::async_trait;
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        db::initialize,
        fraud::{
            FeatureVector, FraudScorer, FraudVerdict, OracleError, ScoringOracle,
            pipeline::{create_scored_transaction, list_flagged_transactions, mark_legitimate},
        },
        transaction::{TransactionInput, TransactionStatus, TransactionType, get_transaction},
        user::{UserID, create_user},
    };

    const NOW: OffsetDateTime = datetime!(2025-10-05 23:15 UTC);

    /// Flags everything above `threshold` and records the features it was asked about.
    #[derive(Debug, Default)]
    struct ThresholdOracle {
        threshold: f64,
        seen: Mutex<Vec<FeatureVector>>,
    }

    #[async_trait]
    impl ScoringOracle for ThresholdOracle {
        async fn score(&self, features: &FeatureVector) -> Result<FraudVerdict, OracleError> {
            self.seen.lock().unwrap().push(features.clone());
            let is_fraudulent = features.amount > self.threshold;

            Ok(FraudVerdict {
                is_fraudulent,
                fraud_score: if is_fraudulent { 92.0 } else { 8.0 },
            })
        }
    }

    fn get_test_db() -> (Mutex<Connection>, UserID, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let owner = create_user("Owner", "owner@example.com", 0.0, &conn)
            .unwrap()
            .id;
        let other = create_user("Other", "other@example.com", 0.0, &conn)
            .unwrap()
            .id;
        (Mutex::new(conn), owner, other)
    }

    fn input(amount: f64) -> TransactionInput {
        TransactionInput {
            amount: Some(amount),
            category: Some("shopping".to_owned()),
            transaction_type: Some("debit".to_owned()),
            description: Some("Amazon purchase".to_owned()),
            merchant: Some("Amazon".to_owned()),
            location: Some("Seattle".to_owned()),
        }
    }

    fn threshold_scorer(threshold: f64) -> (FraudScorer, Arc<ThresholdOracle>) {
        let oracle = Arc::new(ThresholdOracle {
            threshold,
            ..Default::default()
        });
        let scorer = FraudScorer::new(oracle.clone(), StdDuration::from_secs(1));
        (scorer, oracle)
    }

    #[tokio::test]
    async fn no_oracle_gives_default_verdict() {
        let (db, owner, _) = get_test_db();
        let scorer = FraudScorer::disabled();

        for amount in [1.0, 500.0, 99_999.0] {
            let transaction = create_scored_transaction(owner, input(amount), &scorer, &db, NOW)
                .await
                .unwrap();

            assert!(!transaction.is_fraudulent);
            assert_eq!(transaction.fraud_score, 0.0);
            assert_eq!(transaction.status, TransactionStatus::Completed);
            assert_eq!(transaction.user_id, owner);
        }
    }

    #[tokio::test]
    async fn stores_oracle_verdict() {
        let (db, owner, _) = get_test_db();
        let (scorer, _) = threshold_scorer(1_000.0);

        let clean = create_scored_transaction(owner, input(20.0), &scorer, &db, NOW)
            .await
            .unwrap();
        let flagged = create_scored_transaction(owner, input(4_000.0), &scorer, &db, NOW)
            .await
            .unwrap();

        assert!(!clean.is_fraudulent);
        assert_eq!(clean.fraud_score, 8.0);
        assert!(flagged.is_fraudulent);
        assert_eq!(flagged.fraud_score, 92.0);

        let stored = get_transaction(flagged.id, owner, &db.lock().unwrap()).unwrap();
        assert_eq!(stored, flagged);
    }

    /// Answers with a fixed score regardless of the features.
    #[derive(Debug)]
    struct RawScoreOracle(f64);

    #[async_trait]
    impl ScoringOracle for RawScoreOracle {
        async fn score(&self, _: &FeatureVector) -> Result<FraudVerdict, OracleError> {
            Ok(FraudVerdict {
                is_fraudulent: true,
                fraud_score: self.0,
            })
        }
    }

    #[tokio::test]
    async fn stored_score_stays_in_range_for_any_oracle() {
        let (db, owner, _) = get_test_db();

        for (raw_score, want_fraudulent, want_score) in [
            (142.0, true, 100.0),
            (-5.0, true, 0.0),
            (f64::NAN, false, 0.0),
        ] {
            let scorer = FraudScorer::new(
                Arc::new(RawScoreOracle(raw_score)),
                StdDuration::from_secs(1),
            );

            let transaction = create_scored_transaction(owner, input(50.0), &scorer, &db, NOW)
                .await
                .unwrap();

            assert_eq!(transaction.is_fraudulent, want_fraudulent);
            assert_eq!(transaction.fraud_score, want_score);
            let stored = get_transaction(transaction.id, owner, &db.lock().unwrap()).unwrap();
            assert_eq!(stored.fraud_score, want_score);
        }
    }

    #[tokio::test]
    async fn features_exclude_the_candidate() {
        let (db, owner, _) = get_test_db();
        let (scorer, oracle) = threshold_scorer(1_000.0);

        create_scored_transaction(owner, input(100.0), &scorer, &db, NOW)
            .await
            .unwrap();
        create_scored_transaction(owner, input(300.0), &scorer, &db, NOW + Duration::minutes(1))
            .await
            .unwrap();

        let seen = oracle.seen.lock().unwrap();
        assert_eq!(seen[0].velocity, 0);
        assert_eq!(seen[0].merchant_freq, 0);
        assert_eq!(seen[0].amount_deviation, 0.0);
        assert_eq!(seen[0].hour, 23);
        assert_eq!(seen[1].velocity, 1);
        assert_eq!(seen[1].merchant_freq, 1);
        assert_eq!(seen[1].amount_deviation, 200.0);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_without_scoring_or_storing() {
        let (db, owner, _) = get_test_db();
        let (scorer, oracle) = threshold_scorer(1_000.0);

        let missing_amount = create_scored_transaction(
            owner,
            TransactionInput {
                amount: None,
                ..input(1.0)
            },
            &scorer,
            &db,
            NOW,
        )
        .await;
        let bad_type = create_scored_transaction(
            owner,
            TransactionInput {
                transaction_type: Some("transfer".to_owned()),
                ..input(1.0)
            },
            &scorer,
            &db,
            NOW,
        )
        .await;

        assert!(matches!(missing_amount, Err(Error::Validation(_))));
        assert!(matches!(bad_type, Err(Error::Validation(_))));
        assert!(oracle.seen.lock().unwrap().is_empty());
        let count: u32 = db
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn credit_transactions_are_scored_too() {
        let (db, owner, _) = get_test_db();
        let (scorer, oracle) = threshold_scorer(1_000.0);

        let transaction = create_scored_transaction(
            owner,
            TransactionInput {
                transaction_type: Some("credit".to_owned()),
                ..input(5_000.0)
            },
            &scorer,
            &db,
            NOW,
        )
        .await
        .unwrap();

        assert_eq!(transaction.transaction_type, TransactionType::Credit);
        assert!(transaction.is_fraudulent);
        assert_eq!(oracle.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_legitimate_clears_verdict_and_is_idempotent() {
        let (db, owner, _) = get_test_db();
        let (scorer, _) = threshold_scorer(1_000.0);
        let flagged = create_scored_transaction(owner, input(4_000.0), &scorer, &db, NOW)
            .await
            .unwrap();
        let conn = db.lock().unwrap();

        let first = mark_legitimate(flagged.id, owner, NOW, &conn).unwrap();
        let second = mark_legitimate(flagged.id, owner, NOW, &conn).unwrap();

        assert!(!first.is_fraudulent);
        assert_eq!(first.fraud_score, 0.0);
        assert_eq!(first, second);
        assert!(list_flagged_transactions(owner, &conn).unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_legitimate_on_other_users_transaction_is_not_found() {
        let (db, owner, other) = get_test_db();
        let (scorer, _) = threshold_scorer(1_000.0);
        let flagged = create_scored_transaction(owner, input(4_000.0), &scorer, &db, NOW)
            .await
            .unwrap();
        let conn = db.lock().unwrap();

        let foreign = mark_legitimate(flagged.id, other, NOW, &conn);
        let missing = mark_legitimate(flagged.id + 100, other, NOW, &conn);

        assert_eq!(foreign, Err(Error::NotFound));
        assert_eq!(foreign, missing);
        assert_eq!(list_flagged_transactions(owner, &conn).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn flagged_list_is_most_suspicious_first() {
        let (db, owner, _) = get_test_db();
        let (scorer, _) = threshold_scorer(1_000.0);
        let older = create_scored_transaction(owner, input(2_000.0), &scorer, &db, NOW)
            .await
            .unwrap();
        create_scored_transaction(owner, input(10.0), &scorer, &db, NOW)
            .await
            .unwrap();
        let newer = create_scored_transaction(
            owner,
            input(3_000.0),
            &scorer,
            &db,
            NOW + Duration::minutes(5),
        )
        .await
        .unwrap();

        let flagged = list_flagged_transactions(owner, &db.lock().unwrap()).unwrap();

        let ids: Vec<_> = flagged.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
