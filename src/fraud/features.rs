//! Derives the behavioural features used to score a candidate transaction.
//!
//! Features are computed from the owner's stored transactions only. The
//! candidate itself is never part of its own history, so extraction must
//! happen before the candidate is stored.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, transaction::NewTransaction, user::UserID};

/// The number of most recent transactions used to compute the typical amount.
const RECENT_HISTORY_SIZE: i64 = 20;

/// How far back to look when counting transactions for the velocity feature.
const VELOCITY_WINDOW: Duration = Duration::minutes(60);

/// The number of buckets categories are hashed into.
const CATEGORY_BUCKETS: u32 = 10;

/// The numeric summary of a candidate transaction in the context of its
/// owner's history.
///
/// The serialized field names are the names the scoring model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// The candidate's amount.
    pub amount: f64,
    /// The hour of the day (UTC, 0-23) the candidate was submitted.
    pub hour: u8,
    /// The candidate's category hashed into a bucket from 0 to 9.
    #[serde(rename = "category")]
    pub category_code: u32,
    /// How many of the owner's transactions were with the same merchant.
    pub merchant_freq: u32,
    /// How far the amount is from the mean of the owner's recent amounts.
    pub amount_deviation: f64,
    /// How many transactions the owner made in the hour before submission.
    pub velocity: u32,
}

/// Derive the features for `candidate`, submitted by `owner` at `now`.
///
/// Missing history is not an error: a user without transactions gets zero
/// for the deviation, merchant frequency and velocity.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn extract_features(
    owner: UserID,
    candidate: &NewTransaction,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<FeatureVector, Error> {
    let recent_amounts = get_recent_amounts(owner, connection)?;
    let merchant_freq = match candidate.merchant.as_deref() {
        Some(merchant) if !merchant.is_empty() => count_by_merchant(owner, merchant, connection)?,
        _ => 0,
    };
    let velocity = count_created_between(owner, now - VELOCITY_WINDOW, now, connection)?;

    Ok(FeatureVector {
        amount: candidate.amount,
        hour: now.hour(),
        category_code: category_code(&candidate.category),
        merchant_freq,
        amount_deviation: amount_deviation(candidate.amount, &recent_amounts),
        velocity,
    })
}

/// Hash `category` into one of ten buckets.
///
/// Uses the 31-based polynomial string hash over UTF-16 code units with 32-bit
/// wrapping, so a label always lands in the same bucket. An empty label is
/// bucket 0.
pub fn category_code(category: &str) -> u32 {
    let hash = category.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });

    hash.unsigned_abs() % CATEGORY_BUCKETS
}

/// The absolute difference between `amount` and the mean of `history`.
///
/// With no history the mean is taken to be `amount` itself.
fn amount_deviation(amount: f64, history: &[f64]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }

    let mean = history.iter().sum::<f64>() / history.len() as f64;

    (amount - mean).abs()
}

fn get_recent_amounts(owner: UserID, connection: &Connection) -> Result<Vec<f64>, Error> {
    connection
        .prepare(
            "SELECT amount FROM \"transaction\"
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?
        .query_map((owner.as_i64(), RECENT_HISTORY_SIZE), |row| row.get(0))?
        .collect::<Result<Vec<f64>, rusqlite::Error>>()
        .map_err(|error| error.into())
}

fn count_by_merchant(owner: UserID, merchant: &str, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1 AND merchant = ?2",
            (owner.as_i64(), merchant),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn count_created_between(
    owner: UserID,
    start: OffsetDateTime,
    end: OffsetDateTime,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\"
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at <= ?3",
            (owner.as_i64(), start, end),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        db::initialize,
        fraud::{
            FraudVerdict,
            features::{amount_deviation, category_code, extract_features},
        },
        transaction::{NewTransaction, TransactionType, create_transaction},
        user::{UserID, create_user},
    };

    const NOW: OffsetDateTime = datetime!(2025-10-05 14:30 UTC);

    fn get_test_connection() -> (Connection, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let owner = create_user("Owner", "owner@example.com", 0.0, &conn)
            .unwrap()
            .id;
        (conn, owner)
    }

    fn store(owner: UserID, transaction: NewTransaction, at: OffsetDateTime, conn: &Connection) {
        create_transaction(owner, transaction, FraudVerdict::default(), at, conn).unwrap();
    }

    fn candidate(amount: f64) -> NewTransaction {
        NewTransaction::build(amount, "groceries", TransactionType::Debit).merchant("Whole Foods")
    }

    #[test]
    fn category_code_is_in_range_and_stable() {
        let categories = [
            "groceries",
            "transport",
            "shopping",
            "bills",
            "entertainment",
            "healthcare",
            "salary",
            "other",
            "a much longer category label that will overflow the hash",
            "café ☕",
        ];

        for category in categories {
            let code = category_code(category);
            assert!(code < 10, "{category} hashed to {code}");
            assert_eq!(code, category_code(category));
        }
    }

    #[test]
    fn category_code_matches_known_values() {
        // "a" is 97, "ab" is 97 * 31 + 98 = 3105.
        assert_eq!(category_code("a"), 7);
        assert_eq!(category_code("ab"), 5);
    }

    #[test]
    fn empty_category_is_bucket_zero() {
        assert_eq!(category_code(""), 0);
    }

    #[test]
    fn empty_history_gives_zero_features() {
        let (conn, owner) = get_test_connection();

        let features = extract_features(owner, &candidate(50.0), NOW, &conn).unwrap();

        assert_eq!(features.amount, 50.0);
        assert_eq!(features.amount_deviation, 0.0);
        assert_eq!(features.merchant_freq, 0);
        assert_eq!(features.velocity, 0);
    }

    #[test]
    fn hour_comes_from_submission_time() {
        let (conn, owner) = get_test_connection();

        let features = extract_features(owner, &candidate(50.0), NOW, &conn).unwrap();

        assert_eq!(features.hour, 14);
    }

    #[test]
    fn deviation_uses_twenty_most_recent_transactions() {
        let (conn, owner) = get_test_connection();
        // An old outlier that falls outside the 20 most recent transactions.
        store(owner, candidate(10_000.0), NOW - Duration::days(30), &conn);
        for i in 0..20 {
            store(owner, candidate(100.0), NOW - Duration::days(i), &conn);
        }

        let features = extract_features(owner, &candidate(130.0), NOW, &conn).unwrap();

        assert_eq!(features.amount_deviation, 30.0);
    }

    #[test]
    fn deviation_is_absolute() {
        assert_eq!(amount_deviation(10.0, &[20.0, 40.0]), 20.0);
        assert_eq!(amount_deviation(50.0, &[20.0, 40.0]), 20.0);
        assert_eq!(amount_deviation(42.0, &[]), 0.0);
    }

    #[test]
    fn merchant_frequency_counts_same_merchant() {
        let (conn, owner) = get_test_connection();
        store(owner, candidate(1.0), NOW - Duration::days(3), &conn);
        store(owner, candidate(2.0), NOW - Duration::days(2), &conn);
        store(
            owner,
            NewTransaction::build(3.0, "transport", TransactionType::Debit).merchant("Uber"),
            NOW - Duration::days(1),
            &conn,
        );

        let features = extract_features(owner, &candidate(5.0), NOW, &conn).unwrap();

        assert_eq!(features.merchant_freq, 2);
    }

    #[test]
    fn missing_merchant_has_zero_frequency() {
        let (conn, owner) = get_test_connection();
        store(owner, candidate(1.0), NOW - Duration::days(1), &conn);

        let no_merchant = NewTransaction::build(5.0, "groceries", TransactionType::Debit);
        let features = extract_features(owner, &no_merchant, NOW, &conn).unwrap();

        assert_eq!(features.merchant_freq, 0);
    }

    #[test]
    fn velocity_counts_all_transactions_in_the_last_hour() {
        let (conn, owner) = get_test_connection();
        for i in 0..25 {
            store(owner, candidate(10.0), NOW - Duration::minutes(i * 2), &conn);
        }
        store(owner, candidate(10.0), NOW - Duration::minutes(61), &conn);

        let features = extract_features(owner, &candidate(10.0), NOW, &conn).unwrap();

        assert_eq!(features.velocity, 25);
    }

    #[test]
    fn ignores_other_users_history() {
        let (conn, owner) = get_test_connection();
        let other = create_user("Other", "other@example.com", 0.0, &conn)
            .unwrap()
            .id;
        store(other, candidate(1_000.0), NOW - Duration::minutes(5), &conn);

        let features = extract_features(owner, &candidate(10.0), NOW, &conn).unwrap();

        assert_eq!(features.amount_deviation, 0.0);
        assert_eq!(features.merchant_freq, 0);
        assert_eq!(features.velocity, 0);
    }

    #[test]
    fn serializes_with_model_field_names() {
        let features = super::FeatureVector {
            amount: 12.5,
            hour: 3,
            category_code: 7,
            merchant_freq: 2,
            amount_deviation: 1.5,
            velocity: 4,
        };

        let json = serde_json::to_value(&features).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "amount": 12.5,
                "hour": 3,
                "category": 7,
                "merchant_freq": 2,
                "amount_deviation": 1.5,
                "velocity": 4,
            })
        );
    }
}
