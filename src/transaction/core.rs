//! Defines the core data models and database queries for transactions.

use std::str::FromStr;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId, fraud::FraudVerdict, user::UserID};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money left (debit) or entered (credit) the user's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money spent.
    Debit,
    /// Money received.
    Credit,
}

impl TransactionType {
    /// The lowercase name used in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            _ => Err(Error::Validation(
                "Transaction type must be debit or credit".to_owned(),
            )),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// The processing state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// The transaction has not settled yet.
    Pending,
    /// The transaction has settled.
    Completed,
}

impl TransactionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A debit or credit belonging to exactly one user, along with the fraud
/// verdict it was given when it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// The amount of money spent or received, never negative.
    pub amount: f64,
    /// A free-form label such as "groceries".
    pub category: String,
    /// Whether the money was spent or received.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Who the money was paid to or received from.
    pub merchant: Option<String>,
    /// Where the transaction happened.
    pub location: Option<String>,
    /// Whether the transaction was flagged as fraudulent.
    pub is_fraudulent: bool,
    /// How likely the transaction is to be fraudulent, from 0 to 100.
    pub fraud_score: f64,
    /// The processing state of the transaction.
    pub status: TransactionStatus,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The unvalidated fields a client sends to create a transaction.
///
/// Call [TransactionInput::validate] to turn it into a [NewTransaction].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    /// The amount of money spent or received.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    /// The category label.
    pub category: Option<String>,
    /// Either "debit" or "credit".
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Who the money was paid to or received from.
    pub merchant: Option<String>,
    /// Where the transaction happened.
    pub location: Option<String>,
}

impl TransactionInput {
    /// Check that the required fields are present and valid.
    ///
    /// # Errors
    /// Returns an [Error::Validation] if the amount, category or type is
    /// missing, the amount is not a positive number, or the type is neither
    /// "debit" nor "credit".
    pub fn validate(self) -> Result<NewTransaction, Error> {
        let (Some(amount), Some(category), Some(transaction_type)) =
            (self.amount, self.category, self.transaction_type)
        else {
            return Err(required_fields_error());
        };

        if category.trim().is_empty() || amount == 0.0 {
            return Err(required_fields_error());
        }

        let amount = validate_amount(amount)?;
        let transaction_type = transaction_type.parse()?;

        Ok(NewTransaction {
            amount,
            category,
            transaction_type,
            description: self.description,
            merchant: self.merchant,
            location: self.location,
        })
    }
}

/// Accept an amount sent either as a JSON number or as numeric text.
///
/// Empty text counts as missing. Other text that is not a number becomes NaN,
/// which validation rejects.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    let amount = match Option::<RawAmount>::deserialize(deserializer)? {
        None => None,
        Some(RawAmount::Number(amount)) => Some(amount),
        Some(RawAmount::Text(text)) if text.trim().is_empty() => None,
        Some(RawAmount::Text(text)) => Some(text.trim().parse().unwrap_or(f64::NAN)),
    };

    Ok(amount)
}

fn required_fields_error() -> Error {
    Error::Validation("Amount, category, and type are required".to_owned())
}

fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::Validation(
            "Amount must be a positive number".to_owned(),
        ))
    }
}

/// A validated transaction that is ready to be scored and stored.
///
/// To create a new `NewTransaction`, use [NewTransaction::build] or
/// [TransactionInput::validate].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The amount of money spent or received.
    pub amount: f64,
    /// The category label.
    pub category: String,
    /// Whether the money was spent or received.
    pub transaction_type: TransactionType,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// Who the money was paid to or received from.
    pub merchant: Option<String>,
    /// Where the transaction happened.
    pub location: Option<String>,
}

impl NewTransaction {
    /// Create a new transaction with the required fields.
    pub fn build(amount: f64, category: &str, transaction_type: TransactionType) -> Self {
        Self {
            amount,
            category: category.to_owned(),
            transaction_type,
            description: None,
            merchant: None,
            location: None,
        }
    }

    /// Set the description for the transaction.
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Set the merchant for the transaction.
    pub fn merchant(mut self, merchant: &str) -> Self {
        self.merchant = Some(merchant.to_owned());
        self
    }

    /// Set the location for the transaction.
    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_owned());
        self
    }
}

/// The fields an owner may change on an existing transaction.
///
/// Fields set to `None` are left unchanged. Setting the description, merchant
/// or location to an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    /// The new amount.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    /// The new category label.
    pub category: Option<String>,
    /// The new direction, either "debit" or "credit".
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// The new description.
    pub description: Option<String>,
    /// The new merchant.
    pub merchant: Option<String>,
    /// The new location.
    pub location: Option<String>,
}

/// Resolve an optional text field of a [TransactionUpdate] against its current value.
fn updated_text(update: Option<String>, existing: Option<String>) -> Option<String> {
    match update {
        Some(text) if text.trim().is_empty() => None,
        Some(text) => Some(text),
        None => existing,
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, amount, category, type, description, merchant, \
    location, is_fraudulent, fraud_score, status, created_at, updated_at";

/// Store a new, already scored transaction for `owner`.
///
/// The transaction is stored as completed with `created_at` as both its
/// creation and modification time.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error,
/// e.g. `owner` does not refer to a user.
pub fn create_transaction(
    owner: UserID,
    transaction: NewTransaction,
    verdict: FraudVerdict,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, amount, category, type, description, merchant, \
                location, is_fraudulent, fraud_score, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                owner.as_i64(),
                transaction.amount,
                transaction.category,
                transaction.transaction_type,
                transaction.description,
                transaction.merchant,
                transaction.location,
                verdict.is_fraudulent,
                verdict.fraud_score,
                TransactionStatus::Completed,
                created_at,
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the transaction `id` if it belongs to `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    owner: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, owner.as_i64()), map_transaction_row)
        .map_err(|error| error.into())
}

/// Apply `update` to the transaction `id` owned by `owner`.
///
/// The fraud verdict, status and creation time are never changed here.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `owner`,
/// - [Error::Validation] if the new amount, category or type is invalid,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    owner: UserID,
    update: TransactionUpdate,
    updated_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let existing = get_transaction(id, owner, connection)?;

    let amount = match update.amount {
        Some(amount) => validate_amount(amount)?,
        None => existing.amount,
    };
    let category = match update.category {
        Some(category) if category.trim().is_empty() => {
            return Err(Error::Validation("Category cannot be empty".to_owned()));
        }
        Some(category) => category,
        None => existing.category,
    };
    let transaction_type = match update.transaction_type {
        Some(transaction_type) => transaction_type.parse()?,
        None => existing.transaction_type,
    };

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET amount = ?1, category = ?2, type = ?3, description = ?4, merchant = ?5,
                location = ?6, updated_at = ?7
             WHERE id = ?8 AND user_id = ?9
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                amount,
                category,
                transaction_type,
                updated_text(update.description, existing.description),
                updated_text(update.merchant, existing.merchant),
                updated_text(update.location, existing.location),
                updated_at,
                id,
                owner.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Delete the transaction `id` owned by `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    owner: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, owner.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Get the `limit` most recently created transactions of `owner`, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_recent_transactions(
    owner: UserID,
    limit: u32,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        ))?
        .query_map((owner.as_i64(), limit), map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.into())
}

/// Get all of `owner`'s flagged transactions.
///
/// The most suspicious transactions come first. Transactions with the same
/// score are ordered newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_flagged_transactions(
    owner: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1 AND is_fraudulent = 1
             ORDER BY fraud_score DESC, created_at DESC, id DESC"
        ))?
        .query_map((owner.as_i64(),), map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.into())
}

/// Count `owner`'s flagged transactions.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn count_flagged_transactions(owner: UserID, connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1 AND is_fraudulent = 1",
            (owner.as_i64(),),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Reset the fraud verdict of the transaction `id` owned by `owner` to not
/// fraudulent with a score of zero.
///
/// Clearing an already clear transaction returns it unchanged, `updated_at`
/// included.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn clear_fraud_verdict(
    id: TransactionId,
    owner: UserID,
    updated_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let cleared = FraudVerdict::default();
    let existing = get_transaction(id, owner, connection)?;

    if existing.is_fraudulent == cleared.is_fraudulent
        && existing.fraud_score == cleared.fraud_score
    {
        return Ok(existing);
    }

    connection
        .prepare(&format!(
            "UPDATE \"transaction\" SET is_fraudulent = ?1, fraud_score = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                cleared.is_fraudulent,
                cleared.fraud_score,
                updated_at,
                id,
                owner.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                category TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('debit', 'credit')),
                description TEXT,
                merchant TEXT,
                location TEXT,
                is_fraudulent INTEGER NOT NULL DEFAULT 0,
                fraud_score REAL NOT NULL DEFAULT 0 CHECK (fraud_score BETWEEN 0 AND 100),
                status TEXT NOT NULL DEFAULT 'completed' CHECK (status IN ('pending', 'completed')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Used by the feature extractor and the dashboard, which scan one user's history by time.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_created
            ON \"transaction\"(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// The row must contain the columns in the order of `TRANSACTION_COLUMNS`.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        amount: row.get(2)?,
        category: row.get(3)?,
        transaction_type: row.get(4)?,
        description: row.get(5)?,
        merchant: row.get(6)?,
        location: row.get(7)?,
        is_fraudulent: row.get(8)?,
        fraud_score: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod input_tests {
    use serde_json::json;

    use crate::{
        Error,
        transaction::{TransactionInput, TransactionType},
    };

    fn valid_input() -> TransactionInput {
        TransactionInput {
            amount: Some(12.5),
            category: Some("groceries".to_owned()),
            transaction_type: Some("debit".to_owned()),
            description: None,
            merchant: Some("Whole Foods".to_owned()),
            location: None,
        }
    }

    #[test]
    fn valid_input_passes() {
        let transaction = valid_input().validate().unwrap();

        assert_eq!(transaction.amount, 12.5);
        assert_eq!(transaction.category, "groceries");
        assert_eq!(transaction.transaction_type, TransactionType::Debit);
        assert_eq!(transaction.merchant.as_deref(), Some("Whole Foods"));
    }

    #[test]
    fn missing_fields_fail() {
        let cases = [
            TransactionInput {
                amount: None,
                ..valid_input()
            },
            TransactionInput {
                category: None,
                ..valid_input()
            },
            TransactionInput {
                transaction_type: None,
                ..valid_input()
            },
            TransactionInput {
                category: Some("  ".to_owned()),
                ..valid_input()
            },
            TransactionInput {
                amount: Some(0.0),
                ..valid_input()
            },
        ];

        for input in cases {
            assert_eq!(
                input.clone().validate(),
                Err(Error::Validation(
                    "Amount, category, and type are required".to_owned()
                )),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn invalid_type_fails() {
        let input = TransactionInput {
            transaction_type: Some("refund".to_owned()),
            ..valid_input()
        };

        assert_eq!(
            input.validate(),
            Err(Error::Validation(
                "Transaction type must be debit or credit".to_owned()
            ))
        );
    }

    #[test]
    fn negative_amount_fails() {
        let input = TransactionInput {
            amount: Some(-3.0),
            ..valid_input()
        };

        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn amount_may_be_numeric_text() {
        let parse = |amount: serde_json::Value| {
            serde_json::from_value::<TransactionInput>(
                json!({ "amount": amount, "category": "food", "type": "debit" }),
            )
            .unwrap()
            .amount
        };

        assert_eq!(parse(json!(50)), Some(50.0));
        assert_eq!(parse(json!("50")), Some(50.0));
        assert_eq!(parse(json!(" 12.5 ")), Some(12.5));
        assert_eq!(parse(json!("")), None);
        assert_eq!(parse(json!(null)), None);
        assert!(parse(json!("fifty")).is_some_and(f64::is_nan));
    }

    #[test]
    fn non_numeric_amount_text_fails_validation() {
        let input: TransactionInput = serde_json::from_value(
            json!({ "amount": "fifty", "category": "food", "type": "debit" }),
        )
        .unwrap();

        assert_eq!(
            input.validate(),
            Err(Error::Validation(
                "Amount must be a positive number".to_owned()
            ))
        );
    }
}
