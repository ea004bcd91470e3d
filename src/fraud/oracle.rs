//! The fraud scoring oracle and the fail-open adapter around it.
//!
//! A [ScoringOracle] turns a [FeatureVector] into a [FraudVerdict] and is
//! allowed to fail. [FraudScorer] is the only place oracle failures are
//! handled: it bounds each call with a timeout and replaces any failure, or
//! a missing oracle, with the default verdict so that creating a transaction
//! never fails because of the oracle.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, fraud::FeatureVector};

/// The default time to wait for the oracle before falling back to the default verdict.
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Whether a transaction looks fraudulent and how likely it is to be fraud.
///
/// The default verdict, not fraudulent with a score of zero, is used whenever
/// no oracle could score a transaction and is also the state a transaction is
/// reset to when its owner marks it as legitimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudVerdict {
    /// Whether the transaction was flagged as fraudulent.
    pub is_fraudulent: bool,
    /// How likely the transaction is to be fraud, from 0 to 100.
    pub fraud_score: f64,
}

/// The ways a call to a scoring oracle can fail.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The request failed, timed out, returned an error status, or the
    /// response body could not be decoded.
    #[error("request to the scoring oracle failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The oracle answered with a score that is not a number.
    #[error("the scoring oracle returned an invalid score: {0}")]
    InvalidScore(f64),

    /// The oracle did not answer in time.
    #[error("the scoring oracle did not respond within {0:?}")]
    Timeout(Duration),
}

/// Something that can score a transaction's features.
#[async_trait]
pub trait ScoringOracle: Debug + Send + Sync {
    /// Score `features`.
    ///
    /// # Errors
    /// Implementations return an [OracleError] if they cannot produce a verdict.
    async fn score(&self, features: &FeatureVector) -> Result<FraudVerdict, OracleError>;
}

/// The body the scoring service answers with.
///
/// Missing or null fields fall back to a score of zero and not fraudulent.
#[derive(Debug, Deserialize)]
struct OracleResponse {
    #[serde(default, rename = "fraudScore")]
    fraud_score: Option<f64>,
    #[serde(default, rename = "isFraud")]
    is_fraud: Option<bool>,
}

impl From<OracleResponse> for FraudVerdict {
    fn from(response: OracleResponse) -> Self {
        FraudVerdict {
            is_fraudulent: response.is_fraud.unwrap_or(false),
            fraud_score: response.fraud_score.unwrap_or(0.0),
        }
    }
}

/// Reject scores that are not numbers and clamp the rest into [0, 100].
fn check_verdict(verdict: FraudVerdict) -> Result<FraudVerdict, OracleError> {
    if !verdict.fraud_score.is_finite() {
        return Err(OracleError::InvalidScore(verdict.fraud_score));
    }

    Ok(FraudVerdict {
        fraud_score: verdict.fraud_score.clamp(0.0, 100.0),
        ..verdict
    })
}

/// A scoring oracle reached over HTTP.
///
/// The feature vector is POSTed as JSON to `endpoint` and the response is
/// expected to look like `{"fraudScore": 87, "isFraud": true}`.
#[derive(Debug, Clone)]
pub struct HttpScoringOracle {
    client: Client,
    endpoint: String,
}

impl HttpScoringOracle {
    /// Create an oracle client for `endpoint` whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns an [Error::OracleClientError] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::OracleClientError(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
        })
    }
}

#[async_trait]
impl ScoringOracle for HttpScoringOracle {
    async fn score(&self, features: &FeatureVector) -> Result<FraudVerdict, OracleError> {
        let response: OracleResponse = self
            .client
            .post(&self.endpoint)
            .json(features)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.into())
    }
}

/// Scores transactions with an optional oracle, falling back to the default
/// verdict whenever the oracle is missing, slow or broken.
#[derive(Debug, Clone)]
pub struct FraudScorer {
    oracle: Option<Arc<dyn ScoringOracle>>,
    timeout: Duration,
}

impl FraudScorer {
    /// A scorer without an oracle that gives every transaction the default verdict.
    pub fn disabled() -> Self {
        Self {
            oracle: None,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    /// A scorer that asks `oracle` and waits at most `timeout` for an answer.
    pub fn new(oracle: Arc<dyn ScoringOracle>, timeout: Duration) -> Self {
        Self {
            oracle: Some(oracle),
            timeout,
        }
    }

    /// A scorer using the HTTP oracle at `endpoint`, or a disabled scorer if
    /// no endpoint is configured.
    ///
    /// # Errors
    /// Returns an [Error::OracleClientError] if the HTTP client cannot be built.
    pub fn from_endpoint(endpoint: Option<&str>, timeout: Duration) -> Result<Self, Error> {
        match endpoint.map(str::trim).filter(|endpoint| !endpoint.is_empty()) {
            Some(endpoint) => {
                let oracle = HttpScoringOracle::new(endpoint, timeout)?;
                Ok(Self::new(Arc::new(oracle), timeout))
            }
            None => Ok(Self::disabled()),
        }
    }

    /// Whether an oracle is configured.
    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Score `features`, never failing.
    ///
    /// Makes at most one call to the oracle. Scores outside [0, 100] are
    /// clamped. Failures, including scores that are not numbers, are logged
    /// and replaced by the default verdict.
    pub async fn score(&self, features: &FeatureVector) -> FraudVerdict {
        let Some(oracle) = &self.oracle else {
            tracing::debug!("No scoring oracle configured, using the default verdict.");
            return FraudVerdict::default();
        };

        let result = tokio::time::timeout(self.timeout, oracle.score(features))
            .await
            .unwrap_or(Err(OracleError::Timeout(self.timeout)))
            .and_then(check_verdict);

        match result {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::warn!("Fraud scoring failed, using the default verdict: {error}");
                FraudVerdict::default()
            }
        }
    }
}
