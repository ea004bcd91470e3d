//! Request extractors that report malformed input with the API's JSON error body.
//!
//! axum's own [Json] and [Query] extractors reject bad input with a plain text
//! body. These wrappers turn those rejections into [Error::Validation] so every
//! 400 response has the same `{"message": ...}` shape.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::Error;

/// Deserializes a JSON request body, rejecting it with [Error::Validation].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::debug!("Rejected JSON body: {rejection}");
                Error::Validation(rejection.body_text())
            })?;

        Ok(Self(value))
    }
}

/// Deserializes the query string, rejecting it with [Error::Validation].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!("Rejected query string: {rejection}");
                Error::Validation(rejection.body_text())
            })?;

        Ok(Self(value))
    }
}
