//! Middleware that attaches the caller's user ID to each request.
//!
//! Users log in through an upstream authentication gateway, which forwards
//! the authenticated user's ID in the [USER_ID_HEADER] header. This service
//! trusts that header as given.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{Error, user::UserID};

/// The header the authentication gateway uses to forward the user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware function that reads the caller's user ID from the request headers.
///
/// The user ID is placed into the request extensions and the request executed
/// normally if the header holds a valid ID, otherwise a 401 response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn identity_guard(mut request: Request, next: Next) -> Response {
    match get_user_id(request.headers()) {
        Some(user_id) => {
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        None => {
            tracing::warn!(
                "Rejecting request to {} without a valid {USER_ID_HEADER} header.",
                request.uri()
            );
            Error::MissingCallerIdentity.into_response()
        }
    }
}

fn get_user_id(headers: &HeaderMap) -> Option<UserID> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(UserID::new)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{USER_ID_HEADER, get_user_id};
    use crate::user::UserID;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn parses_user_id() {
        assert_eq!(get_user_id(&headers_with("42")), Some(UserID::new(42)));
        assert_eq!(get_user_id(&headers_with(" 7 ")), Some(UserID::new(7)));
    }

    #[test]
    fn rejects_missing_or_invalid_header() {
        assert_eq!(get_user_id(&HeaderMap::new()), None);
        assert_eq!(get_user_id(&headers_with("")), None);
        assert_eq!(get_user_id(&headers_with("abc")), None);
    }
}
