//! Request extractors for bearer tokens and authenticated sessions.

use crate::{
    AppState,
    auth::session::Session,
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Raw token from an `Authorization: Bearer <token>` header. Not validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    /// Read the bearer token from `headers`. The scheme is matched case-insensitively.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Self::from_headers(&parts.headers).ok_or_else(|| {
            trace!("No bearer token on request");
            Error::unauthenticated("missing bearer token")
        })
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for BearerToken {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// The caller's validated session: signature, expiry and stored-token match all checked.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let BearerToken(token) = <BearerToken as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        let session = state.sessions.authenticate(&token).await?;
        debug!(username = %session.username, "Authenticated session");
        Ok(Self(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(
            BearerToken::from_headers(&headers("Bearer abc.def.ghi")),
            Some(BearerToken("abc.def.ghi".to_string()))
        );
        assert_eq!(
            BearerToken::from_headers(&headers("bearer abc")),
            Some(BearerToken("abc".to_string()))
        );
    }

    #[test]
    fn test_bearer_rejects_other_schemes() {
        assert_eq!(BearerToken::from_headers(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(BearerToken::from_headers(&headers("Bearer")), None);
        assert_eq!(BearerToken::from_headers(&headers("Bearer   ")), None);
        assert_eq!(BearerToken::from_headers(&HeaderMap::new()), None);
    }
}
