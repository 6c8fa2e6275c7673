//! Bearer token extraction.
//!
//! When `AUTH_SECRET` is configured every request must carry
//! `Authorization: Bearer <AUTH_SECRET>`; otherwise requests are anonymous.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::AppState;

/// Caller admitted by the bearer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// Presented the configured secret
    Admin,
    /// No secret configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        authorize(header, state.config.auth_secret.as_deref())
    }
}

fn authorize(
    header: Option<&str>,
    secret: Option<&str>,
) -> Result<AuthUser, (StatusCode, &'static str)> {
    let Some(secret) = secret else {
        return Ok(AuthUser::Anonymous);
    };

    match header {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some("") => Err((StatusCode::UNAUTHORIZED, "Empty bearer token")),
            Some(token) if token == secret => Ok(AuthUser::Admin),
            Some(_) => Err((StatusCode::UNAUTHORIZED, "Invalid bearer token")),
            None => Err((
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format",
            )),
        },
        None => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_without_secret() {
        assert_eq!(authorize(None, None), Ok(AuthUser::Anonymous));
        assert_eq!(authorize(Some("Bearer x"), None), Ok(AuthUser::Anonymous));
    }

    #[test]
    fn secret_must_match() {
        assert_eq!(authorize(Some("Bearer s3cret"), Some("s3cret")), Ok(AuthUser::Admin));
        assert!(authorize(Some("Bearer nope"), Some("s3cret")).is_err());
        assert!(authorize(Some("Bearer "), Some("s3cret")).is_err());
        assert!(authorize(Some("Basic abc"), Some("s3cret")).is_err());
        assert!(authorize(None, Some("s3cret")).is_err());
    }
}
