//! API key check for the REST surface.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Header carrying the key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Validates the provided API key against the configured one.
///
/// With no key configured every request passes.
pub fn validate_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), StatusCode> {
    match expected {
        None => Ok(()),
        Some(expected) if provided == Some(expected) => Ok(()),
        Some(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Middleware rejecting requests whose `x-api-key` header does not match.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if validate_api_key(state.api_key.as_deref(), provided).is_err() {
        tracing::warn!(path = %request.uri().path(), "rejected request with invalid API key");
        return Err((StatusCode::UNAUTHORIZED, "Invalid API key"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_configured_key_allows_everything() {
        assert!(validate_api_key(None, None).is_ok());
        assert!(validate_api_key(None, Some("anything")).is_ok());
    }

    #[test]
    fn test_configured_key_must_match() {
        assert!(validate_api_key(Some("secret"), Some("secret")).is_ok());
        assert_eq!(
            validate_api_key(Some("secret"), Some("wrong")),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            validate_api_key(Some("secret"), None),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
