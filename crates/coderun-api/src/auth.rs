//! HTTP basic authentication.

use crate::error::ApiError;
use crate::http::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Extract `(user, password)` from an `Authorization: Basic` header.
pub fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Whether `headers` carry credentials listed in `clients`.
pub fn is_authorized(clients: &HashMap<String, String>, headers: &HeaderMap) -> bool {
    match parse_basic(headers) {
        Some((user, password)) => clients
            .get(&user)
            .is_some_and(|expected| password_matches(expected, &password)),
        None => false,
    }
}

/// Compare passwords in time independent of where they differ.
///
/// Both sides are hashed first so their lengths are fixed too.
fn password_matches(expected: &str, given: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let given = Sha256::digest(given.as_bytes());
    expected
        .iter()
        .zip(given.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Middleware rejecting requests without valid client credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_authorized(state.clients(), request.headers()) {
        tracing::debug!(uri = %request.uri(), "Rejected unauthenticated request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}
