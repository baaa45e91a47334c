//! Token extraction and request authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::AppState;
use crate::claims::TokenClaims;
use crate::error::Error;

pub const ID_TOKEN_COOKIE: &str = "id_token";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Claims of a token taken from the `Authorization: Bearer` header only
pub struct BearerClaims(pub TokenClaims);

/// Claims of a token taken from the bearer header, or else the
/// `access_token` / `id_token` cookies set by the login callback
pub struct AuthenticatedUser(pub TokenClaims);

impl FromRequestParts<AppState> for BearerClaims {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(Error::MissingToken)?;
        state.verifier.verify(&token).await.map(Self)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_value(&parts.headers, ACCESS_TOKEN_COOKIE))
            .or_else(|| cookie_value(&parts.headers, ID_TOKEN_COOKIE))
            .ok_or(Error::MissingToken)?;
        state.verifier.verify(&token).await.map(Self)
    }
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Value of the named cookie across all `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a token cookie the browser script cannot read
pub(crate) fn token_cookie(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes a token cookie
pub(crate) fn cleared_cookie(name: &str, secure: bool) -> String {
    token_cookie(name, "", Some(0), secure)
}
