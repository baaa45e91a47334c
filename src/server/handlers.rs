use axum::extract::Query;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::AppendHeaders;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use tracing::info;

use super::auth::cleared_cookie;
use super::auth::token_cookie;
use super::auth::AuthenticatedUser;
use super::auth::BearerClaims;
use super::auth::ACCESS_TOKEN_COOKIE;
use super::auth::ID_TOKEN_COOKIE;
use super::auth::REFRESH_TOKEN_COOKIE;
use super::AppState;
use crate::claims::TokenClaims;
use crate::error::Error;

const LOGIN_PATH: &str = "/login";

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
}

/// Exchange the authorization code and hand the tokens to the browser as
/// HttpOnly cookies, never in the redirect URL
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, Error> {
    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| Error::InvalidRequest("missing authorization code".to_string()))?;

    let tokens = state.oauth.exchange_code(&code).await?;

    let secure = state.cookie_secure;
    let mut cookies = vec![
        (
            SET_COOKIE,
            token_cookie(ID_TOKEN_COOKIE, &tokens.id_token, tokens.expires_in, secure),
        ),
        (
            SET_COOKIE,
            token_cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, tokens.expires_in, secure),
        ),
    ];
    if let Some(refresh_token) = &tokens.refresh_token {
        cookies.push((
            SET_COOKIE,
            token_cookie(REFRESH_TOKEN_COOKIE, refresh_token, None, secure),
        ));
    }

    info!("authorization code exchanged");
    Ok((AppendHeaders(cookies), Redirect::to(state.oauth.redirect_uri())).into_response())
}

pub async fn profile(BearerClaims(claims): BearerClaims) -> Json<TokenClaims> {
    Json(claims)
}

pub async fn secure(AuthenticatedUser(claims): AuthenticatedUser) -> Json<Value> {
    Json(json!({ "message": "Access granted", "user": claims }))
}

pub async fn me(AuthenticatedUser(claims): AuthenticatedUser) -> Json<Value> {
    let username = claims.username().or_else(|| claims.sub());
    Json(json!({ "user": { "email": claims.email(), "username": username } }))
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let secure = state.cookie_secure;
    let cookies = [ID_TOKEN_COOKIE, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
        .map(|name| (SET_COOKIE, cleared_cookie(name, secure)));

    (AppendHeaders(cookies), Redirect::to(LOGIN_PATH)).into_response()
}

pub async fn strategies(AuthenticatedUser(claims): AuthenticatedUser) -> Json<Value> {
    let name = claims.username().unwrap_or("user");
    Json(json!({ "msg": format!("Hello {name}, here are your strategies") }))
}
