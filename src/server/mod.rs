//! HTTP surface of the service.

pub mod auth;
mod broker;
mod error;
mod handlers;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ErrorBody;
pub use error::ErrorResponse;

use crate::broker::BrokerStore;
use crate::error::Error;
use crate::error::Result;
use crate::oauth::OAuthClient;
use crate::verifier::VerifyToken;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<dyn VerifyToken>,
    pub oauth: Arc<OAuthClient>,
    pub brokers: Arc<dyn BrokerStore>,
    /// Mark auth cookies `Secure`
    pub cookie_secure: bool,
}

/// REST API router
pub fn router(state: AppState, cors_origins: &[String]) -> Result<Router> {
    let cors = cors_layer(cors_origins)?;

    Ok(Router::new()
        .route("/api/healthz", get(handlers::healthz))
        .route("/api/auth/callback", get(handlers::auth_callback))
        .route("/api/auth/profile", get(handlers::profile))
        .route("/api/auth/secure", get(handlers::secure))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/logout", get(handlers::logout))
        .route("/api/strategies", get(handlers::strategies))
        .route(
            "/api/broker2",
            get(broker::get_broker).post(broker::link_broker),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|error| Error::InvalidConfig {
                key: "BACKEND_CORS_ORIGINS",
                message: format!("{origin:?} is not a valid origin: {error}"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}
