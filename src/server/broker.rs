use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use serde_json::Value;
use tracing::info;

use super::AppState;
use crate::broker::LinkBroker;
use crate::error::Error;

/// Link a broker, replacing any previously linked one
pub async fn link_broker(
    State(state): State<AppState>,
    payload: Result<Json<LinkBroker>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let Json(payload) = payload.map_err(|rejection| Error::InvalidRequest(rejection.body_text()))?;
    let link = payload.into_link(Utc::now())?;
    let name = link.broker_name.clone();

    state.brokers.upsert(link).await?;

    info!(broker = %name, "broker linked");
    Ok(Json(json!({ "status": format!("Broker {name} linked") })))
}

pub async fn get_broker(State(state): State<AppState>) -> Result<Json<Value>, Error> {
    let brokers: Vec<Value> = state
        .brokers
        .get()
        .await?
        .into_iter()
        .map(|link| {
            json!({
                "broker_name": link.broker_name,
                "client_id": link.client_id,
                "auth_token": link.auth_token,
                "connected_at": link.connected_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({ "brokers": brokers })))
}
