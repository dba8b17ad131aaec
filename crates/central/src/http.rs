// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-mostly HTTP surface for dashboards, plus the inbound weather hooks.
//!
//! Input errors map to 400, an unknown CP to 404; nothing here ever raises
//! into Central state.

use crate::session::{Central, CentralError, CpSnapshot, DriverSnapshot, StatusSnapshot};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use evc_core::{Clock, CpId, HistoryRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub fn router<C: Clock>(central: Arc<Central<C>>) -> Router {
    Router::new()
        .route("/api/cps", get(get_cps::<C>))
        .route("/api/drivers", get(get_drivers::<C>))
        .route("/api/history", get(get_history::<C>))
        .route("/api/status", get(get_status::<C>))
        .route("/api/weather/alert", post(weather_alert::<C>))
        .route("/api/weather/clear", post(weather_clear::<C>))
        .with_state(central)
}

/// Serve until shutdown is signalled.
pub async fn serve<C: Clock>(
    listener: TcpListener,
    central: Arc<Central<C>>,
    cancel: CancellationToken,
) {
    let app = router(central);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
    {
        error!(error = %e, "HTTP server failed");
    }
}

async fn get_cps<C: Clock>(State(central): State<Arc<Central<C>>>) -> Json<Vec<CpSnapshot>> {
    Json(central.cps_snapshot())
}

async fn get_drivers<C: Clock>(
    State(central): State<Arc<Central<C>>>,
) -> Json<Vec<DriverSnapshot>> {
    Json(central.drivers_snapshot())
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn get_history<C: Clock>(
    State(central): State<Arc<Central<C>>>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<HistoryRecord>> {
    let limit = params.limit.unwrap_or(20);
    match central.store().recent_history(limit) {
        Ok(records) => Json(records),
        Err(e) => {
            warn!(error = %e, "history read failed");
            Json(Vec::new())
        }
    }
}

async fn get_status<C: Clock>(State(central): State<Arc<Central<C>>>) -> Json<StatusSnapshot> {
    Json(central.status_snapshot())
}

fn bad_request(field: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": format!("{field} is required") })))
}

fn not_found(e: &CentralError) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() })))
}

async fn weather_alert<C: Clock>(
    State(central): State<Arc<Central<C>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(cp_id) = body.get("cp_id").and_then(Value::as_str) else {
        return bad_request("cp_id");
    };
    let Some(location) = body.get("location").and_then(Value::as_str) else {
        return bad_request("location");
    };
    let Some(temperature) = body.get("temperature").and_then(Value::as_f64) else {
        return bad_request("temperature");
    };

    let cp_id = CpId::new(cp_id);
    match central.weather_alert(&cp_id, location, temperature).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "out_of_order", "cp_id": cp_id, "location": location })),
        ),
        Err(e) => not_found(&e),
    }
}

async fn weather_clear<C: Clock>(
    State(central): State<Arc<Central<C>>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(cp_id) = body.get("cp_id").and_then(Value::as_str) else {
        return bad_request("cp_id");
    };

    let cp_id = CpId::new(cp_id);
    match central.weather_clear(&cp_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "cleared", "cp_id": cp_id }))),
        Err(e) => not_found(&e),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
