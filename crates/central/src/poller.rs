// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry reconciliation loop.
//!
//! The external registry is the source of truth for CP existence only.
//! Every tick GETs `{registry}/list`; CPs it lists that we do not know are
//! inserted Disconnected, CPs we hold that it dropped are removed. Poll
//! failures are logged and retried next tick.

use crate::session::Central;
use evc_core::Clock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One CP row from the registry listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryCp {
    pub cp_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub price_per_kwh: f64,
}

/// Parse a `/list` response body.
///
/// The registry stores what agents posted, so numeric fields may arrive as
/// strings; rows without a cp_id are dropped.
pub fn parse_listing(body: &Value) -> Vec<RegistryCp> {
    body.get("charging_points")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(parse_row).collect())
        .unwrap_or_default()
}

fn parse_row(row: &Value) -> Option<RegistryCp> {
    let cp_id = row.get("cp_id")?.as_str()?.to_string();
    Some(RegistryCp {
        cp_id,
        latitude: lenient_f64(row.get("latitude")),
        longitude: lenient_f64(row.get("longitude")),
        price_per_kwh: lenient_f64(row.get("price_per_kwh")),
    })
}

fn lenient_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

/// Poll until shutdown.
pub async fn run<C: Clock>(
    central: Arc<Central<C>>,
    base_url: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let client = reqwest::Client::new();
    let url = format!("{}/list", base_url.trim_end_matches('/'));

    loop {
        match client.get(&url).send().await {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => {
                    let listing = parse_listing(&body);
                    debug!(count = listing.len(), "registry listing");
                    central.reconcile_registry(&listing).await;
                }
                Err(e) => warn!(error = %e, "registry returned an unreadable body"),
            },
            Err(e) => warn!(error = %e, "registry poll failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
