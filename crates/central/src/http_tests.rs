// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface tests over a real ephemeral-port server.

use super::*;
use crate::audit::AuditPublisher;
use crate::registry::Connection;
use crate::session::SessionConfig;
use chrono::Utc;
use evc_core::{CpState, SystemClock};
use evc_storage::FileStore;
use evc_wire::Inbound;
use tempfile::TempDir;

struct Server {
    base: String,
    central: Arc<Central<SystemClock>>,
    client: reqwest::Client,
    _dir: TempDir,
}

async fn serve_test_app() -> Server {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let central = Arc::new(Central::new(
        store,
        AuditPublisher::spawn(None),
        SystemClock,
        SessionConfig::default(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&central), CancellationToken::new()));

    Server {
        base: format!("http://{addr}"),
        central,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

fn sink_conn() -> Arc<Connection> {
    Connection::new("sink", Box::new(tokio::io::sink()))
}

async fn register_cp(server: &Server, cp_id: &str) {
    server
        .central
        .handle_inbound(
            Inbound::RegisterCp {
                cp_id: cp_id.into(),
                latitude: 40.5,
                longitude: -3.1,
                price_per_kwh: 0.30,
            },
            &sink_conn(),
        )
        .await;
}

#[tokio::test]
async fn cps_endpoint_exposes_live_session_fields() {
    let server = serve_test_app().await;
    register_cp(&server, "C1").await;
    server
        .central
        .handle_inbound(Inbound::RegisterDriver { driver_id: "D1".into() }, &sink_conn())
        .await;
    server
        .central
        .handle_inbound(
            Inbound::RequestCharge { driver_id: "D1".into(), cp_id: "C1".into(), energy: 10.0 },
            &sink_conn(),
        )
        .await;

    let body: Value = server
        .client
        .get(format!("{}/api/cps", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body[0]["cp_id"], "C1");
    assert_eq!(body[0]["state"], "supplying");
    assert_eq!(body[0]["driver_id"], "D1");
    assert_eq!(body[0]["energy_requested"], 10.0);
}

#[tokio::test]
async fn status_endpoint_aggregates_counts() {
    let server = serve_test_app().await;
    register_cp(&server, "C1").await;
    register_cp(&server, "C2").await;

    let body: Value = server
        .client
        .get(format!("{}/api/status", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total_cps"], 2);
    assert_eq!(body["activated"], 2);
    assert_eq!(body["weather_alerts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn history_endpoint_honors_the_limit() {
    let server = serve_test_app().await;
    for i in 0..5 {
        server
            .central
            .store()
            .append_history(&evc_core::HistoryRecord {
                timestamp: Utc::now(),
                cp_id: "C1".into(),
                driver_id: "D1".into(),
                kwh_delivered: i as f64,
                total_amount: 0.3 * i as f64,
                duration_seconds: 14.0,
            })
            .unwrap();
    }

    let body: Value = server
        .client
        .get(format!("{}/api/history?limit=2", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["kwh_delivered"], 3.0);
    assert_eq!(rows[1]["kwh_delivered"], 4.0);
}

#[tokio::test]
async fn weather_alert_holds_a_cp_and_clear_releases_it() {
    // S5 through the hooks.
    let server = serve_test_app().await;
    register_cp(&server, "C2").await;

    let response = server
        .client
        .post(format!("{}/api/weather/alert", server.base))
        .json(&json!({ "cp_id": "C2", "location": "Madrid", "temperature": -1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let status = server.central.status_snapshot();
    assert_eq!(status.out_of_order, 1);
    assert_eq!(status.weather_alerts.len(), 1);

    let response = server
        .client
        .post(format!("{}/api/weather/clear", server.base))
        .json(&json!({ "cp_id": "C2", "location": "Madrid", "temperature": 4.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let cps = server.central.cps_snapshot();
    assert_eq!(cps[0].state, CpState::Activated);
    assert!(server.central.status_snapshot().weather_alerts.is_empty());
}

#[tokio::test]
async fn weather_alert_with_missing_fields_is_a_400() {
    let server = serve_test_app().await;
    register_cp(&server, "C1").await;

    let response = server
        .client
        .post(format!("{}/api/weather/alert", server.base))
        .json(&json!({ "cp_id": "C1", "location": "Madrid" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    // Nothing changed.
    assert_eq!(server.central.status_snapshot().out_of_order, 0);
}

#[tokio::test]
async fn weather_hooks_on_unknown_cps_are_404s() {
    let server = serve_test_app().await;

    let response = server
        .client
        .post(format!("{}/api/weather/alert", server.base))
        .json(&json!({ "cp_id": "C9", "location": "Madrid", "temperature": -1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let response = server
        .client
        .post(format!("{}/api/weather/clear", server.base))
        .json(&json!({ "cp_id": "C9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}
