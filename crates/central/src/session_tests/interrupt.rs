// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::poller::RegistryCp;
use evc_core::DriverStatus;

async fn charging_fixture(h: &Harness) -> (Peer, Peer, Peer) {
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");
    let mut monitor = Peer::connect("monitor");

    register_cp(h, &engine, "C1", 0.30).await;
    register_driver(h, &driver, "D1").await;
    register_monitor(h, &monitor, "C1").await;
    request_charge(h, &driver, "D1", "C1", 10.0).await;
    engine.recv().await;
    driver.recv().await;
    monitor.recv().await;

    (engine, driver, monitor)
}

#[tokio::test]
async fn operator_stop_mid_session_tickets_and_blocks_the_cp() {
    // S3: stop at ~50% delivered.
    let h = harness();
    let (mut engine, mut driver, mut monitor) = charging_fixture(&h).await;

    let increment = 10.0 / 14.0;
    for tick in 1..=7 {
        supply_update(&h, "C1", increment, increment * tick as f64 * 0.30).await;
    }
    driver.recv().await;

    h.central.operator_stop(&"C1".into()).await.unwrap();

    assert_eq!(cp_state(&h, "C1"), CpState::Stopped);
    let stop = engine.expect("STOP_COMMAND").await;
    assert_eq!(stop, vec!["STOP_COMMAND", "C1"]);

    let ticket = driver.expect("TICKET").await;
    let delivered: f64 = ticket[2].parse().unwrap();
    let amount: f64 = ticket[3].parse().unwrap();
    assert!((delivered - 5.0).abs() < 0.01, "~50% delivered, got {delivered}");
    assert!((amount - 1.5).abs() < 0.01, "~1.50 accrued, got {amount}");
    monitor.expect("DRIVER_STOP").await;

    assert_eq!(h.store.recent_history(10).unwrap().len(), 1);
    assert_eq!(h.central.drivers_snapshot()[0].status, DriverStatus::Idle);

    // The stopped CP refuses the next request with its state.
    let mut d3 = Peer::connect("d3");
    register_driver(&h, &d3, "D3").await;
    request_charge(&h, &d3, "D3", "C1", 10.0).await;
    let deny = d3.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D3", "C1", "CP_STATE_STOPPED"]);
}

#[tokio::test]
async fn operator_resume_reopens_a_stopped_cp() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    register_cp(&h, &engine, "C1", 0.30).await;

    h.central.operator_stop(&"C1".into()).await.unwrap();
    assert_eq!(cp_state(&h, "C1"), CpState::Stopped);

    h.central.operator_resume(&"C1".into()).await.unwrap();
    assert_eq!(cp_state(&h, "C1"), CpState::Activated);
    engine.expect("RESUME_COMMAND").await;
}

#[tokio::test]
async fn operator_commands_on_unknown_cps_error() {
    let h = harness();
    assert!(h.central.operator_stop(&"C9".into()).await.is_err());
    assert!(h.central.operator_resume(&"C9".into()).await.is_err());
}

#[tokio::test]
async fn fault_mid_session_denies_the_driver_and_keeps_a_partial_row() {
    // S4.
    let h = harness();
    let (_engine, mut driver, mut monitor) = charging_fixture(&h).await;

    supply_update(&h, "C1", 3.0, 0.9).await;
    driver.recv().await;

    h.central
        .handle_inbound(Inbound::Fault { cp_id: "C1".into() }, &monitor.conn)
        .await;

    let deny = driver.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D1", "C1", "CP_FAULT_EMERGENCY_STOP"]);
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder);

    let history = h.store.recent_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert!((history[0].kwh_delivered - 3.0).abs() < 1e-6);

    // Recovery restores service.
    h.central
        .handle_inbound(Inbound::Recovery { cp_id: "C1".into() }, &monitor.conn)
        .await;
    assert_eq!(cp_state(&h, "C1"), CpState::Activated);
}

#[tokio::test]
async fn health_ko_is_a_fault_and_health_ok_is_not_a_recovery() {
    let h = harness();
    let engine = Peer::connect("engine");
    let monitor = Peer::connect("monitor");
    register_cp(&h, &engine, "C1", 0.30).await;

    h.central
        .handle_inbound(Inbound::HealthKo { cp_id: "C1".into() }, &monitor.conn)
        .await;
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder);

    h.central
        .handle_inbound(Inbound::HealthOk { cp_id: "C1".into() }, &monitor.conn)
        .await;
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder, "recovery must stay explicit");
}

#[tokio::test]
async fn racing_terminators_append_exactly_one_history_row() {
    let h = harness();
    let (engine, mut driver, _monitor) = charging_fixture(&h).await;

    supply_update(&h, "C1", 10.0, 3.0).await;
    driver.recv().await;

    // Normal end wins; the fault arrives late and must not double-settle.
    h.central
        .handle_inbound(
            Inbound::SupplyEnd {
                cp_id: "C1".into(),
                driver_id: "D1".into(),
                total_energy: 10.0,
                total_amount: 3.0,
            },
            &engine.conn,
        )
        .await;
    h.central.handle_inbound(Inbound::Fault { cp_id: "C1".into() }, &engine.conn).await;

    assert_eq!(h.store.recent_history(10).unwrap().len(), 1);
    // The late fault still takes the CP out of order, without a session to kill.
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder);
    let frames = driver.recv().await;
    assert_eq!(frames.iter().filter(|f| f[0] == "TICKET").count(), 1);
    assert_eq!(frames.iter().filter(|f| f[0] == "DENY").count(), 0);
}

#[tokio::test]
async fn heartbeat_updates_state_only_when_not_supplying() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;

    // Engine reports itself out of order between sessions: accepted.
    h.central
        .handle_inbound(
            Inbound::Heartbeat { cp_id: "C1".into(), state: CpState::OutOfOrder },
            &engine.conn,
        )
        .await;
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder);
    h.central
        .handle_inbound(
            Inbound::Heartbeat { cp_id: "C1".into(), state: CpState::Activated },
            &engine.conn,
        )
        .await;

    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    driver.recv().await;

    // Mid-session the session manager owns the state.
    h.central
        .handle_inbound(
            Inbound::Heartbeat { cp_id: "C1".into(), state: CpState::Activated },
            &engine.conn,
        )
        .await;
    assert_eq!(cp_state(&h, "C1"), CpState::Supplying);
}

#[tokio::test]
async fn weather_alert_holds_the_cp_and_clear_releases_it() {
    // S5, driven at the session-manager level.
    let h = harness();
    let engine = Peer::connect("engine");
    register_cp(&h, &engine, "C2", 0.30).await;

    h.central.weather_alert(&"C2".into(), "Madrid", -1.0).await.unwrap();

    assert_eq!(cp_state(&h, "C2"), CpState::OutOfOrder);
    let status = h.central.status_snapshot();
    assert_eq!(status.weather_alerts.len(), 1);
    assert_eq!(status.weather_alerts[0].location, "Madrid");

    h.central.weather_clear(&"C2".into()).await.unwrap();

    assert_eq!(cp_state(&h, "C2"), CpState::Activated);
    assert!(h.central.status_snapshot().weather_alerts.is_empty());
}

#[tokio::test]
async fn weather_alert_mid_session_tickets_the_driver() {
    let h = harness();
    let (_engine, mut driver, _monitor) = charging_fixture(&h).await;

    supply_update(&h, "C1", 2.0, 0.6).await;
    driver.recv().await;

    h.central.weather_alert(&"C1".into(), "Madrid", -3.5).await.unwrap();

    let ticket = driver.expect("TICKET").await;
    assert!((ticket[2].parse::<f64>().unwrap() - 2.0).abs() < 1e-6);
    assert_eq!(cp_state(&h, "C1"), CpState::OutOfOrder);
    assert_eq!(h.store.recent_history(10).unwrap().len(), 1);
}

#[tokio::test]
async fn weather_cannot_override_an_operator_stop() {
    let h = harness();
    let engine = Peer::connect("engine");
    register_cp(&h, &engine, "C1", 0.30).await;

    h.central.operator_stop(&"C1".into()).await.unwrap();
    h.central.weather_alert(&"C1".into(), "Madrid", -1.0).await.unwrap();

    // The alert is recorded but the operator stop stands.
    assert_eq!(cp_state(&h, "C1"), CpState::Stopped);
    assert_eq!(h.central.status_snapshot().weather_alerts.len(), 1);

    h.central.weather_clear(&"C1".into()).await.unwrap();

    // Clear removes the record without releasing the stop.
    assert_eq!(cp_state(&h, "C1"), CpState::Stopped);
    assert!(h.central.status_snapshot().weather_alerts.is_empty());
}

#[tokio::test]
async fn weather_hooks_on_unknown_cps_error() {
    let h = harness();
    assert!(h.central.weather_alert(&"C9".into(), "Madrid", -1.0).await.is_err());
    assert!(h.central.weather_clear(&"C9".into()).await.is_err());
}

#[tokio::test]
async fn registry_reconciliation_inserts_disconnected_and_removes_gone() {
    let h = harness();
    let engine = Peer::connect("engine");
    register_cp(&h, &engine, "C1", 0.30).await;

    let remote = vec![
        RegistryCp { cp_id: "C1".into(), latitude: 40.5, longitude: -3.1, price_per_kwh: 0.30 },
        RegistryCp { cp_id: "C2".into(), latitude: 41.0, longitude: -3.7, price_per_kwh: 0.25 },
    ];
    h.central.reconcile_registry(&remote).await;

    assert_eq!(cp_state(&h, "C1"), CpState::Activated, "known CPs keep their state");
    assert_eq!(cp_state(&h, "C2"), CpState::Disconnected, "new CPs await registration");

    // C2 vanishes from the registry.
    h.central.reconcile_registry(&remote[..1]).await;
    assert!(h.central.cps_snapshot().iter().all(|cp| cp.cp_id.as_str() != "C2"));
}

#[tokio::test]
async fn registry_removal_mid_session_settles_the_session_first() {
    let h = harness();
    let (_engine, mut driver, _monitor) = charging_fixture(&h).await;

    supply_update(&h, "C1", 2.0, 0.6).await;
    driver.recv().await;

    h.central.reconcile_registry(&[]).await;

    driver.expect("TICKET").await;
    assert_eq!(h.store.recent_history(10).unwrap().len(), 1);
    assert!(h.central.cps_snapshot().is_empty());
    assert_eq!(h.central.drivers_snapshot()[0].status, DriverStatus::Idle);
}
