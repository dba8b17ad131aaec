// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use evc_core::DriverStatus;

#[tokio::test]
async fn cp_registration_acks_and_activates() {
    let h = harness();
    let mut cp = Peer::connect("cp");

    register_cp(&h, &cp, "CP-001", 0.30).await;

    let ack = cp.expect("ACKNOWLEDGE").await;
    assert_eq!(ack, vec!["ACKNOWLEDGE", "CP-001", "OK"]);
    assert_eq!(cp_state(&h, "CP-001"), CpState::Activated);
}

#[tokio::test]
async fn driver_registration_acks_idle() {
    let h = harness();
    let mut driver = Peer::connect("driver");

    register_driver(&h, &driver, "D1").await;

    let ack = driver.expect("ACKNOWLEDGE").await;
    assert_eq!(ack, vec!["ACKNOWLEDGE", "D1", "OK"]);

    let drivers = h.central.drivers_snapshot();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].status, DriverStatus::Idle);
}

#[tokio::test]
async fn monitor_registration_acks_in_its_own_namespace() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut monitor = Peer::connect("monitor");

    register_cp(&h, &engine, "CP-001", 0.30).await;
    register_monitor(&h, &monitor, "CP-001").await;

    let ack = monitor.expect("ACKNOWLEDGE").await;
    assert_eq!(ack, vec!["ACKNOWLEDGE", "CP-001", "MONITOR_OK"]);
    // The engine binding is untouched by the monitor registration.
    engine.expect("ACKNOWLEDGE").await;
}

#[tokio::test]
async fn registration_persists_rows() {
    let h = harness();
    let cp = Peer::connect("cp");
    let driver = Peer::connect("driver");

    register_cp(&h, &cp, "CP-001", 0.30).await;
    register_driver(&h, &driver, "D1").await;

    let loaded = h.store.load().unwrap();
    assert_eq!(loaded.cps.len(), 1);
    assert_eq!(loaded.drivers.len(), 1);
    // Rows load back Disconnected/Idle until the agents re-register.
    assert_eq!(loaded.cps[0].state, CpState::Disconnected);
}

#[tokio::test]
async fn reregistration_supersedes_the_connection_binding() {
    let h = harness();
    let mut old_engine = Peer::connect("engine-old");
    let mut new_engine = Peer::connect("engine-new");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &old_engine, "CP-001", 0.30).await;
    old_engine.expect("ACKNOWLEDGE").await;
    register_cp(&h, &new_engine, "CP-001", 0.30).await;
    new_engine.expect("ACKNOWLEDGE").await;

    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "CP-001", 10.0).await;

    // The AUTHORIZE for the engine goes to the new connection only.
    new_engine.expect("AUTHORIZE").await;
    old_engine.expect_silence().await;
}

#[tokio::test]
async fn cp_reregistration_mid_session_settles_the_old_session() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "CP-001", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "CP-001", 10.0).await;
    driver.expect("AUTHORIZE").await;

    supply_update(&h, "CP-001", 5.0, 1.5).await;
    register_cp(&h, &engine, "CP-001", 0.30).await;

    // Fresh start: ticket for the half-delivered session, one history row,
    // CP back to Activated, driver idle again.
    let ticket = driver.expect("TICKET").await;
    assert_eq!(ticket[1], "CP-001");
    assert_eq!(cp_state(&h, "CP-001"), CpState::Activated);
    assert_eq!(h.store.recent_history(10).unwrap().len(), 1);
    assert_eq!(h.central.drivers_snapshot()[0].status, DriverStatus::Idle);
}

#[tokio::test]
async fn driver_reregistration_resets_to_idle_but_keeps_counters() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "CP-001", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "CP-001", 10.0).await;
    supply_update(&h, "CP-001", 10.0, 3.0).await;
    h.central
        .handle_inbound(
            Inbound::SupplyEnd {
                cp_id: "CP-001".into(),
                driver_id: "D1".into(),
                total_energy: 10.0,
                total_amount: 3.0,
            },
            &engine.conn,
        )
        .await;

    register_driver(&h, &driver, "D1").await;

    let snapshot = h.central.drivers_snapshot();
    assert_eq!(snapshot[0].status, DriverStatus::Idle);
    assert_eq!(snapshot[0].total_charges, 1);
    assert!((snapshot[0].total_spent - 3.0).abs() < 1e-9);
}
