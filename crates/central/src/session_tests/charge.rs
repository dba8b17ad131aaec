// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use evc_core::DriverStatus;

async fn supply_end(h: &Harness, peer: &Peer, cp: &str, driver: &str, energy: f64, amount: f64) {
    h.central
        .handle_inbound(
            Inbound::SupplyEnd {
                cp_id: cp.into(),
                driver_id: driver.into(),
                total_energy: energy,
                total_amount: amount,
            },
            &peer.conn,
        )
        .await;
}

#[tokio::test]
async fn normal_session_end_to_end() {
    // S1: register, authorize, 14 meter ticks, supply end, ticket.
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");
    let mut monitor = Peer::connect("monitor");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    register_monitor(&h, &monitor, "C1").await;
    engine.recv().await;
    driver.recv().await;
    monitor.recv().await;

    request_charge(&h, &driver, "D1", "C1", 10.0).await;

    let to_driver = driver.expect("AUTHORIZE").await;
    assert_eq!(to_driver, vec!["AUTHORIZE", "D1", "C1", "10", "0.3"]);
    let to_engine = engine.expect("AUTHORIZE").await;
    assert_eq!(to_engine, vec!["AUTHORIZE", "D1", "C1", "10"]);
    let start = monitor.expect("DRIVER_START").await;
    assert_eq!(start, vec!["DRIVER_START", "C1", "D1"]);
    assert_eq!(cp_state(&h, "C1"), CpState::Supplying);

    // 14 ticks of 1/14th of the requested energy each.
    let increment = 10.0 / 14.0;
    for tick in 1..=14 {
        h.clock.advance(std::time::Duration::from_secs(1));
        supply_update(&h, "C1", increment, increment * tick as f64 * 0.30).await;
    }

    let forwarded = driver.recv().await;
    assert_eq!(forwarded.iter().filter(|f| f[0] == "SUPPLY_UPDATE").count(), 14);
    monitor.expect("CHARGING_COMPLETE").await;

    supply_end(&h, &engine, "C1", "D1", 10.0, 3.0).await;

    let ticket = driver.expect("TICKET").await;
    assert_eq!(ticket[1], "C1");
    assert!((ticket[2].parse::<f64>().unwrap() - 10.0).abs() < 1e-6);
    assert!((ticket[3].parse::<f64>().unwrap() - 3.0).abs() < 1e-6);
    monitor.expect("DRIVER_STOP").await;

    assert_eq!(cp_state(&h, "C1"), CpState::Activated);
    let history = h.store.recent_history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert!((history[0].kwh_delivered - 10.0).abs() < 1e-6);
    assert!((history[0].total_amount - 3.0).abs() < 1e-6);
    assert!((history[0].duration_seconds - 14.0).abs() < 0.5);

    let drivers = h.central.drivers_snapshot();
    assert_eq!(drivers[0].status, DriverStatus::Idle);
    assert_eq!(drivers[0].total_charges, 1);
}

#[tokio::test]
async fn busy_cp_denies_second_driver() {
    // S2: a second REQUEST_CHARGE mid-session is denied and harmless.
    let h = harness();
    let engine = Peer::connect("engine");
    let mut d1 = Peer::connect("d1");
    let mut d2 = Peer::connect("d2");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &d1, "D1").await;
    register_driver(&h, &d2, "D2").await;
    request_charge(&h, &d1, "D1", "C1", 10.0).await;
    d1.expect("AUTHORIZE").await;

    request_charge(&h, &d2, "D2", "C1", 5.0).await;

    let deny = d2.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D2", "C1", "CP_ALREADY_IN_USE"]);
    assert_eq!(cp_state(&h, "C1"), CpState::Supplying);
    let cps = h.central.cps_snapshot();
    assert_eq!(cps[0].driver_id.as_ref().map(|d| d.as_str()), Some("D1"));
}

#[tokio::test]
async fn concurrent_requests_admit_exactly_one() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut d1 = Peer::connect("d1");
    let mut d2 = Peer::connect("d2");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &d1, "D1").await;
    register_driver(&h, &d2, "D2").await;

    tokio::join!(
        request_charge(&h, &d1, "D1", "C1", 10.0),
        request_charge(&h, &d2, "D2", "C1", 5.0),
    );

    let frames_1 = d1.recv().await;
    let frames_2 = d2.recv().await;
    let authorized = |frames: &[Vec<String>]| frames.iter().any(|f| f[0] == "AUTHORIZE");
    let denied = |frames: &[Vec<String>]| {
        frames
            .iter()
            .any(|f| f[0] == "DENY" && (f[3] == "CP_ALREADY_IN_USE" || f[3] == "CP_STATE_SUPPLYING"))
    };

    assert!(
        (authorized(&frames_1) && denied(&frames_2))
            || (authorized(&frames_2) && denied(&frames_1)),
        "exactly one winner expected: {frames_1:?} / {frames_2:?}",
    );
}

#[tokio::test]
async fn unknown_cp_is_denied() {
    let h = harness();
    let mut driver = Peer::connect("driver");

    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C9", 10.0).await;

    let deny = driver.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D1", "C9", "CP_NOT_FOUND"]);
}

#[tokio::test]
async fn non_activated_cp_denies_with_its_state() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    h.central.operator_stop(&"C1".into()).await.unwrap();

    request_charge(&h, &driver, "D1", "C1", 10.0).await;

    let deny = driver.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D1", "C1", "CP_STATE_STOPPED"]);
}

#[tokio::test]
async fn query_available_lists_only_idle_activated_cps() {
    let h = harness();
    let engine_1 = Peer::connect("e1");
    let engine_2 = Peer::connect("e2");
    let engine_3 = Peer::connect("e3");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine_1, "C1", 0.30).await;
    register_cp(&h, &engine_2, "C2", 0.25).await;
    register_cp(&h, &engine_3, "C3", 0.40).await;
    register_driver(&h, &driver, "D1").await;

    // C1 busy, C3 stopped: only C2 remains offerable.
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    h.central.operator_stop(&"C3".into()).await.unwrap();
    driver.recv().await;

    h.central
        .handle_inbound(Inbound::QueryAvailable { driver_id: "D1".into() }, &driver.conn)
        .await;

    let listing = driver.expect("AVAILABLE_CPS").await;
    assert_eq!(listing, vec!["AVAILABLE_CPS", "C2", "40.5", "-3.1", "0.25"]);
}

#[tokio::test]
async fn supply_updates_for_idle_or_unknown_cps_are_dropped() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    driver.recv().await;

    supply_update(&h, "C1", 1.0, 0.3).await; // no session
    supply_update(&h, "C9", 1.0, 0.3).await; // unknown CP

    driver.expect_silence().await;
    assert_eq!(h.store.recent_history(10).unwrap().len(), 0);
}

#[tokio::test]
async fn supply_end_keeps_the_accumulator_over_cp_reported_totals() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    supply_update(&h, "C1", 4.0, 1.2).await;
    driver.recv().await;

    // The CP claims a full session; the accumulator says 4 kWh.
    supply_end(&h, &engine, "C1", "D1", 10.0, 3.0).await;

    let ticket = driver.expect("TICKET").await;
    assert!((ticket[2].parse::<f64>().unwrap() - 4.0).abs() < 1e-6);
    assert!((ticket[3].parse::<f64>().unwrap() - 1.2).abs() < 1e-6);

    let history = h.store.recent_history(10).unwrap();
    assert!((history[0].kwh_delivered - 4.0).abs() < 1e-6);
}

#[tokio::test]
async fn supply_end_naming_the_wrong_driver_is_dropped() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    driver.recv().await;

    supply_end(&h, &engine, "C1", "D2", 10.0, 3.0).await;

    assert_eq!(cp_state(&h, "C1"), CpState::Supplying);
    assert!(h.store.recent_history(10).unwrap().is_empty());
}

#[tokio::test]
async fn unplug_before_any_meter_tick_bills_the_elapsed_estimate() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    engine.recv().await;
    driver.recv().await;

    // Half the nominal 14s session elapses with no SUPPLY_UPDATE at all.
    h.clock.advance(std::time::Duration::from_secs(7));
    h.central
        .handle_inbound(
            Inbound::EndCharge { driver_id: "D1".into(), cp_id: "C1".into() },
            &driver.conn,
        )
        .await;

    let ticket = driver.expect("TICKET").await;
    assert!((ticket[2].parse::<f64>().unwrap() - 5.0).abs() < 1e-6);
    assert!((ticket[3].parse::<f64>().unwrap() - 1.5).abs() < 1e-6);

    // The engine is told to stop its local simulation.
    let end = engine.expect("END_SUPPLY").await;
    assert_eq!(end, vec!["END_SUPPLY", "C1"]);
    assert_eq!(cp_state(&h, "C1"), CpState::Activated);
}

#[tokio::test]
async fn unplug_with_meter_ticks_bills_the_accumulator() {
    let h = harness();
    let mut engine = Peer::connect("engine");
    let mut driver = Peer::connect("driver");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &driver, "D1").await;
    request_charge(&h, &driver, "D1", "C1", 10.0).await;
    engine.recv().await;
    driver.recv().await;

    supply_update(&h, "C1", 3.0, 0.9).await;
    h.clock.advance(std::time::Duration::from_secs(100));
    h.central
        .handle_inbound(
            Inbound::EndCharge { driver_id: "D1".into(), cp_id: "C1".into() },
            &driver.conn,
        )
        .await;

    // Elapsed time plays no part once real meter data exists.
    let ticket = driver.expect("TICKET").await;
    assert!((ticket[2].parse::<f64>().unwrap() - 3.0).abs() < 1e-6);
    assert!((ticket[3].parse::<f64>().unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn unplug_by_the_wrong_driver_is_denied() {
    let h = harness();
    let engine = Peer::connect("engine");
    let mut d1 = Peer::connect("d1");
    let mut d2 = Peer::connect("d2");

    register_cp(&h, &engine, "C1", 0.30).await;
    register_driver(&h, &d1, "D1").await;
    register_driver(&h, &d2, "D2").await;
    request_charge(&h, &d1, "D1", "C1", 10.0).await;
    d1.recv().await;

    h.central
        .handle_inbound(Inbound::EndCharge { driver_id: "D2".into(), cp_id: "C1".into() }, &d2.conn)
        .await;

    let deny = d2.expect("DENY").await;
    assert_eq!(deny, vec!["DENY", "D2", "C1", "NOT_CURRENT_DRIVER"]);
    assert_eq!(cp_state(&h, "C1"), CpState::Supplying);
}
