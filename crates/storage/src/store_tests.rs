// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use evc_core::{CpId, CpState, DriverId, DriverStatus};
use std::io::Write as _;

fn cp(id: &str, state: CpState) -> ChargingPoint {
    let mut cp = ChargingPoint::new(CpId::new(id), 40.5, -3.1, 0.30, Utc::now());
    cp.state = state;
    cp
}

fn history(cp_id: &str, driver_id: &str, kwh: f64) -> HistoryRecord {
    HistoryRecord {
        timestamp: Utc::now(),
        cp_id: CpId::new(cp_id),
        driver_id: DriverId::new(driver_id),
        kwh_delivered: kwh,
        total_amount: kwh * 0.30,
        duration_seconds: 14.0,
    }
}

#[test]
fn empty_directory_loads_empty_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let loaded = store.load().unwrap();
    assert!(loaded.cps.is_empty());
    assert!(loaded.drivers.is_empty());
    assert!(store.recent_history(20).unwrap().is_empty());
}

#[test]
fn saved_cps_load_back_forced_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let rows: Vec<CpRow> =
        [cp("CP-001", CpState::Supplying), cp("CP-002", CpState::Activated)]
            .iter()
            .map(CpRow::from)
            .collect();
    store.save_cps(&rows).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.cps.len(), 2);
    for cp in &loaded.cps {
        assert_eq!(cp.state, CpState::Disconnected, "{} must re-register", cp.id);
        assert!(cp.session.is_none());
    }
    assert_eq!(loaded.cps[0].id, CpId::new("CP-001"));
    assert!((loaded.cps[0].price_per_kwh - 0.30).abs() < 1e-9);
}

#[test]
fn save_is_a_rewrite_not_an_append() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let first: Vec<CpRow> = [cp("CP-001", CpState::Activated)].iter().map(CpRow::from).collect();
    store.save_cps(&first).unwrap();
    let second: Vec<CpRow> = [cp("CP-002", CpState::Activated)].iter().map(CpRow::from).collect();
    store.save_cps(&second).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.cps.len(), 1);
    assert_eq!(loaded.cps[0].id, CpId::new("CP-002"));
}

#[test]
fn drivers_load_back_idle_with_counters_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let mut driver = evc_core::Driver::new(DriverId::new("D1"), Utc::now());
    driver.start_charging(CpId::new("CP-001"));
    driver.finish_charging(3.0);
    driver.start_charging(CpId::new("CP-001"));

    store.save_drivers(&[DriverRow::from(&driver)]).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded.drivers.len(), 1);
    let d = &loaded.drivers[0];
    assert_eq!(d.status, DriverStatus::Idle);
    assert!(d.current_cp.is_none());
    assert_eq!(d.total_charges, 1);
    assert!((d.total_spent - 3.0).abs() < 1e-9);
}

#[test]
fn history_appends_and_tails() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    for i in 0..5 {
        store.append_history(&history("CP-001", "D1", i as f64)).unwrap();
    }

    let tail = store.recent_history(3).unwrap();
    assert_eq!(tail.len(), 3);
    assert!((tail[0].kwh_delivered - 2.0).abs() < 1e-9);
    assert!((tail[2].kwh_delivered - 4.0).abs() < 1e-9);

    let all = store.recent_history(100).unwrap();
    assert_eq!(all.len(), 5);
}

#[test]
fn corrupt_lines_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    let rows: Vec<CpRow> = [cp("CP-001", CpState::Activated)].iter().map(CpRow::from).collect();
    store.save_cps(&rows).unwrap();

    // Wedge garbage between valid lines.
    let path = dir.path().join("charging_points.txt");
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "not json at all").unwrap();
    let mut more = serde_json::to_string(&CpRow::from(&cp("CP-002", CpState::Activated))).unwrap();
    more.push('\n');
    file.write_all(more.as_bytes()).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.cps.len(), 2);
}
