// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn only_fault_is_an_emergency() {
    assert!(TerminationCause::Fault.is_emergency());
    for cause in [
        TerminationCause::Complete,
        TerminationCause::Unplug,
        TerminationCause::OperatorStop,
        TerminationCause::Weather,
        TerminationCause::Superseded,
        TerminationCause::Deregistered,
    ] {
        assert!(!cause.is_emergency(), "{cause} should ticket, not deny");
    }
}

#[test]
fn history_record_serializes_with_wire_field_names() {
    let record = HistoryRecord {
        timestamp: Utc::now(),
        cp_id: CpId::new("CP-001"),
        driver_id: DriverId::new("D1"),
        kwh_delivered: 10.0,
        total_amount: 3.0,
        duration_seconds: 14.0,
    };

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["cp_id"], "CP-001");
    assert_eq!(json["driver_id"], "D1");
    assert_eq!(json["kwh_delivered"], 10.0);
    assert_eq!(json["total_amount"], 3.0);
    assert_eq!(json["duration_seconds"], 14.0);
    assert!(json.get("timestamp").is_some());
}
