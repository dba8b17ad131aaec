// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn events_carry_a_type_tag() {
    let event = AuditEvent::CpFault { cp_id: CpId::new("CP-001") };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "cp:fault");
    assert_eq!(json["cp_id"], "CP-001");
}

#[test]
fn completed_event_roundtrips() {
    let event = AuditEvent::ChargeCompleted {
        cp_id: CpId::new("CP-001"),
        driver_id: DriverId::new("D1"),
        kwh_delivered: 5.0,
        total_amount: 1.5,
        cause: "operator_stop".to_string(),
    };

    let json = serde_json::to_string(&event).unwrap();
    let back: AuditEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
