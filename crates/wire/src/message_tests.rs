// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::frame::{Drained, FrameBuffer};
use yare::parameterized;

fn fields(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn register_cp_parses_coordinates_and_price() {
    let msg = Inbound::parse(&fields(&["REGISTER", "CP", "CP-001", "40.5", "-3.1", "0.30"]));
    assert_eq!(
        msg,
        Ok(Inbound::RegisterCp {
            cp_id: CpId::new("CP-001"),
            latitude: 40.5,
            longitude: -3.1,
            price_per_kwh: 0.30,
        })
    );
}

#[test]
fn register_driver_parses() {
    let msg = Inbound::parse(&fields(&["REGISTER", "DRIVER", "D1"]));
    assert_eq!(msg, Ok(Inbound::RegisterDriver { driver_id: DriverId::new("D1") }));
}

#[test]
fn register_monitor_parses_with_repeated_cp_field() {
    let msg = Inbound::parse(&fields(&["REGISTER", "MONITOR", "CP-001", "CP-001"]));
    assert_eq!(msg, Ok(Inbound::RegisterMonitor { cp_id: CpId::new("CP-001") }));
}

#[test]
fn heartbeat_parses_state_token() {
    let msg = Inbound::parse(&fields(&["HEARTBEAT", "CP-001", "OUT_OF_ORDER"]));
    assert_eq!(
        msg,
        Ok(Inbound::Heartbeat { cp_id: CpId::new("CP-001"), state: CpState::OutOfOrder })
    );
}

#[test]
fn request_charge_parses_energy() {
    let msg = Inbound::parse(&fields(&["REQUEST_CHARGE", "D1", "CP-001", "10"]));
    assert_eq!(
        msg,
        Ok(Inbound::RequestCharge {
            driver_id: DriverId::new("D1"),
            cp_id: CpId::new("CP-001"),
            energy: 10.0,
        })
    );
}

#[test]
fn supply_end_parses_totals() {
    let msg = Inbound::parse(&fields(&["SUPPLY_END", "CP-001", "D1", "10", "3.00"]));
    assert_eq!(
        msg,
        Ok(Inbound::SupplyEnd {
            cp_id: CpId::new("CP-001"),
            driver_id: DriverId::new("D1"),
            total_energy: 10.0,
            total_amount: 3.0,
        })
    );
}

#[parameterized(
    heartbeat = { &["HEARTBEAT", "CP-001"] },
    request_charge = { &["REQUEST_CHARGE", "D1", "CP-001"] },
    supply_update = { &["SUPPLY_UPDATE", "CP-001", "0.5"] },
    supply_end = { &["SUPPLY_END", "CP-001", "D1", "10"] },
    end_charge = { &["END_CHARGE", "D1"] },
    fault = { &["FAULT"] },
    register_cp = { &["REGISTER", "CP", "CP-001", "40.5"] },
)]
fn too_few_fields_is_a_typed_error(raw: &[&str]) {
    assert!(matches!(
        Inbound::parse(&fields(raw)),
        Err(MessageError::TooFewFields { .. })
    ));
}

#[test]
fn unknown_type_is_rejected() {
    assert_eq!(
        Inbound::parse(&fields(&["SELF_DESTRUCT", "CP-001"])),
        Err(MessageError::UnknownType("SELF_DESTRUCT".to_string()))
    );
}

#[test]
fn unknown_register_kind_is_rejected() {
    assert_eq!(
        Inbound::parse(&fields(&["REGISTER", "TOASTER", "T-1"])),
        Err(MessageError::UnknownRegisterKind("TOASTER".to_string()))
    );
}

#[test]
fn bad_decimal_is_a_typed_error() {
    assert!(matches!(
        Inbound::parse(&fields(&["REQUEST_CHARGE", "D1", "CP-001", "ten"])),
        Err(MessageError::InvalidNumber { kind: "REQUEST_CHARGE", field: "energy", .. })
    ));
}

#[test]
fn unknown_heartbeat_state_is_rejected() {
    assert_eq!(
        Inbound::parse(&fields(&["HEARTBEAT", "CP-001", "CHARGING"])),
        Err(MessageError::UnknownState("CHARGING".to_string()))
    );
}

#[test]
fn empty_frame_is_rejected() {
    assert_eq!(Inbound::parse(&fields(&[""])), Err(MessageError::Empty));
    assert_eq!(Inbound::parse(&[]), Err(MessageError::Empty));
}

#[test]
fn authorize_to_driver_carries_price_but_cp_form_does_not() {
    let driver_form = Outbound::AuthorizeDriver {
        driver_id: DriverId::new("D1"),
        cp_id: CpId::new("CP-001"),
        energy: 10.0,
        price: 0.30,
    };
    assert_eq!(driver_form.fields(), vec!["AUTHORIZE", "D1", "CP-001", "10", "0.3"]);

    let cp_form = Outbound::AuthorizeCp {
        driver_id: DriverId::new("D1"),
        cp_id: CpId::new("CP-001"),
        energy: 10.0,
    };
    assert_eq!(cp_form.fields(), vec!["AUTHORIZE", "D1", "CP-001", "10"]);
}

#[test]
fn available_cps_flattens_rows_after_the_type_field() {
    let msg = Outbound::AvailableCps {
        cps: vec![
            AvailableCp {
                cp_id: CpId::new("CP-001"),
                latitude: 40.5,
                longitude: -3.1,
                price_per_kwh: 0.3,
            },
            AvailableCp {
                cp_id: CpId::new("CP-002"),
                latitude: 41.0,
                longitude: -3.7,
                price_per_kwh: 0.25,
            },
        ],
    };
    assert_eq!(
        msg.fields(),
        vec!["AVAILABLE_CPS", "CP-001", "40.5", "-3.1", "0.3", "CP-002", "41", "-3.7", "0.25"]
    );

    let empty = Outbound::AvailableCps { cps: vec![] };
    assert_eq!(empty.fields(), vec!["AVAILABLE_CPS"]);
}

#[test]
fn deny_reason_helpers() {
    assert_eq!(reason::cp_state(CpState::Supplying), "CP_STATE_SUPPLYING");
    assert_eq!(reason::cp_state(CpState::Stopped), "CP_STATE_STOPPED");
    assert_eq!(reason::CP_ALREADY_IN_USE, "CP_ALREADY_IN_USE");
}

#[test]
fn outbound_encode_is_parseable_as_a_frame() {
    let msg = Outbound::Ticket {
        cp_id: CpId::new("CP-001"),
        total_energy: 10.0,
        total_amount: 3.0,
    };

    let mut buf = FrameBuffer::new();
    buf.extend(&msg.encode());
    let drained = buf.drain().unwrap();
    assert_eq!(
        drained,
        vec![Drained::Frame(vec![
            "TICKET".to_string(),
            "CP-001".to_string(),
            "10".to_string(),
            "3".to_string(),
        ])]
    );
}
