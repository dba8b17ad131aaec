// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Charging point record and lifecycle state machine.

use crate::driver::DriverId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

crate::define_id! {
    /// Identifier of a charging point, as registered by its engine
    /// (e.g. `CP-001`).
    pub struct CpId;
}

/// Lifecycle state of a charging point.
///
/// ```text
/// Disconnected --REGISTER-->  Activated
/// Activated     --authorize-->  Supplying
/// Supplying     --supply end / unplug-->  Activated
/// Supplying     --fault | weather-->      OutOfOrder
/// Supplying     --operator stop-->        Stopped
/// Activated     --fault | weather-->      OutOfOrder
/// Activated     --operator stop-->        Stopped
/// OutOfOrder    --recovery | clear-->     Activated
/// Stopped       --operator resume-->      Activated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpState {
    Disconnected,
    Activated,
    Supplying,
    Stopped,
    OutOfOrder,
}

crate::simple_display! {
    CpState {
        Disconnected => "disconnected",
        Activated => "activated",
        Supplying => "supplying",
        Stopped => "stopped",
        OutOfOrder => "out_of_order",
    }
}

impl CpState {
    /// Uppercase token used on the wire (HEARTBEAT payloads and
    /// `CP_STATE_<token>` deny reasons).
    pub fn wire_token(&self) -> &'static str {
        match self {
            CpState::Disconnected => "DISCONNECTED",
            CpState::Activated => "ACTIVATED",
            CpState::Supplying => "SUPPLYING",
            CpState::Stopped => "STOPPED",
            CpState::OutOfOrder => "OUT_OF_ORDER",
        }
    }

    /// Parse a wire token. Unknown tokens are the caller's problem to log.
    pub fn parse_wire_token(token: &str) -> Option<Self> {
        match token {
            "DISCONNECTED" => Some(CpState::Disconnected),
            "ACTIVATED" => Some(CpState::Activated),
            "SUPPLYING" => Some(CpState::Supplying),
            "STOPPED" => Some(CpState::Stopped),
            "OUT_OF_ORDER" => Some(CpState::OutOfOrder),
            _ => None,
        }
    }
}

/// Accounting for one in-flight charging session.
///
/// Not persisted — a session interrupted by a Central restart is gone; the
/// CP re-registers fresh (durability is an explicit non-goal).
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub driver: DriverId,
    /// Monotonic start, for duration measurement.
    pub started: Instant,
    /// Wall-clock start, for history rows.
    pub started_at_ms: u64,
    pub energy_requested: f64,
    /// Accumulated from CP-reported increments; the authoritative meter.
    pub energy_delivered: f64,
    /// CP-reported running amount, accepted verbatim.
    pub accrued_amount: f64,
    /// Set when delivered first crosses requested. Completion waits for the
    /// explicit unplug; this flag only drives the monitor notification.
    pub complete: bool,
}

impl ActiveSession {
    pub fn new(
        driver: DriverId,
        started: Instant,
        started_at_ms: u64,
        energy_requested: f64,
    ) -> Self {
        Self {
            driver,
            started,
            started_at_ms,
            energy_requested,
            energy_delivered: 0.0,
            accrued_amount: 0.0,
            complete: false,
        }
    }

    /// Apply one SUPPLY_UPDATE. Returns true the first time the accumulated
    /// energy crosses the requested amount.
    pub fn record_update(&mut self, energy_increment: f64, running_amount: f64) -> bool {
        self.energy_delivered += energy_increment;
        self.accrued_amount = running_amount;
        if !self.complete && self.energy_delivered >= self.energy_requested {
            self.complete = true;
            true
        } else {
            false
        }
    }
}

/// A charging point as known to the Central.
///
/// The session block is present iff `state == Supplying`; `begin_session`
/// and `end_session` are the only mutators and preserve that invariant.
#[derive(Debug, Clone)]
pub struct ChargingPoint {
    pub id: CpId,
    pub latitude: f64,
    pub longitude: f64,
    pub price_per_kwh: f64,
    pub state: CpState,
    pub session: Option<ActiveSession>,
    pub registered_at: DateTime<Utc>,
}

impl ChargingPoint {
    pub fn new(
        id: CpId,
        latitude: f64,
        longitude: f64,
        price_per_kwh: f64,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            latitude,
            longitude,
            price_per_kwh,
            state: CpState::Disconnected,
            session: None,
            registered_at,
        }
    }

    /// Eligible for a new authorization: activated with no driver attached.
    pub fn is_available(&self) -> bool {
        self.state == CpState::Activated && self.session.is_none()
    }

    pub fn current_driver(&self) -> Option<&DriverId> {
        self.session.as_ref().map(|s| &s.driver)
    }

    pub fn begin_session(&mut self, session: ActiveSession) {
        self.state = CpState::Supplying;
        self.session = Some(session);
    }

    /// Take the session out and settle into `next`. Returns `None` if no
    /// session was running (a losing terminator racing a finished one).
    pub fn end_session(&mut self, next: CpState) -> Option<ActiveSession> {
        let session = self.session.take();
        self.state = next;
        session
    }
}

#[cfg(test)]
#[path = "cp_tests.rs"]
mod tests;
