// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session termination causes and the completed-session history row.

use crate::cp::CpId;
use crate::driver::DriverId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a session ended.
///
/// Every cause is terminal and appends exactly one history record. The
/// cause decides the driver notification: `Fault` sends an emergency DENY,
/// everything else sends a TICKET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// CP reported SUPPLY_END after normal delivery.
    Complete,
    /// Driver-initiated END_CHARGE unplug.
    Unplug,
    /// Operator `stop` command.
    OperatorStop,
    /// Monitor-reported FAULT (or HEALTH_KO).
    Fault,
    /// Weather alert held the CP out of order.
    Weather,
    /// The CP re-registered mid-session; the old session starts fresh.
    Superseded,
    /// The CP disappeared from the external registry.
    Deregistered,
}

crate::simple_display! {
    TerminationCause {
        Complete => "complete",
        Unplug => "unplug",
        OperatorStop => "operator_stop",
        Fault => "fault",
        Weather => "weather",
        Superseded => "superseded",
        Deregistered => "deregistered",
    }
}

impl TerminationCause {
    /// Fault interruptions DENY the driver instead of ticketing.
    pub fn is_emergency(&self) -> bool {
        matches!(self, TerminationCause::Fault)
    }
}

/// One completed (or interrupted) session, as appended to the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub cp_id: CpId,
    pub driver_id: DriverId,
    pub kwh_delivered: f64,
    pub total_amount: f64,
    pub duration_seconds: f64,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
