// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver record.

use crate::cp::CpId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier of a driver, as registered by the driver client.
    pub struct DriverId;
}

/// What a driver is currently doing.
///
/// `Requesting` only shows in a snapshot taken between a REQUEST_CHARGE
/// arriving and its authorization decision — the decision is made under one
/// lock acquisition, so the window is the HTTP surface's, not ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Idle,
    Requesting,
    Charging,
}

crate::simple_display! {
    DriverStatus {
        Idle => "idle",
        Requesting => "requesting",
        Charging => "charging",
    }
}

/// A driver as known to the Central.
///
/// `status == Charging` iff `current_cp` is set and that CP's session points
/// back at this driver.
#[derive(Debug, Clone)]
pub struct Driver {
    pub id: DriverId,
    pub status: DriverStatus,
    pub current_cp: Option<CpId>,
    pub total_charges: u64,
    pub total_spent: f64,
    pub registered_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(id: DriverId, registered_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: DriverStatus::Idle,
            current_cp: None,
            total_charges: 0,
            total_spent: 0.0,
            registered_at,
        }
    }

    pub fn start_charging(&mut self, cp: CpId) {
        self.status = DriverStatus::Charging;
        self.current_cp = Some(cp);
    }

    /// Settle a finished session into the cumulative counters.
    pub fn finish_charging(&mut self, amount: f64) {
        self.status = DriverStatus::Idle;
        self.current_cp = None;
        self.total_charges += 1;
        self.total_spent += amount;
    }

    /// Re-registration resets to Idle; cumulative counters survive.
    pub fn reset(&mut self) {
        self.status = DriverStatus::Idle;
        self.current_cp = None;
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
