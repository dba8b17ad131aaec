// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted row layouts.
//!
//! Field names are the on-disk contract; in-memory records convert to and
//! from these. Live session fields are never persisted.

use chrono::{DateTime, Utc};
use evc_core::{ChargingPoint, CpId, CpState, Driver, DriverId, DriverStatus};
use serde::{Deserialize, Serialize};

/// One line of `charging_points.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpRow {
    pub cp_id: CpId,
    pub latitude: f64,
    pub longitude: f64,
    pub price_per_kwh: f64,
    pub state: CpState,
    pub registered_at: DateTime<Utc>,
}

impl From<&ChargingPoint> for CpRow {
    fn from(cp: &ChargingPoint) -> Self {
        Self {
            cp_id: cp.id.clone(),
            latitude: cp.latitude,
            longitude: cp.longitude,
            price_per_kwh: cp.price_per_kwh,
            state: cp.state,
            registered_at: cp.registered_at,
        }
    }
}

impl CpRow {
    /// Rehydrate for startup: a loaded CP is Disconnected until its engine
    /// re-registers, whatever state the row recorded.
    pub fn into_disconnected(self) -> ChargingPoint {
        let mut cp = ChargingPoint::new(
            self.cp_id,
            self.latitude,
            self.longitude,
            self.price_per_kwh,
            self.registered_at,
        );
        cp.state = CpState::Disconnected;
        cp
    }
}

/// One line of `drivers.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRow {
    pub driver_id: DriverId,
    pub status: DriverStatus,
    pub total_charges: u64,
    pub total_spent: f64,
    pub registered_at: DateTime<Utc>,
}

impl From<&Driver> for DriverRow {
    fn from(driver: &Driver) -> Self {
        Self {
            driver_id: driver.id.clone(),
            status: driver.status,
            total_charges: driver.total_charges,
            total_spent: driver.total_spent,
            registered_at: driver.registered_at,
        }
    }
}

impl DriverRow {
    /// Rehydrate for startup: loaded drivers are Idle with no CP attached.
    pub fn into_idle(self) -> Driver {
        let mut driver = Driver::new(self.driver_id, self.registered_at);
        driver.total_charges = self.total_charges;
        driver.total_spent = self.total_spent;
        driver
    }
}
