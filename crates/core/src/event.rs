// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit events published to the external event stream.
//!
//! Serializes with `{"type": "cp:fault", ...fields}` format. Publishing is
//! fire-and-forget; the Central never consumes these.

use crate::cp::CpId;
use crate::driver::DriverId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    #[serde(rename = "cp:registered")]
    CpRegistered {
        cp_id: CpId,
        latitude: f64,
        longitude: f64,
        price_per_kwh: f64,
    },

    #[serde(rename = "driver:registered")]
    DriverRegistered { driver_id: DriverId },

    #[serde(rename = "charge:authorized")]
    ChargeAuthorized {
        cp_id: CpId,
        driver_id: DriverId,
        energy_requested: f64,
    },

    #[serde(rename = "charge:completed")]
    ChargeCompleted {
        cp_id: CpId,
        driver_id: DriverId,
        kwh_delivered: f64,
        total_amount: f64,
        /// Termination cause label (`complete`, `fault`, ...).
        cause: String,
    },

    #[serde(rename = "cp:fault")]
    CpFault { cp_id: CpId },

    #[serde(rename = "cp:recovered")]
    CpRecovered { cp_id: CpId },

    #[serde(rename = "cp:stopped")]
    CpStopped { cp_id: CpId },

    #[serde(rename = "cp:resumed")]
    CpResumed { cp_id: CpId },

    #[serde(rename = "weather:alert")]
    WeatherAlert {
        cp_id: CpId,
        location: String,
        temperature: f64,
    },

    #[serde(rename = "weather:clear")]
    WeatherClear { cp_id: CpId },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
