// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-mostly snapshots for the HTTP surface and the dashboard printer.

use super::Central;
use evc_core::{Clock, CpId, CpState, DriverId, DriverStatus, WeatherAlert};
use serde::Serialize;

/// One CP with its live session fields, if any.
#[derive(Debug, Clone, Serialize)]
pub struct CpSnapshot {
    pub cp_id: CpId,
    pub latitude: f64,
    pub longitude: f64,
    pub price_per_kwh: f64,
    pub state: CpState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<DriverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_requested: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_delivered: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrued_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charging_complete: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverSnapshot {
    pub driver_id: DriverId,
    pub status: DriverStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_cp: Option<CpId>,
    pub total_charges: u64,
    pub total_spent: f64,
}

/// Aggregate counts plus the active weather holds.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub total_cps: usize,
    pub activated: usize,
    pub supplying: usize,
    pub stopped: usize,
    pub out_of_order: usize,
    pub disconnected: usize,
    pub total_drivers: usize,
    pub charging_drivers: usize,
    pub weather_alerts: Vec<WeatherAlert>,
}

impl<C: Clock> Central<C> {
    pub fn cps_snapshot(&self) -> Vec<CpSnapshot> {
        let state = self.state.lock();
        let mut cps: Vec<CpSnapshot> = state
            .cps
            .values()
            .map(|cp| CpSnapshot {
                cp_id: cp.id.clone(),
                latitude: cp.latitude,
                longitude: cp.longitude,
                price_per_kwh: cp.price_per_kwh,
                state: cp.state,
                driver_id: cp.session.as_ref().map(|s| s.driver.clone()),
                energy_requested: cp.session.as_ref().map(|s| s.energy_requested),
                energy_delivered: cp.session.as_ref().map(|s| s.energy_delivered),
                accrued_amount: cp.session.as_ref().map(|s| s.accrued_amount),
                charging_complete: cp.session.as_ref().map(|s| s.complete),
            })
            .collect();
        cps.sort_by(|a, b| a.cp_id.cmp(&b.cp_id));
        cps
    }

    pub fn drivers_snapshot(&self) -> Vec<DriverSnapshot> {
        let state = self.state.lock();
        let mut drivers: Vec<DriverSnapshot> = state
            .drivers
            .values()
            .map(|d| DriverSnapshot {
                driver_id: d.id.clone(),
                status: d.status,
                current_cp: d.current_cp.clone(),
                total_charges: d.total_charges,
                total_spent: d.total_spent,
            })
            .collect();
        drivers.sort_by(|a, b| a.driver_id.cmp(&b.driver_id));
        drivers
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock();
        let count = |wanted: CpState| state.cps.values().filter(|cp| cp.state == wanted).count();
        StatusSnapshot {
            total_cps: state.cps.len(),
            activated: count(CpState::Activated),
            supplying: count(CpState::Supplying),
            stopped: count(CpState::Stopped),
            out_of_order: count(CpState::OutOfOrder),
            disconnected: count(CpState::Disconnected),
            total_drivers: state.drivers.len(),
            charging_drivers: state
                .drivers
                .values()
                .filter(|d| d.status == DriverStatus::Charging)
                .count(),
            weather_alerts: state.weather.clone(),
        }
    }
}
