// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization and metering: REQUEST_CHARGE, SUPPLY_UPDATE, SUPPLY_END,
//! END_CHARGE.

use super::{deny, Central, CoreState, Dispatch};
use crate::registry::Connection;
use chrono::Utc;
use evc_core::{ActiveSession, AuditEvent, Clock, CpId, Driver, DriverId, TerminationCause};
use evc_wire::{reason, Outbound};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tolerance when comparing CP-reported totals against the accumulator.
const METER_EPSILON: f64 = 1e-6;

impl<C: Clock> Central<C> {
    pub(crate) fn on_request_charge(
        &self,
        state: &mut CoreState,
        driver_id: DriverId,
        cp_id: CpId,
        energy: f64,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        // A request from a driver we have never seen creates the record;
        // clients are expected to REGISTER first, so note it.
        if !state.drivers.contains_key(&driver_id) {
            debug!(driver = %driver_id, "charge request from unregistered driver, creating record");
            state
                .drivers
                .insert(driver_id.clone(), Driver::new(driver_id.clone(), Utc::now()));
            dispatch.persist_drivers = true;
        }

        let decision = match state.cps.get(&cp_id) {
            None => Some(reason::CP_NOT_FOUND.to_string()),
            Some(cp) if cp.session.is_some() => Some(reason::CP_ALREADY_IN_USE.to_string()),
            Some(cp) if cp.state != evc_core::CpState::Activated => {
                Some(reason::cp_state(cp.state))
            }
            Some(_) => None,
        };
        if let Some(why) = decision {
            info!(driver = %driver_id, cp = %cp_id, reason = %why, "charge denied");
            dispatch.send(conn, deny(&driver_id, &cp_id, why));
            return dispatch;
        }

        let price = {
            // Checked above; a vanished entry here would be a torn lock.
            let Some(cp) = state.cps.get_mut(&cp_id) else {
                return dispatch;
            };
            cp.begin_session(ActiveSession::new(
                driver_id.clone(),
                self.clock.now(),
                self.clock.epoch_ms(),
                energy,
            ));
            cp.price_per_kwh
        };

        if let Some(driver) = state.drivers.get_mut(&driver_id) {
            driver.start_charging(cp_id.clone());
        }

        info!(driver = %driver_id, cp = %cp_id, energy, price, "charge authorized");
        dispatch.persist_cps = true;
        dispatch.persist_drivers = true;
        dispatch.events.push(AuditEvent::ChargeAuthorized {
            cp_id: cp_id.clone(),
            driver_id: driver_id.clone(),
            energy_requested: energy,
        });

        dispatch.send(
            conn,
            Outbound::AuthorizeDriver {
                driver_id: driver_id.clone(),
                cp_id: cp_id.clone(),
                energy,
                price,
            },
        );
        dispatch.send_entity(
            state,
            cp_id.as_str(),
            Outbound::AuthorizeCp {
                driver_id: driver_id.clone(),
                cp_id: cp_id.clone(),
                energy,
            },
        );
        dispatch.send_monitor(state, &cp_id, Outbound::DriverStart { cp_id: cp_id.clone(), driver_id });
        dispatch
    }

    pub(crate) fn on_supply_update(
        &self,
        state: &mut CoreState,
        cp_id: CpId,
        energy_increment: f64,
        running_amount: f64,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let (driver_id, crossed) = {
            let Some(cp) = state.cps.get_mut(&cp_id) else {
                warn!(cp = %cp_id, "supply update for unknown CP, dropping");
                return dispatch;
            };
            let Some(session) = cp.session.as_mut() else {
                debug!(cp = %cp_id, "supply update with no session, dropping stale frame");
                return dispatch;
            };
            let crossed = session.record_update(energy_increment, running_amount);
            (session.driver.clone(), crossed)
        };

        dispatch.send_entity(
            state,
            driver_id.as_str(),
            Outbound::SupplyUpdate { cp_id: cp_id.clone(), energy_increment, running_amount },
        );
        if crossed {
            info!(cp = %cp_id, driver = %driver_id, "requested energy delivered, awaiting unplug");
            dispatch.send_monitor(
                state,
                &cp_id,
                Outbound::ChargingComplete { cp_id: cp_id.clone(), driver_id },
            );
        }
        dispatch
    }

    pub(crate) fn on_supply_end(
        &self,
        state: &mut CoreState,
        cp_id: CpId,
        driver_id: DriverId,
        total_energy: f64,
        total_amount: f64,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match state.cps.get(&cp_id).and_then(|cp| cp.session.as_ref()) {
            Some(session) if session.driver == driver_id => {
                // The accumulator is authoritative; a CP whose local meter
                // drifted from it gets a log line, not a different ticket.
                if (session.energy_delivered - total_energy).abs() > METER_EPSILON
                    || (session.accrued_amount - total_amount).abs() > METER_EPSILON
                {
                    warn!(
                        cp = %cp_id,
                        reported_energy = total_energy,
                        accumulated_energy = session.energy_delivered,
                        reported_amount = total_amount,
                        accumulated_amount = session.accrued_amount,
                        "CP-reported totals disagree with accumulator",
                    );
                }
            }
            Some(session) => {
                warn!(
                    cp = %cp_id,
                    claimed = %driver_id,
                    actual = %session.driver,
                    "SUPPLY_END names the wrong driver, dropping",
                );
                return dispatch;
            }
            None => {
                debug!(cp = %cp_id, "SUPPLY_END with no session, dropping stale frame");
                return dispatch;
            }
        }

        self.terminate_session(state, &cp_id, TerminationCause::Complete, &mut dispatch);
        dispatch
    }

    pub(crate) fn on_end_charge(
        &self,
        state: &mut CoreState,
        driver_id: DriverId,
        cp_id: CpId,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let session_driver = state
            .cps
            .get(&cp_id)
            .map(|cp| cp.session.as_ref().map(|s| s.driver.clone()));
        match session_driver {
            None => {
                info!(driver = %driver_id, cp = %cp_id, "unplug for unknown CP");
                dispatch.send(conn, deny(&driver_id, &cp_id, reason::CP_NOT_FOUND));
                return dispatch;
            }
            Some(current) if current.as_ref() != Some(&driver_id) => {
                info!(driver = %driver_id, cp = %cp_id, "unplug from a driver not charging here");
                dispatch.send(conn, deny(&driver_id, &cp_id, reason::NOT_CURRENT_DRIVER));
                return dispatch;
            }
            Some(_) => {}
        }

        // A driver can unplug before the first meter tick arrives. Estimate
        // what the engine would have delivered from elapsed time against the
        // nominal full-session duration, clamped to the requested energy.
        if let Some(cp) = state.cps.get_mut(&cp_id) {
            let price = cp.price_per_kwh;
            if let Some(session) = cp.session.as_mut() {
                if session.energy_delivered <= 0.0 {
                    let fraction = (self.clock.elapsed_secs(session.started)
                        / self.config.nominal_session_secs)
                        .min(1.0);
                    session.energy_delivered = session.energy_requested * fraction;
                    session.accrued_amount = session.energy_delivered * price;
                }
            }
        }

        self.terminate_session(state, &cp_id, TerminationCause::Unplug, &mut dispatch);
        dispatch
    }
}
