// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session interruption and administrative transitions: fault/recovery,
//! heartbeat, operator stop/resume, weather hold/clear, registry
//! reconciliation, and the single consolidated terminator.

use super::{deny, Central, CentralError, CoreState, Dispatch};
use crate::poller::RegistryCp;
use chrono::Utc;
use evc_core::{
    AuditEvent, ChargingPoint, Clock, CpId, CpState, HistoryRecord, TerminationCause, WeatherAlert,
};
use evc_wire::{reason, Outbound};
use std::collections::HashSet;
use tracing::{debug, info, warn};

impl<C: Clock> Central<C> {
    /// The only code path that ends a session.
    ///
    /// Settles the CP into the cause's target state, appends exactly one
    /// history record, updates the driver's cumulative counters, and fans
    /// out the driver ticket (or the fault DENY), the monitor DRIVER_STOP,
    /// and — for an unplug — END_SUPPLY to the engine. A CP with no
    /// running session makes this a no-op: a losing terminator racing a
    /// finished one must not double-append.
    pub(crate) fn terminate_session(
        &self,
        state: &mut CoreState,
        cp_id: &CpId,
        cause: TerminationCause,
        dispatch: &mut Dispatch,
    ) {
        let next_state = match cause {
            TerminationCause::Complete
            | TerminationCause::Unplug
            | TerminationCause::Superseded
            | TerminationCause::Deregistered => CpState::Activated,
            TerminationCause::Fault | TerminationCause::Weather => CpState::OutOfOrder,
            TerminationCause::OperatorStop => CpState::Stopped,
        };

        let session = {
            let Some(cp) = state.cps.get_mut(cp_id) else {
                return;
            };
            if cp.session.is_none() {
                return;
            }
            cp.end_session(next_state)
        };
        let Some(session) = session else {
            return;
        };

        let delivered = session.energy_delivered;
        let amount = session.accrued_amount;
        let duration = self.clock.elapsed_secs(session.started);
        let driver_id = session.driver;

        info!(
            cp = %cp_id,
            driver = %driver_id,
            %cause,
            kwh = delivered,
            amount,
            duration_secs = duration,
            "session terminated",
        );

        if let Some(driver) = state.drivers.get_mut(&driver_id) {
            if driver.current_cp.as_ref() == Some(cp_id) {
                driver.finish_charging(amount);
            }
        }

        dispatch.history = Some(HistoryRecord {
            timestamp: Utc::now(),
            cp_id: cp_id.clone(),
            driver_id: driver_id.clone(),
            kwh_delivered: delivered,
            total_amount: amount,
            duration_seconds: duration,
        });

        if cause.is_emergency() {
            dispatch.send_entity(
                state,
                driver_id.as_str(),
                deny(&driver_id, cp_id, reason::CP_FAULT_EMERGENCY_STOP),
            );
        } else {
            dispatch.send_entity(
                state,
                driver_id.as_str(),
                Outbound::Ticket {
                    cp_id: cp_id.clone(),
                    total_energy: delivered,
                    total_amount: amount,
                },
            );
        }
        if cause == TerminationCause::Unplug {
            dispatch.send_entity(state, cp_id.as_str(), Outbound::EndSupply { cp_id: cp_id.clone() });
        }
        dispatch.send_monitor(
            state,
            cp_id,
            Outbound::DriverStop { cp_id: cp_id.clone(), driver_id: driver_id.clone() },
        );

        dispatch.events.push(AuditEvent::ChargeCompleted {
            cp_id: cp_id.clone(),
            driver_id,
            kwh_delivered: delivered,
            total_amount: amount,
            cause: cause.to_string(),
        });
        dispatch.persist_cps = true;
        dispatch.persist_drivers = true;
    }

    // ── monitor signals ──────────────────────────────────────────────────

    pub(crate) fn on_fault(&self, state: &mut CoreState, cp_id: CpId) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let supplying = match state.cps.get(&cp_id) {
            None => {
                warn!(cp = %cp_id, "fault for unknown CP, dropping");
                return dispatch;
            }
            Some(cp) => cp.session.is_some(),
        };

        if supplying {
            self.terminate_session(state, &cp_id, TerminationCause::Fault, &mut dispatch);
        } else if let Some(cp) = state.cps.get_mut(&cp_id) {
            cp.state = CpState::OutOfOrder;
        }

        info!(cp = %cp_id, "CP out of order");
        dispatch.persist_cps = true;
        dispatch.events.push(AuditEvent::CpFault { cp_id });
        dispatch
    }

    pub(crate) fn on_recovery(&self, state: &mut CoreState, cp_id: CpId) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let Some(cp) = state.cps.get_mut(&cp_id) else {
            warn!(cp = %cp_id, "recovery for unknown CP, dropping");
            return dispatch;
        };
        if cp.state != CpState::OutOfOrder {
            debug!(cp = %cp_id, state = %cp.state, "recovery ignored, CP not out of order");
            return dispatch;
        }

        cp.state = CpState::Activated;
        info!(cp = %cp_id, "CP recovered");
        dispatch.persist_cps = true;
        dispatch.events.push(AuditEvent::CpRecovered { cp_id });
        dispatch
    }

    /// A heartbeat only updates state when the CP is not Supplying — a
    /// Supplying CP's state belongs to the session manager, not to the CP's
    /// own report. A reported `SUPPLYING` is never accepted: there is no
    /// session to back it.
    pub(crate) fn on_heartbeat(
        &self,
        state: &mut CoreState,
        cp_id: CpId,
        reported: CpState,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let Some(cp) = state.cps.get_mut(&cp_id) else {
            debug!(cp = %cp_id, "heartbeat from unknown CP, dropping");
            return dispatch;
        };
        if cp.state == CpState::Supplying || reported == CpState::Supplying {
            debug!(cp = %cp_id, reported = %reported, "heartbeat ignored");
            return dispatch;
        }
        if cp.state != reported {
            debug!(cp = %cp_id, from = %cp.state, to = %reported, "heartbeat state change");
            cp.state = reported;
            dispatch.persist_cps = true;
        }
        dispatch
    }

    // ── operator commands ────────────────────────────────────────────────

    pub async fn operator_stop(&self, cp_id: &CpId) -> Result<(), CentralError> {
        self.decide(|state, dispatch| {
            let supplying = match state.cps.get(cp_id) {
                None => return Err(CentralError::UnknownCp(cp_id.clone())),
                Some(cp) => cp.session.is_some(),
            };

            if supplying {
                self.terminate_session(state, cp_id, TerminationCause::OperatorStop, dispatch);
            } else if let Some(cp) = state.cps.get_mut(cp_id) {
                cp.state = CpState::Stopped;
            }

            info!(cp = %cp_id, "operator stop");
            dispatch.send_entity(state, cp_id.as_str(), Outbound::StopCommand {
                cp_id: cp_id.clone(),
            });
            dispatch.persist_cps = true;
            dispatch.events.push(AuditEvent::CpStopped { cp_id: cp_id.clone() });
            Ok(())
        })
        .await
    }

    pub async fn operator_resume(&self, cp_id: &CpId) -> Result<(), CentralError> {
        self.decide(|state, dispatch| {
            let Some(cp) = state.cps.get_mut(cp_id) else {
                return Err(CentralError::UnknownCp(cp_id.clone()));
            };
            if cp.state != CpState::Stopped {
                info!(cp = %cp_id, state = %cp.state, "resume ignored, CP not stopped");
                return Ok(());
            }

            cp.state = CpState::Activated;
            info!(cp = %cp_id, "operator resume");
            dispatch.send_entity(state, cp_id.as_str(), Outbound::ResumeCommand {
                cp_id: cp_id.clone(),
            });
            dispatch.persist_cps = true;
            dispatch.events.push(AuditEvent::CpResumed { cp_id: cp_id.clone() });
            Ok(())
        })
        .await
    }

    // ── weather hooks ────────────────────────────────────────────────────

    /// The hold only moves an Activated or Supplying CP OutOfOrder; a
    /// Stopped CP keeps its operator stop (otherwise a later clear would
    /// release it behind the operator's back) and a Disconnected CP stays
    /// disconnected. The alert is recorded either way.
    pub async fn weather_alert(
        &self,
        cp_id: &CpId,
        location: &str,
        temperature: f64,
    ) -> Result<(), CentralError> {
        self.decide(|state, dispatch| {
            let supplying = match state.cps.get(cp_id) {
                None => return Err(CentralError::UnknownCp(cp_id.clone())),
                Some(cp) => cp.session.is_some(),
            };

            if supplying {
                self.terminate_session(state, cp_id, TerminationCause::Weather, dispatch);
            } else if let Some(cp) = state.cps.get_mut(cp_id) {
                if cp.state == CpState::Activated {
                    cp.state = CpState::OutOfOrder;
                }
            }

            let alert =
                WeatherAlert::new(cp_id.clone(), location.to_string(), temperature, Utc::now());
            info!(cp = %cp_id, location, temperature, "weather hold");
            state.weather.retain(|a| a.cp_id != *cp_id);
            state.weather.push(alert);

            dispatch.persist_cps = true;
            dispatch.events.push(AuditEvent::WeatherAlert {
                cp_id: cp_id.clone(),
                location: location.to_string(),
                temperature,
            });
            Ok(())
        })
        .await
    }

    /// Clears the alert record unconditionally, but only an OutOfOrder CP
    /// returns to Activated — weather cannot override an operator stop.
    pub async fn weather_clear(&self, cp_id: &CpId) -> Result<(), CentralError> {
        self.decide(|state, dispatch| {
            if !state.cps.contains_key(cp_id) {
                return Err(CentralError::UnknownCp(cp_id.clone()));
            }

            state.weather.retain(|a| a.cp_id != *cp_id);

            if let Some(cp) = state.cps.get_mut(cp_id) {
                if cp.state == CpState::OutOfOrder {
                    cp.state = CpState::Activated;
                    dispatch.persist_cps = true;
                }
            }

            info!(cp = %cp_id, "weather clear");
            dispatch.events.push(AuditEvent::WeatherClear { cp_id: cp_id.clone() });
            Ok(())
        })
        .await
    }

    // ── registry reconciliation ──────────────────────────────────────────

    /// Fold one registry listing into the local table: unknown CPs are
    /// inserted Disconnected (they activate when their engine registers),
    /// CPs gone from the registry are removed — the registry is the source
    /// of truth for CP existence, never for CP state.
    pub async fn reconcile_registry(&self, remote: &[RegistryCp]) {
        self.decide(|state, dispatch| {
            let known: HashSet<&str> = remote.iter().map(|r| r.cp_id.as_str()).collect();

            for row in remote {
                let id = CpId::new(row.cp_id.as_str());
                if state.cps.contains_key(&id) {
                    continue;
                }
                info!(cp = %id, "registry added CP");
                state.cps.insert(
                    id.clone(),
                    ChargingPoint::new(id, row.latitude, row.longitude, row.price_per_kwh, Utc::now()),
                );
                dispatch.persist_cps = true;
            }

            let gone: Vec<CpId> = state
                .cps
                .keys()
                .filter(|id| !known.contains(id.as_str()))
                .cloned()
                .collect();
            for id in gone {
                let supplying =
                    state.cps.get(&id).map(|cp| cp.session.is_some()).unwrap_or(false);
                if supplying {
                    warn!(cp = %id, "registry removed a CP mid-session");
                    self.terminate_session(state, &id, TerminationCause::Deregistered, dispatch);
                }
                info!(cp = %id, "registry removed CP");
                state.cps.remove(&id);
                state.weather.retain(|a| a.cp_id != id);
                dispatch.persist_cps = true;
            }
        })
        .await
    }
}
