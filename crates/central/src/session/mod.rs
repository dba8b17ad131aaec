// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session manager: the decision surface of the Central.
//!
//! Every operation follows the same discipline: take the core lock, decide
//! and mutate, collect the outbound message set and persistence work into a
//! [`Dispatch`], release the lock, then perform the sends. The core mutex
//! is never held across an `.await` or a socket write, so one slow peer
//! cannot head-of-line block the fleet.

mod charge;
mod interrupt;
mod snapshot;

pub use snapshot::{CpSnapshot, DriverSnapshot, StatusSnapshot};

use crate::audit::AuditPublisher;
use crate::registry::{Connection, Connections};
use chrono::Utc;
use evc_core::{
    AuditEvent, ChargingPoint, Clock, CpId, Driver, DriverId, HistoryRecord, WeatherAlert,
};
use evc_storage::{CpRow, DriverRow, FileStore, Loaded};
use evc_wire::{AvailableCp, Inbound, Outbound};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session manager tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Nominal duration of a full session, used to estimate delivered
    /// energy when a driver unplugs before any meter update arrived.
    pub nominal_session_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { nominal_session_secs: 14.0 }
    }
}

/// Errors surfaced to the HTTP hooks and the operator console.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CentralError {
    #[error("unknown CP: {0}")]
    UnknownCp(CpId),
}

/// All shared mutable state, guarded by one mutex.
#[derive(Default)]
pub(crate) struct CoreState {
    pub cps: HashMap<CpId, ChargingPoint>,
    pub drivers: HashMap<DriverId, Driver>,
    pub connections: Connections,
    pub weather: Vec<WeatherAlert>,
}

/// Work collected under the lock, performed after release.
#[derive(Default)]
pub(crate) struct Dispatch {
    sends: Vec<(Arc<Connection>, Outbound)>,
    history: Option<HistoryRecord>,
    persist_cps: bool,
    persist_drivers: bool,
    events: Vec<AuditEvent>,
}

impl Dispatch {
    pub fn send(&mut self, conn: &Arc<Connection>, msg: Outbound) {
        self.sends.push((Arc::clone(conn), msg));
    }

    /// Send to a bound entity if it has a live connection; a missing peer
    /// is a logged drop at dispatch time.
    pub fn send_entity(&mut self, state: &CoreState, id: &str, msg: Outbound) {
        match state.connections.entity(id) {
            Some(conn) => self.sends.push((conn, msg)),
            None => debug!(entity = id, kind = msg.kind(), "no connection, dropping message"),
        }
    }

    pub fn send_monitor(&mut self, state: &CoreState, cp_id: &CpId, msg: Outbound) {
        match state.connections.monitor(cp_id) {
            Some(conn) => self.sends.push((conn, msg)),
            None => debug!(cp = %cp_id, kind = msg.kind(), "no monitor, dropping message"),
        }
    }
}

/// The Central coordinator.
pub struct Central<C: Clock> {
    state: Mutex<CoreState>,
    store: Arc<FileStore>,
    audit: AuditPublisher,
    clock: C,
    config: SessionConfig,
}

impl<C: Clock> Central<C> {
    pub fn new(store: Arc<FileStore>, audit: AuditPublisher, clock: C, config: SessionConfig) -> Self {
        Self {
            state: Mutex::new(CoreState::default()),
            store,
            audit,
            clock,
            config,
        }
    }

    /// Seed state recovered from the store at startup.
    pub fn seed(&self, loaded: Loaded) {
        let mut state = self.state.lock();
        for cp in loaded.cps {
            state.cps.insert(cp.id.clone(), cp);
        }
        for driver in loaded.drivers {
            state.drivers.insert(driver.id.clone(), driver);
        }
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    /// Route one parsed inbound message from a connection worker.
    pub async fn handle_inbound(&self, msg: Inbound, conn: &Arc<Connection>) {
        let dispatch = {
            let mut state = self.state.lock();
            match msg {
                Inbound::RegisterCp { cp_id, latitude, longitude, price_per_kwh } => {
                    self.on_register_cp(&mut state, cp_id, latitude, longitude, price_per_kwh, conn)
                }
                Inbound::RegisterDriver { driver_id } => {
                    self.on_register_driver(&mut state, driver_id, conn)
                }
                Inbound::RegisterMonitor { cp_id } => {
                    self.on_register_monitor(&mut state, cp_id, conn)
                }
                Inbound::Heartbeat { cp_id, state: reported } => {
                    self.on_heartbeat(&mut state, cp_id, reported)
                }
                Inbound::QueryAvailable { driver_id } => {
                    self.on_query_available(&state, driver_id, conn)
                }
                Inbound::RequestCharge { driver_id, cp_id, energy } => {
                    self.on_request_charge(&mut state, driver_id, cp_id, energy, conn)
                }
                Inbound::SupplyUpdate { cp_id, energy_increment, running_amount } => {
                    self.on_supply_update(&mut state, cp_id, energy_increment, running_amount)
                }
                Inbound::SupplyEnd { cp_id, driver_id, total_energy, total_amount } => {
                    self.on_supply_end(&mut state, cp_id, driver_id, total_energy, total_amount)
                }
                Inbound::EndCharge { driver_id, cp_id } => {
                    self.on_end_charge(&mut state, driver_id, cp_id, conn)
                }
                Inbound::Fault { cp_id } => self.on_fault(&mut state, cp_id),
                Inbound::HealthKo { cp_id } => {
                    info!(cp = %cp_id, "monitor reported HEALTH_KO, treating as fault");
                    self.on_fault(&mut state, cp_id)
                }
                Inbound::Recovery { cp_id } => self.on_recovery(&mut state, cp_id),
                Inbound::HealthOk { cp_id } => {
                    debug!(cp = %cp_id, "monitor reported HEALTH_OK");
                    Dispatch::default()
                }
            }
        };
        self.run_dispatch(dispatch).await;
    }

    /// Connection worker teardown: drop any bindings still pointing at this
    /// socket. Peer loss alone never terminates a session — that is the
    /// monitor's FAULT or an operator action.
    pub fn connection_closed(&self, conn: &Arc<Connection>) {
        let removed = {
            let mut state = self.state.lock();
            state.connections.remove_connection(conn.serial())
        };
        if !removed.is_empty() {
            info!(peer = %conn.peer(), entities = ?removed, "connection unbound");
        }
    }

    // ── registration ─────────────────────────────────────────────────────

    fn on_register_cp(
        &self,
        state: &mut CoreState,
        cp_id: CpId,
        latitude: f64,
        longitude: f64,
        price_per_kwh: f64,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        // Reconnecting CPs always start fresh: a session left over from a
        // previous engine incarnation is settled before re-activation.
        if let Some(cp) = state.cps.get(&cp_id) {
            if cp.state == evc_core::CpState::Supplying {
                warn!(cp = %cp_id, "re-registration supersedes an in-flight session");
                self.terminate_session(
                    state,
                    &cp_id,
                    evc_core::TerminationCause::Superseded,
                    &mut dispatch,
                );
            }
        }

        let registered_at = Utc::now();
        let cp = state
            .cps
            .entry(cp_id.clone())
            .or_insert_with(|| {
                ChargingPoint::new(cp_id.clone(), latitude, longitude, price_per_kwh, registered_at)
            });
        cp.latitude = latitude;
        cp.longitude = longitude;
        cp.price_per_kwh = price_per_kwh;
        cp.state = evc_core::CpState::Activated;
        cp.session = None;

        state.connections.bind_entity(cp_id.as_str(), conn);

        info!(cp = %cp_id, lat = latitude, lon = longitude, price = price_per_kwh, "CP registered");
        dispatch.persist_cps = true;
        dispatch.events.push(AuditEvent::CpRegistered {
            cp_id: cp_id.clone(),
            latitude,
            longitude,
            price_per_kwh,
        });
        dispatch.send(conn, Outbound::AckOk { entity_id: cp_id.to_string() });
        dispatch
    }

    fn on_register_driver(
        &self,
        state: &mut CoreState,
        driver_id: DriverId,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();

        let registered_at = Utc::now();
        state
            .drivers
            .entry(driver_id.clone())
            .and_modify(Driver::reset)
            .or_insert_with(|| Driver::new(driver_id.clone(), registered_at));
        state.connections.bind_entity(driver_id.as_str(), conn);

        info!(driver = %driver_id, "driver registered");
        dispatch.persist_drivers = true;
        dispatch.events.push(AuditEvent::DriverRegistered { driver_id: driver_id.clone() });
        dispatch.send(conn, Outbound::AckOk { entity_id: driver_id.to_string() });
        dispatch
    }

    fn on_register_monitor(
        &self,
        state: &mut CoreState,
        cp_id: CpId,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();
        state.connections.bind_monitor(&cp_id, conn);
        info!(cp = %cp_id, "monitor registered");
        dispatch.send(conn, Outbound::AckMonitor { cp_id });
        dispatch
    }

    // ── queries ──────────────────────────────────────────────────────────

    fn on_query_available(
        &self,
        state: &CoreState,
        driver_id: DriverId,
        conn: &Arc<Connection>,
    ) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let mut cps: Vec<AvailableCp> = state
            .cps
            .values()
            .filter(|cp| cp.is_available())
            .map(|cp| AvailableCp {
                cp_id: cp.id.clone(),
                latitude: cp.latitude,
                longitude: cp.longitude,
                price_per_kwh: cp.price_per_kwh,
            })
            .collect();
        cps.sort_by(|a, b| a.cp_id.cmp(&b.cp_id));

        debug!(driver = %driver_id, count = cps.len(), "available CPs queried");
        dispatch.send(conn, Outbound::AvailableCps { cps });
        dispatch
    }

    // ── dispatch execution ───────────────────────────────────────────────

    /// Perform the work collected under the lock: persistence first (row
    /// snapshots taken under a short re-lock), then audit, then the sends.
    pub(crate) async fn run_dispatch(&self, dispatch: Dispatch) {
        if dispatch.persist_cps || dispatch.persist_drivers {
            let (cp_rows, driver_rows) = {
                let state = self.state.lock();
                let cp_rows: Vec<CpRow> = if dispatch.persist_cps {
                    let mut rows: Vec<CpRow> = state.cps.values().map(CpRow::from).collect();
                    rows.sort_by(|a, b| a.cp_id.cmp(&b.cp_id));
                    rows
                } else {
                    Vec::new()
                };
                let driver_rows: Vec<DriverRow> = if dispatch.persist_drivers {
                    let mut rows: Vec<DriverRow> =
                        state.drivers.values().map(DriverRow::from).collect();
                    rows.sort_by(|a, b| a.driver_id.cmp(&b.driver_id));
                    rows
                } else {
                    Vec::new()
                };
                (cp_rows, driver_rows)
            };

            if dispatch.persist_cps {
                if let Err(e) = self.store.save_cps(&cp_rows) {
                    warn!(error = %e, "failed to persist CP table");
                }
            }
            if dispatch.persist_drivers {
                if let Err(e) = self.store.save_drivers(&driver_rows) {
                    warn!(error = %e, "failed to persist driver table");
                }
            }
        }

        if let Some(record) = &dispatch.history {
            if let Err(e) = self.store.append_history(record) {
                warn!(error = %e, "failed to append history record");
            }
        }

        for event in dispatch.events {
            self.audit.publish(event);
        }

        for (conn, msg) in dispatch.sends {
            if let Err(e) = conn.send(&msg).await {
                warn!(peer = %conn.peer(), kind = msg.kind(), error = %e, "send failed, dropping");
            }
        }
    }

    /// Run a decision closure under the core lock, then execute its
    /// dispatch. Shared by the HTTP hooks, console, and poller surfaces.
    pub(crate) async fn decide<T>(
        &self,
        f: impl FnOnce(&mut CoreState, &mut Dispatch) -> T,
    ) -> T {
        let (out, dispatch) = {
            let mut state = self.state.lock();
            let mut dispatch = Dispatch::default();
            let out = f(&mut state, &mut dispatch);
            (out, dispatch)
        };
        self.run_dispatch(dispatch).await;
        out
    }

    /// Flush both keyed tables; called by the shutdown coordinator.
    pub async fn flush(&self) {
        let dispatch = Dispatch {
            persist_cps: true,
            persist_drivers: true,
            ..Dispatch::default()
        };
        self.run_dispatch(dispatch).await;
    }
}

/// DENY helper shared by the charge and interrupt ops.
pub(crate) fn deny(driver_id: &DriverId, cp_id: &CpId, why: impl Into<String>) -> Outbound {
    Outbound::Deny {
        driver_id: driver_id.clone(),
        cp_id: cp_id.clone(),
        reason: why.into(),
    }
}

#[cfg(test)]
#[path = "../session_tests/mod.rs"]
mod tests;
