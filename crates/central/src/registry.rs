// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live connections and the entity-to-connection index.
//!
//! Three logical name-spaces share the index: CP ids and driver ids live in
//! one map (they are disjoint token sets chosen by the agents), monitor
//! bindings live in a second map keyed by the monitored CP so they cannot
//! collide with the CP engine's own binding.

use evc_core::CpId;
use evc_wire::Outbound;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// One accepted socket's write side.
///
/// Every outbound write holds the connection's own lock for the whole
/// frame, so fan-out from different workers cannot interleave bytes on one
/// socket. The core state mutex is never held around `send`.
pub struct Connection {
    serial: u64,
    peer: String,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl Connection {
    pub fn new(peer: impl Into<String>, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Arc<Self> {
        Arc::new(Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            peer: peer.into(),
            writer: tokio::sync::Mutex::new(writer),
        })
    }

    /// Process-unique serial, used for ABA-safe unbinding.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write one framed message. A failure is a policy outcome for the
    /// caller to log, never a panic.
    pub async fn send(&self, msg: &Outbound) -> std::io::Result<()> {
        let bytes = msg.encode();
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("serial", &self.serial)
            .field("peer", &self.peer)
            .finish()
    }
}

/// Entity-id → connection index. Owned by the core state mutex.
#[derive(Debug, Default)]
pub struct Connections {
    entities: HashMap<String, Arc<Connection>>,
    monitors: HashMap<CpId, Arc<Connection>>,
}

impl Connections {
    /// Bind an entity id. Last writer wins: a prior binding is silently
    /// replaced and its socket will observe EOF or a write error on its own.
    pub fn bind_entity(&mut self, id: impl Into<String>, conn: &Arc<Connection>) {
        self.entities.insert(id.into(), Arc::clone(conn));
    }

    pub fn bind_monitor(&mut self, cp_id: &CpId, conn: &Arc<Connection>) {
        self.monitors.insert(cp_id.clone(), Arc::clone(conn));
    }

    pub fn entity(&self, id: &str) -> Option<Arc<Connection>> {
        self.entities.get(id).cloned()
    }

    pub fn monitor(&self, cp_id: &CpId) -> Option<Arc<Connection>> {
        self.monitors.get(cp_id).cloned()
    }

    /// Drop every binding still pointing at this socket. A binding already
    /// superseded by a fast reconnect is left alone.
    pub fn remove_connection(&mut self, serial: u64) -> Vec<String> {
        let mut removed: Vec<String> = Vec::new();
        self.entities.retain(|id, conn| {
            if conn.serial() == serial {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });
        self.monitors.retain(|cp_id, conn| {
            if conn.serial() == serial {
                removed.push(format!("monitor:{cp_id}"));
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
