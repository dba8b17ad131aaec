// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session-manager tests: full charging scenarios driven over in-process
//! connections, with a controllable clock.

mod charge;
mod interrupt;
mod registration;

use crate::audit::AuditPublisher;
use crate::registry::Connection;
use crate::session::{Central, SessionConfig};
use evc_core::{CpState, FakeClock};
use evc_storage::FileStore;
use evc_wire::{Drained, FrameBuffer, Inbound};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, ReadHalf, SimplexStream};

pub(crate) struct Harness {
    pub central: Arc<Central<FakeClock>>,
    pub clock: FakeClock,
    pub store: Arc<FileStore>,
    _dir: TempDir,
}

pub(crate) fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let clock = FakeClock::new();
    let central = Arc::new(Central::new(
        Arc::clone(&store),
        AuditPublisher::spawn(None),
        clock.clone(),
        SessionConfig::default(),
    ));
    Harness { central, clock, store, _dir: dir }
}

/// A fake agent endpoint: the Central holds the write half, the test reads
/// what was sent from the other end.
pub(crate) struct Peer {
    pub conn: Arc<Connection>,
    reader: ReadHalf<SimplexStream>,
    buf: FrameBuffer,
}

impl Peer {
    pub fn connect(name: &str) -> Self {
        let (reader, writer) = tokio::io::simplex(64 * 1024);
        let conn = Connection::new(name, Box::new(writer));
        Self { conn, reader, buf: FrameBuffer::new() }
    }

    /// Drain every frame already written to this peer.
    pub async fn recv(&mut self) -> Vec<Vec<String>> {
        let mut frames = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match tokio::time::timeout(Duration::from_millis(20), self.reader.read(&mut chunk))
                .await
            {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    self.buf.extend(&chunk[..n]);
                    for item in self.buf.drain().unwrap() {
                        match item {
                            Drained::Frame(fields) => frames.push(fields),
                            Drained::Corrupt(e) => panic!("corrupt frame sent to peer: {e}"),
                        }
                    }
                }
                Ok(Err(e)) => panic!("peer read failed: {e}"),
            }
        }
        frames
    }

    /// Next frame whose type field matches, panicking if none arrived.
    pub async fn expect(&mut self, kind: &str) -> Vec<String> {
        let frames = self.recv().await;
        frames
            .iter()
            .find(|f| f.first().map(String::as_str) == Some(kind))
            .cloned()
            .unwrap_or_else(|| panic!("no {kind} frame in {frames:?}"))
    }

    /// Assert nothing (of the given type) was sent.
    pub async fn expect_silence(&mut self) {
        let frames = self.recv().await;
        assert!(frames.is_empty(), "expected no frames, got {frames:?}");
    }
}

// ── flow helpers ─────────────────────────────────────────────────────────

pub(crate) async fn register_cp(h: &Harness, peer: &Peer, cp_id: &str, price: f64) {
    h.central
        .handle_inbound(
            Inbound::RegisterCp {
                cp_id: cp_id.into(),
                latitude: 40.5,
                longitude: -3.1,
                price_per_kwh: price,
            },
            &peer.conn,
        )
        .await;
}

pub(crate) async fn register_driver(h: &Harness, peer: &Peer, driver_id: &str) {
    h.central
        .handle_inbound(Inbound::RegisterDriver { driver_id: driver_id.into() }, &peer.conn)
        .await;
}

pub(crate) async fn register_monitor(h: &Harness, peer: &Peer, cp_id: &str) {
    h.central
        .handle_inbound(Inbound::RegisterMonitor { cp_id: cp_id.into() }, &peer.conn)
        .await;
}

pub(crate) async fn request_charge(
    h: &Harness,
    driver_peer: &Peer,
    driver_id: &str,
    cp_id: &str,
    energy: f64,
) {
    h.central
        .handle_inbound(
            Inbound::RequestCharge { driver_id: driver_id.into(), cp_id: cp_id.into(), energy },
            &driver_peer.conn,
        )
        .await;
}

pub(crate) async fn supply_update(h: &Harness, cp_id: &str, increment: f64, amount: f64) {
    h.central
        .handle_inbound(
            Inbound::SupplyUpdate {
                cp_id: cp_id.into(),
                energy_increment: increment,
                running_amount: amount,
            },
            &Peer::connect("unused").conn,
        )
        .await;
}

pub(crate) fn cp_state(h: &Harness, cp_id: &str) -> CpState {
    h.central
        .cps_snapshot()
        .into_iter()
        .find(|cp| cp.cp_id.as_str() == cp_id)
        .unwrap_or_else(|| panic!("no CP {cp_id} in snapshot"))
        .state
}
