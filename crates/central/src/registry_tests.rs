// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use evc_wire::{Drained, FrameBuffer};
use tokio::io::AsyncReadExt;

fn sink_conn() -> Arc<Connection> {
    Connection::new("test", Box::new(tokio::io::sink()))
}

#[tokio::test]
async fn send_writes_one_decodable_frame() {
    let (client, server) = tokio::io::duplex(1024);
    let (_, write_half) = tokio::io::split(server);
    let conn = Connection::new("peer", Box::new(write_half));

    conn.send(&Outbound::StopCommand { cp_id: CpId::new("CP-001") }).await.unwrap();

    let (mut read_half, _keep_alive) = tokio::io::split(client);
    let mut chunk = [0u8; 256];
    let n = read_half.read(&mut chunk).await.unwrap();

    let mut buf = FrameBuffer::new();
    buf.extend(&chunk[..n]);
    let drained = buf.drain().unwrap();
    assert_eq!(
        drained,
        vec![Drained::Frame(vec!["STOP_COMMAND".to_string(), "CP-001".to_string()])]
    );
}

#[tokio::test]
async fn rebind_is_last_writer_wins() {
    let mut connections = Connections::default();
    let first = sink_conn();
    let second = sink_conn();

    connections.bind_entity("CP-001", &first);
    connections.bind_entity("CP-001", &second);

    let bound = connections.entity("CP-001").unwrap();
    assert_eq!(bound.serial(), second.serial());
}

#[tokio::test]
async fn remove_is_conditional_on_serial() {
    let mut connections = Connections::default();
    let old = sink_conn();
    let new = sink_conn();

    connections.bind_entity("CP-001", &old);
    // Fast reconnect supersedes the binding before the old worker tears down.
    connections.bind_entity("CP-001", &new);

    let removed = connections.remove_connection(old.serial());
    assert!(removed.is_empty(), "superseded binding must survive: {removed:?}");
    assert!(connections.entity("CP-001").is_some());

    let removed = connections.remove_connection(new.serial());
    assert_eq!(removed, vec!["CP-001".to_string()]);
    assert!(connections.entity("CP-001").is_none());
}

#[tokio::test]
async fn monitors_do_not_collide_with_the_engine_binding() {
    let mut connections = Connections::default();
    let engine = sink_conn();
    let monitor = sink_conn();
    let cp = CpId::new("CP-001");

    connections.bind_entity("CP-001", &engine);
    connections.bind_monitor(&cp, &monitor);

    assert_eq!(connections.entity("CP-001").unwrap().serial(), engine.serial());
    assert_eq!(connections.monitor(&cp).unwrap().serial(), monitor.serial());

    connections.remove_connection(monitor.serial());
    assert!(connections.monitor(&cp).is_none());
    assert!(connections.entity("CP-001").is_some());
}
