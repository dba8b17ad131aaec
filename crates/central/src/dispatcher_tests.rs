// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::audit::AuditPublisher;
use crate::session::SessionConfig;
use evc_core::{CpState, SystemClock};
use evc_storage::FileStore;
use evc_wire::encode;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, DuplexStream, WriteHalf};

fn test_central() -> (Arc<Central<SystemClock>>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let central = Arc::new(Central::new(
        store,
        AuditPublisher::spawn(None),
        SystemClock,
        SessionConfig::default(),
    ));
    (central, dir)
}

struct Worker {
    client: DuplexStream,
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

fn spawn_worker(central: &Arc<Central<SystemClock>>) -> Worker {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = tokio::io::split(server);
    let server_write: WriteHalf<DuplexStream> = server_write;
    let conn = Connection::new("test-peer", Box::new(server_write));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_connection(
        Arc::clone(central),
        server_read,
        conn,
        cancel.clone(),
        Duration::from_millis(20),
    ));
    Worker { client, handle, cancel }
}

async fn read_frames(client: &mut DuplexStream) -> Vec<Vec<String>> {
    let mut buf = FrameBuffer::new();
    let mut frames = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match tokio::time::timeout(Duration::from_millis(100), client.read(&mut chunk)).await {
            Err(_) | Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                buf.extend(&chunk[..n]);
                for item in buf.drain().unwrap() {
                    match item {
                        Drained::Frame(fields) => frames.push(fields),
                        Drained::Corrupt(e) => panic!("corrupt reply: {e}"),
                    }
                }
                if !frames.is_empty() {
                    break;
                }
            }
            Ok(Err(e)) => panic!("client read failed: {e}"),
        }
    }
    frames
}

#[tokio::test]
async fn frames_split_across_chunks_dispatch_in_order() {
    // S6 through the real worker: two frames over three arbitrary chunks.
    let (central, _dir) = test_central();
    let mut worker = spawn_worker(&central);

    let mut bytes = encode(&["REGISTER", "CP", "C1", "40.5", "-3.1", "0.3"]);
    bytes.extend(encode(&["HEARTBEAT", "C1", "OUT_OF_ORDER"]));

    let cuts = [5, bytes.len() - 3];
    worker.client.write_all(&bytes[..cuts[0]]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    worker.client.write_all(&bytes[cuts[0]..cuts[1]]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    worker.client.write_all(&bytes[cuts[1]..]).await.unwrap();

    let frames = read_frames(&mut worker.client).await;
    assert_eq!(frames[0], vec!["ACKNOWLEDGE", "C1", "OK"]);

    // The heartbeat landed after the registration: the CP ended OutOfOrder.
    let state = central
        .cps_snapshot()
        .into_iter()
        .find(|cp| cp.cp_id.as_str() == "C1")
        .unwrap()
        .state;
    assert_eq!(state, CpState::OutOfOrder);

    worker.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn protocol_errors_keep_the_connection_up() {
    let (central, _dir) = test_central();
    let mut worker = spawn_worker(&central);

    // Unknown type, then a short REGISTER, then a valid one.
    let mut bytes = encode(&["SELF_DESTRUCT", "C1"]);
    bytes.extend(encode(&["REGISTER", "CP", "C1"]));
    bytes.extend(encode(&["REGISTER", "CP", "C1", "40.5", "-3.1", "0.3"]));
    worker.client.write_all(&bytes).await.unwrap();

    let frames = read_frames(&mut worker.client).await;
    assert_eq!(frames, vec![vec!["ACKNOWLEDGE", "C1", "OK"]]);

    worker.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn corrupt_frames_are_skipped_without_losing_the_stream() {
    let (central, _dir) = test_central();
    let mut worker = spawn_worker(&central);

    let mut bytes = encode(&["REGISTER", "CP", "C1", "40.5", "-3.1", "0.3"]);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff; // break the LRC
    bytes.extend(encode(&["REGISTER", "CP", "C2", "41.0", "-3.7", "0.25"]));
    worker.client.write_all(&bytes).await.unwrap();

    let frames = read_frames(&mut worker.client).await;
    assert_eq!(frames, vec![vec!["ACKNOWLEDGE", "C2", "OK"]]);
    assert!(central.cps_snapshot().iter().all(|cp| cp.cp_id.as_str() != "C1"));

    worker.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn eof_tears_the_worker_down() {
    let (central, _dir) = test_central();
    let worker = spawn_worker(&central);

    drop(worker.client);
    tokio::time::timeout(Duration::from_secs(1), worker.handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_interrupts_an_idle_worker_promptly() {
    let (central, _dir) = test_central();
    let worker = spawn_worker(&central);

    worker.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker.handle).await.unwrap().unwrap();
}
