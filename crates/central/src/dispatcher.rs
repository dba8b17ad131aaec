// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection protocol worker.
//!
//! One worker owns the read side of each accepted connection and a frame
//! buffer: read, drain as many complete frames as the buffer holds, parse,
//! route to the session manager. The write side is driven by the session
//! manager through the connection registry.

use crate::registry::Connection;
use crate::session::Central;
use evc_core::Clock;
use evc_wire::{Drained, FrameBuffer, Inbound};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run one connection to completion. Returns when the peer closes, the
/// framing becomes irrecoverable, or shutdown is signalled.
pub async fn run_connection<C, R>(
    central: Arc<Central<C>>,
    mut reader: R,
    conn: Arc<Connection>,
    cancel: CancellationToken,
    read_timeout: Duration,
) where
    C: Clock,
    R: AsyncRead + Unpin,
{
    let mut buffer = FrameBuffer::new();
    let mut chunk = [0u8; 4096];

    loop {
        if cancel.is_cancelled() {
            debug!(peer = %conn.peer(), "shutdown, closing connection");
            break;
        }

        // A timeout is only a poll point for the cancel flag.
        let n = match tokio::time::timeout(read_timeout, reader.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Ok(0)) => {
                debug!(peer = %conn.peer(), "peer closed");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(peer = %conn.peer(), error = %e, "read failed");
                break;
            }
        };

        buffer.extend(&chunk[..n]);
        let drained = match buffer.drain() {
            Ok(drained) => drained,
            Err(e) => {
                warn!(peer = %conn.peer(), error = %e, "framing irrecoverable, dropping connection");
                break;
            }
        };

        for item in drained {
            match item {
                Drained::Frame(fields) => match Inbound::parse(&fields) {
                    Ok(msg) => central.handle_inbound(msg, &conn).await,
                    Err(e) => {
                        warn!(peer = %conn.peer(), error = %e, "dropping frame");
                    }
                },
                Drained::Corrupt(e) => {
                    warn!(peer = %conn.peer(), error = %e, "skipping corrupt frame");
                }
            }
        }
    }

    central.connection_closed(&conn);
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
