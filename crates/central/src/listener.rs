// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent TCP listener: accepts connections and spawns one dispatch worker
//! per socket, without blocking the accept loop.

use crate::dispatcher;
use crate::registry::Connection;
use crate::session::Central;
use evc_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the accept loop until shutdown.
pub async fn run<C: Clock>(
    listener: TcpListener,
    central: Arc<Central<C>>,
    cancel: CancellationToken,
    read_timeout: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("listener shutting down");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    let (reader, writer) = stream.into_split();
                    let conn = Connection::new(addr.to_string(), Box::new(writer));
                    info!(peer = %addr, serial = conn.serial(), "connection accepted");
                    tokio::spawn(dispatcher::run_connection(
                        Arc::clone(&central),
                        reader,
                        conn,
                        cancel.clone(),
                        read_timeout,
                    ));
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}
