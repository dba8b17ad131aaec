// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget audit event publishing.
//!
//! The Central produces a best-effort event stream for external consumers
//! and never consumes it. Publishing must never block a session decision:
//! events go through a bounded channel with `try_send`, and the drain task
//! posts them (or logs them when no sink is configured). Failure to publish
//! never affects session state.

use evc_core::AuditEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AuditPublisher {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditPublisher {
    /// Spawn the drain task and hand back the publisher handle.
    pub fn spawn(sink_url: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(drain(rx, sink_url));
        Self { tx }
    }

    /// Enqueue one event. A full channel drops the event with a log line.
    pub fn publish(&self, event: AuditEvent) {
        if self.tx.try_send(event).is_err() {
            debug!("audit channel full or closed, dropping event");
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<AuditEvent>, sink_url: Option<String>) {
    let client = reqwest::Client::new();
    while let Some(event) = rx.recv().await {
        match &sink_url {
            Some(url) => {
                if let Err(e) = client.post(url).json(&event).send().await {
                    warn!(error = %e, "audit publish failed, event dropped");
                }
            }
            None => match serde_json::to_string(&event) {
                Ok(json) => debug!(event = %json, "audit"),
                Err(e) => warn!(error = %e, "unencodable audit event"),
            },
        }
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
