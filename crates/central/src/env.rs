// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the Central daemon.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

/// Agent TCP listener address (`EVC_LISTEN_ADDR`, default 0.0.0.0:5000).
pub fn listen_addr() -> SocketAddr {
    parsed("EVC_LISTEN_ADDR").unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 5000)))
}

/// HTTP API address (`EVC_HTTP_ADDR`, default 0.0.0.0:8080).
pub fn http_addr() -> SocketAddr {
    parsed("EVC_HTTP_ADDR").unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

/// Data directory for the store and the instance lock (`EVC_DATA_DIR`).
pub fn data_dir() -> PathBuf {
    std::env::var("EVC_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data"))
}

/// Registry base URL. Unset disables the reconciliation poller.
pub fn registry_url() -> Option<String> {
    std::env::var("EVC_REGISTRY_URL").ok().filter(|s| !s.is_empty())
}

/// Registry poll interval (`EVC_REGISTRY_POLL_SECS`, default 10s).
pub fn registry_poll_interval() -> Duration {
    Duration::from_secs(parsed("EVC_REGISTRY_POLL_SECS").unwrap_or(10))
}

/// Nominal full-session duration used by the unplug estimator
/// (`EVC_NOMINAL_SESSION_SECS`, default 14).
pub fn nominal_session_secs() -> f64 {
    parsed("EVC_NOMINAL_SESSION_SECS").unwrap_or(14.0)
}

/// Dashboard snapshot interval (`EVC_DASHBOARD_SECS`, default 2s).
pub fn dashboard_interval() -> Duration {
    Duration::from_secs(parsed("EVC_DASHBOARD_SECS").unwrap_or(2))
}

/// Audit event sink URL. Unset logs events at debug instead.
pub fn audit_url() -> Option<String> {
    std::env::var("EVC_AUDIT_URL").ok().filter(|s| !s.is_empty())
}

/// Dispatcher read poll (`EVC_READ_TIMEOUT_MS`, default 500ms). A read
/// timeout is not an error — it is the shutdown-poll point.
pub fn read_timeout() -> Duration {
    Duration::from_millis(parsed("EVC_READ_TIMEOUT_MS").unwrap_or(500))
}
