// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup, supervision, and the shutdown coordinator.

use crate::audit::AuditPublisher;
use crate::session::{Central, SessionConfig};
use crate::{console, dashboard, env, http, listener, poller};
use evc_core::SystemClock;
use evc_storage::{FileStore, StorageError};
use fs2::FileExt;
use std::io::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// All runtime configuration, resolved once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub registry_url: Option<String>,
    pub registry_poll: Duration,
    pub nominal_session_secs: f64,
    pub dashboard_interval: Duration,
    pub audit_url: Option<String>,
    pub read_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::listen_addr(),
            http_addr: env::http_addr(),
            data_dir: env::data_dir(),
            registry_url: env::registry_url(),
            registry_poll: env::registry_poll_interval(),
            nominal_session_secs: env::nominal_session_secs(),
            dashboard_interval: env::dashboard_interval(),
            audit_url: env::audit_url(),
            read_timeout: env::read_timeout(),
        }
    }
}

/// The only fatal conditions: bind failure, lock contention, and a broken
/// data directory. Everything after startup is a logged, contained outcome.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),

    #[error("another Central instance holds {0}")]
    Locked(PathBuf),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the Central until operator `quit` or Ctrl-C.
pub async fn run(config: Config) -> Result<(), LifecycleError> {
    // Store first: it creates the data directory the lock lives in.
    let store = Arc::new(FileStore::open(&config.data_dir)?);

    // Single instance per data directory. Open without truncating so a
    // losing contender cannot wipe the winner's PID.
    let lock_path = config.data_dir.join("central.lock");
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::Locked(lock_path.clone()))?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let audit = AuditPublisher::spawn(config.audit_url.clone());
    let central = Arc::new(Central::new(
        Arc::clone(&store),
        audit,
        SystemClock,
        SessionConfig { nominal_session_secs: config.nominal_session_secs },
    ));

    let loaded = store.load()?;
    info!(cps = loaded.cps.len(), drivers = loaded.drivers.len(), "state loaded");
    central.seed(loaded);

    // Bind last, after everything that can fail has.
    let agent_listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| LifecycleError::Bind(config.listen_addr, e))?;
    let http_listener = TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| LifecycleError::Bind(config.http_addr, e))?;
    info!(agents = %config.listen_addr, http = %config.http_addr, "central listening");

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let mut tasks = vec![
        tokio::spawn(listener::run(
            agent_listener,
            Arc::clone(&central),
            cancel.clone(),
            config.read_timeout,
        )),
        tokio::spawn(http::serve(http_listener, Arc::clone(&central), cancel.clone())),
        tokio::spawn(dashboard::run(
            Arc::clone(&central),
            config.dashboard_interval,
            cancel.clone(),
        )),
        tokio::spawn(console::run(Arc::clone(&central), cancel.clone())),
    ];
    match config.registry_url.clone() {
        Some(url) => tasks.push(tokio::spawn(poller::run(
            Arc::clone(&central),
            url,
            config.registry_poll,
            cancel.clone(),
        ))),
        None => info!("no registry URL configured, reconciliation disabled"),
    }

    cancel.cancelled().await;

    // Workers drain on their next read poll; the supervisory tasks exit on
    // the token. Then flush the keyed tables one last time.
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "task ended abnormally");
        }
    }
    central.flush().await;
    info!("shutdown complete");
    Ok(())
}
