// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `evcd` — the EV charging Central coordinator daemon.

use evc_central::lifecycle::{self, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("EVC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "central failed");
        std::process::exit(1);
    }
}
