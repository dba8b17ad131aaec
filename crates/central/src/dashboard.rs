// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic dashboard printer.
//!
//! The one intentional stdout surface: a fleet snapshot every couple of
//! seconds, also reused by the console `list` command.

use crate::session::Central;
use evc_core::Clock;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Render the CP and driver tables.
pub fn render<C: Clock>(central: &Central<C>) -> String {
    let cps = central.cps_snapshot();
    let drivers = central.drivers_snapshot();

    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<13} {:<8} {:>9} {:>9} {:>8}", "CP", "STATE", "DRIVER", "KWH", "REQ", "EUR");
    for cp in &cps {
        let _ = writeln!(
            out,
            "{:<10} {:<13} {:<8} {:>9} {:>9} {:>8}",
            cp.cp_id.as_str(),
            cp.state.to_string(),
            cp.driver_id.as_ref().map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            cp.energy_delivered.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
            cp.energy_requested.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
            cp.accrued_amount.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<10} {:<11} {:<10} {:>8} {:>10}", "DRIVER", "STATUS", "CP", "CHARGES", "SPENT");
    for driver in &drivers {
        let _ = writeln!(
            out,
            "{:<10} {:<11} {:<10} {:>8} {:>10.2}",
            driver.driver_id.as_str(),
            driver.status.to_string(),
            driver.current_cp.as_ref().map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            driver.total_charges,
            driver.total_spent,
        );
    }
    out
}

/// Print a snapshot every `interval` until shutdown.
pub async fn run<C: Clock>(
    central: Arc<Central<C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                println!("{}", render(&central));
            }
        }
    }
}
