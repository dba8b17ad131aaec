// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator command console, line-oriented on stdin.

use crate::dashboard;
use crate::session::Central;
use evc_core::{Clock, CpId};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const HELP: &str = "\
commands:
  stop <cp_id>     stop a charging point (terminates any running session)
  resume <cp_id>   resume a stopped charging point
  list             print the fleet snapshot
  history          print recent completed sessions
  help             this text
  quit             shut the Central down";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop(CpId),
    Resume(CpId),
    List,
    History,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` is an empty line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let command = match (head, arg) {
            ("stop", Some(id)) => Command::Stop(CpId::new(id)),
            ("resume", Some(id)) => Command::Resume(CpId::new(id)),
            ("stop" | "resume", None) => return Err(format!("usage: {head} <cp_id>")),
            ("list", _) => Command::List,
            ("history", _) => Command::History,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => return Err(format!("unknown command: {head} (try `help`)")),
        };
        Ok(Some(command))
    }
}

/// Read operator commands until `quit`, EOF, or shutdown.
pub async fn run<C: Clock>(central: Arc<Central<C>>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if execute(&central, &cancel, line.trim()).await.is_break() {
                        break;
                    }
                }
                // stdin closed (detached run): the console ends, the
                // Central keeps serving.
                Ok(None) => {
                    debug!("stdin closed, console exiting");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "console read failed");
                    break;
                }
            }
        }
    }
}

async fn execute<C: Clock>(
    central: &Arc<Central<C>>,
    cancel: &CancellationToken,
    line: &str,
) -> ControlFlow<()> {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return ControlFlow::Continue(()),
        Err(message) => {
            println!("{message}");
            return ControlFlow::Continue(());
        }
    };

    match command {
        Command::Stop(cp_id) => match central.operator_stop(&cp_id).await {
            Ok(()) => println!("stopped {cp_id}"),
            Err(e) => println!("{e}"),
        },
        Command::Resume(cp_id) => match central.operator_resume(&cp_id).await {
            Ok(()) => println!("resumed {cp_id}"),
            Err(e) => println!("{e}"),
        },
        Command::List => println!("{}", dashboard::render(central)),
        Command::History => match central.store().recent_history(20) {
            Ok(records) => {
                for r in records {
                    println!(
                        "{}  {}  {}  {:.2} kWh  {:.2} EUR  {:.0}s",
                        r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        r.cp_id,
                        r.driver_id,
                        r.kwh_delivered,
                        r.total_amount,
                        r.duration_seconds,
                    );
                }
            }
            Err(e) => println!("history unavailable: {e}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {
            println!("shutting down");
            cancel.cancel();
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
