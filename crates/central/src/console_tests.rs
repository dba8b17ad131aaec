// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    stop = { "stop CP-001", Command::Stop(CpId::new("CP-001")) },
    resume = { "resume CP-001", Command::Resume(CpId::new("CP-001")) },
    list = { "list", Command::List },
    history = { "history", Command::History },
    help = { "help", Command::Help },
    quit = { "quit", Command::Quit },
    exit_alias = { "exit", Command::Quit },
    padded = { "  stop   CP-001  ", Command::Stop(CpId::new("CP-001")) },
)]
fn commands_parse(line: &str, expected: Command) {
    assert_eq!(Command::parse(line), Ok(Some(expected)));
}

#[test]
fn empty_line_is_no_command() {
    assert_eq!(Command::parse(""), Ok(None));
    assert_eq!(Command::parse("   "), Ok(None));
}

#[parameterized(
    bare_stop = { "stop" },
    bare_resume = { "resume" },
)]
fn missing_cp_id_reports_usage(line: &str) {
    let err = Command::parse(line).unwrap_err();
    assert!(err.starts_with("usage:"), "{err}");
}

#[test]
fn unknown_commands_suggest_help() {
    let err = Command::parse("reboot CP-001").unwrap_err();
    assert!(err.contains("unknown command"), "{err}");
}
