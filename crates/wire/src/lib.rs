// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed messaging protocol shared by every agent.
//!
//! Wire format: `<STX><payload><ETX><LRC>` where the payload is UTF-8 text
//! with fields joined by `#` and LRC is the XOR of every byte from STX
//! through ETX inclusive.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod message;

pub use frame::{encode, lrc, Drained, FrameBuffer, FrameError, ETX, MAX_BUFFER, SEP, STX};
pub use message::{reason, AvailableCp, Inbound, MessageError, Outbound};
