// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for master/worker communication.
//!
//! Wire format: newline-delimited JSON. One [`handoff_core::MessagePayload`]
//! per line; the JSON body never contains a raw newline.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod operator;

pub use frame::{
    decode, encode, read_frame, read_frame_timeout, write_frame, write_frame_timeout,
    ProtocolError, MAX_FRAME,
};
pub use operator::{parse_operator_line, OperatorLine};
