// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! Structured, leveled diagnostics on stderr.
//!
//! Independent of the stdout report (`SPEC_FULL.md` §6): nothing logged here is read back
//! by the program, and raising or lowering verbosity never changes the stdout report or the
//! exit code.

use slog::Logger;
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Builds the root logger for a run, scaling severity with the repeat count of `-v`.
///
/// `0` -> info, `1` -> debug, `2` or more -> trace.
pub fn build_logger(verbosity: u8) -> Logger {
    let severity = match verbosity {
        0 => Severity::Info,
        1 => Severity::Debug,
        _ => Severity::Trace,
    };

    let mut builder = TerminalLoggerBuilder::new();
    builder.level(severity);
    builder.destination(Destination::Stderr);
    builder
        .build()
        .expect("terminal logger destinations are infallible to construct")
}
