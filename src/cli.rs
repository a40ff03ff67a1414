// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The CLI surface (`SPEC_FULL.md` §6): positional/flag layout, parsed with `clap`'s derive
//! API the way the rest of this crate's stack expects.

use clap::{Parser, ValueEnum};

use crate::enums::{ChainName, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    #[value(name = "ACCEPT")]
    Accept,
    #[value(name = "DROP")]
    Drop,
    #[value(name = "REJECT")]
    Reject,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Accept => Policy::Accept,
            PolicyArg::Drop => Policy::Drop,
            PolicyArg::Reject => Policy::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChainArg {
    #[value(name = "INPUT")]
    Input,
    #[value(name = "FORWARD")]
    Forward,
    #[value(name = "OUTPUT")]
    Output,
}

impl From<ChainArg> for ChainName {
    fn from(arg: ChainArg) -> Self {
        match arg {
            ChainArg::Input => ChainName::Input,
            ChainArg::Forward => ChainName::Forward,
            ChainArg::Output => ChainName::Output,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// `solvetables [--default-policy ...] [-v...] [--format ...] CHAIN RULES-FILE EXPRESSION...`
#[derive(Debug, Parser)]
#[command(name = "solvetables", about = "Satisfiability checker for packet-filter rule chains")]
pub struct Cli {
    /// Skip default-policy detection and use this policy instead.
    #[arg(long = "default-policy", value_enum)]
    pub default_policy: Option<PolicyArg>,

    /// Raise logging severity: absent is info, -v is debug, -vv or more is trace.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Select the stdout rendering.
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// The chain to evaluate.
    #[arg(value_enum)]
    pub chain: ChainArg,

    /// Path to an iptables-save-style rules file.
    pub rules_file: String,

    /// The predicate expression, either one whitespace-separated argument or several tokens.
    #[arg(required = true, num_args = 1..)]
    pub expression: Vec<String>,
}

impl Cli {
    /// Splits `self.expression` into tokens per `SPEC_FULL.md` §6: a single argument is
    /// whitespace-split, several arguments are used as-is.
    pub fn expression_tokens(&self) -> Vec<String> {
        if self.expression.len() == 1 {
            self.expression[0].split_whitespace().map(str::to_owned).collect()
        } else {
            self.expression.clone()
        }
    }
}
