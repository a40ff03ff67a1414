// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The process-wide domain enums from `SPEC_FULL.md` §3.
//!
//! `Protocol` and `State` are fixed, closed lists, so they are plain Rust enums with a
//! declaration order that doubles as their Packet Model index. `ChainName` is the third fixed
//! enum (it never appears in a solver constraint, only in CLI validation). The Interface Enum
//! is *not* here -- it grows at runtime, so it lives in [`crate::model::InterfaceTable`].

use std::fmt;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

/// Index into the Protocol Enum. Order matches the wire contract exactly: index 0 ("all")
/// means "protocol is unconstrained" and must never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    All,
    Tcp,
    Udp,
    Udplite,
    Icmp,
    Icmpv6,
    Esp,
    Ah,
    Sctp,
    Mh,
}

impl Protocol {
    /// The full ordered enum, index-aligned with the Packet Model's `protocol` field.
    pub const ALL: [Protocol; 10] = [
        Protocol::All,
        Protocol::Tcp,
        Protocol::Udp,
        Protocol::Udplite,
        Protocol::Icmp,
        Protocol::Icmpv6,
        Protocol::Esp,
        Protocol::Ah,
        Protocol::Sctp,
        Protocol::Mh,
    ];

    pub fn index(self) -> u32 {
        Self::ALL
            .iter()
            .position(|p| *p == self)
            .expect("Protocol::ALL enumerates every variant") as u32
    }

    pub fn from_index(index: u32) -> Option<Protocol> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn len() -> usize {
        Self::ALL.len()
    }
}

/// Index into the State Enum, matching `iptables --ctstate` spelling (uppercase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum State {
    #[strum(serialize = "NEW")]
    New,
    #[strum(serialize = "RELATED")]
    Related,
    #[strum(serialize = "ESTABLISHED")]
    Established,
}

impl State {
    pub const ALL: [State; 3] = [State::New, State::Related, State::Established];

    pub fn index(self) -> u32 {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .expect("State::ALL enumerates every variant") as u32
    }

    pub fn from_index(index: u32) -> Option<State> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn len() -> usize {
        Self::ALL.len()
    }
}

/// The three chains a rules file can define rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainName {
    Input,
    Forward,
    Output,
}

impl ChainName {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainName::Input => "INPUT",
            ChainName::Forward => "FORWARD",
            ChainName::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INPUT" => Ok(ChainName::Input),
            "FORWARD" => Ok(ChainName::Forward),
            "OUTPUT" => Ok(ChainName::Output),
            other => Err(format!("unknown chain '{}'", other)),
        }
    }
}

/// The terminal targets a chain rule can resolve to immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Accept,
    Drop,
    Reject,
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Policy::Accept),
            "DROP" => Ok(Policy::Drop),
            "REJECT" => Ok(Policy::Reject),
            other => Err(format!("unknown policy '{}'", other)),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Policy::Accept => "ACCEPT",
            Policy::Drop => "DROP",
            Policy::Reject => "REJECT",
        };
        f.write_str(s)
    }
}
