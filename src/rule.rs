// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The `Rule` record (`SPEC_FULL.md` §3) and the small value types its dimensions are made
//! of. Parsing lives in [`crate::parser`]; compiling a `Rule` into a constraint lives in
//! [`crate::compiler`], which fills in the `constraint` cache defined here.

use std::cell::RefCell;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use z3::ast::Bool;

use crate::enums::Protocol;

/// An inclusive IPv4 address range, as produced by parsing a CIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    pub low: u32,
    pub high: u32,
}

impl From<Ipv4Network> for Cidr {
    fn from(net: Ipv4Network) -> Self {
        Cidr {
            low: u32::from(net.network()),
            high: u32::from(net.broadcast()),
        }
    }
}

impl Cidr {
    /// `0.0.0.0/0`, the default for an unconstrained source or destination.
    pub fn any() -> Self {
        Cidr {
            low: 0,
            high: u32::from(Ipv4Addr::new(255, 255, 255, 255)),
        }
    }
}

/// One of the three syntactic forms a `--sport`/`--dport` spec can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    Single(u32),
    Range(u32, u32),
    List(Vec<u32>),
}

/// A rule's `-j`/`--jump` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Accept,
    Drop,
    Reject,
    Chain(String),
}

impl Target {
    /// Whether this target is ACCEPT/DROP/REJECT, i.e. decides a packet's fate immediately
    /// (`SPEC_FULL.md` glossary: "terminal target"). Rules with any other target are parsed
    /// but ignored by the Rule Compiler (§4.2, §9 open question).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Target::Accept | Target::Drop | Target::Reject)
    }
}

/// One filterable dimension: an optional value plus its inversion flag (`! -s ...`).
#[derive(Debug, Clone, Default)]
pub struct Dimension<T> {
    pub value: Option<T>,
    pub invert: bool,
}

impl<T> Dimension<T> {
    pub fn none() -> Self {
        Dimension {
            value: None,
            invert: false,
        }
    }
}

/// The match-extension options that the parser recognizes and stores, but that the Rule
/// Compiler never consults (`SPEC_FULL.md` §3, §4.1). Kept so a rule line written against the
/// full option surface this tool was distilled from still parses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchExtensions {
    pub match_ext: Option<String>,
    pub tcp_flags: Option<(String, String)>,
    pub icmp_type: Option<String>,
    pub set: bool,
    pub name: Option<String>,
    pub mask: Option<String>,
    pub rsource: bool,
    pub rcheck: bool,
    pub seconds: Option<String>,
    pub fragment: Option<String>,
    pub set_counters: Option<String>,
}

/// A single parsed rule line.
///
/// `source`/`destination` intentionally mirror the Python original's two independent
/// (`value`, `not_value`) argparse slots rather than a single `Dimension<Cidr>` -- the quirk
/// documented in `SPEC_FULL.md` §9, where the destination's inversion is driven by
/// `not_source` rather than `not_destination`, only reproduces if the two dimensions stay
/// structurally distinct through to the compiler. See `compiler::compile_ip` for where that
/// quirk is preserved.
pub struct Rule<'ctx> {
    pub text: String,
    pub target: Target,
    pub source: Option<Cidr>,
    pub not_source: Option<Cidr>,
    pub destination: Option<Cidr>,
    pub not_destination: Option<Cidr>,
    pub in_iface: Dimension<String>,
    pub out_iface: Dimension<String>,
    pub protocol: Protocol,
    pub src_port: PortSpec,
    pub dst_port: PortSpec,
    pub state: Option<Vec<crate::enums::State>>,
    pub extensions: MatchExtensions,

    /// Memoized compiled constraint. Outer `None` means "not yet compiled"; inner `None`
    /// means "compiled, and this rule contributes no constraint" (non-terminal target).
    constraint: RefCell<Option<Option<Bool<'ctx>>>>,
}

impl<'ctx> Rule<'ctx> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: String,
        target: Target,
        source: Option<Cidr>,
        not_source: Option<Cidr>,
        destination: Option<Cidr>,
        not_destination: Option<Cidr>,
        in_iface: Dimension<String>,
        out_iface: Dimension<String>,
        protocol: Protocol,
        src_port: PortSpec,
        dst_port: PortSpec,
        state: Option<Vec<crate::enums::State>>,
        extensions: MatchExtensions,
    ) -> Self {
        Rule {
            text,
            target,
            source,
            not_source,
            destination,
            not_destination,
            in_iface,
            out_iface,
            protocol,
            src_port,
            dst_port,
            state,
            extensions,
            constraint: RefCell::new(None),
        }
    }

    /// Returns the cached constraint, if `compiler::compile_rule` has already run.
    pub fn cached_constraint(&self) -> Option<Option<Bool<'ctx>>> {
        self.constraint.borrow().clone()
    }

    /// Sets the memoized constraint. Panics if called twice -- compilation is meant to run
    /// exactly once per rule (`SPEC_FULL.md` §4.2 "Memoization").
    pub fn set_constraint(&self, constraint: Option<Bool<'ctx>>) {
        let mut slot = self.constraint.borrow_mut();
        assert!(slot.is_none(), "rule constraint compiled more than once");
        *slot = Some(constraint);
    }
}
