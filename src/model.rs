// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Packet Model: the fixed tuple of bit-vector variables every other component
//! constrains (`SPEC_FULL.md` §3), plus the append-only Interface Enum and the
//! `SymbolContext` that threads both through compilation (§9 "explicit context" note).

use std::cell::RefCell;

use z3::ast::{Bool, BV};
use z3::Context;

/// Width, in bits, of each Packet Model field.
pub const SRC_IP_BITS: u32 = 32;
pub const DST_IP_BITS: u32 = 32;
pub const IN_IFACE_BITS: u32 = 8;
pub const OUT_IFACE_BITS: u32 = 8;
pub const PROTOCOL_BITS: u32 = 4;
pub const SRC_PORT_BITS: u32 = 16;
pub const DST_PORT_BITS: u32 = 16;
pub const STATE_BITS: u32 = 4;

/// The fixed tuple of symbolic packet fields, all sharing one [`Context`].
///
/// Every constraint produced anywhere in this crate references exactly these instances --
/// there is never a second `src_ip` variable floating around.
pub struct PacketModel<'ctx> {
    pub src_ip: BV<'ctx>,
    pub dst_ip: BV<'ctx>,
    pub in_iface: BV<'ctx>,
    pub out_iface: BV<'ctx>,
    pub protocol: BV<'ctx>,
    pub src_port: BV<'ctx>,
    pub dst_port: BV<'ctx>,
    pub state: BV<'ctx>,
}

impl<'ctx> PacketModel<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        PacketModel {
            src_ip: BV::new_const(ctx, "src_ip_model", SRC_IP_BITS),
            dst_ip: BV::new_const(ctx, "dst_ip_model", DST_IP_BITS),
            in_iface: BV::new_const(ctx, "input_interface_model", IN_IFACE_BITS),
            out_iface: BV::new_const(ctx, "output_interface_model", OUT_IFACE_BITS),
            protocol: BV::new_const(ctx, "protocol_model", PROTOCOL_BITS),
            src_port: BV::new_const(ctx, "src_port_model", SRC_PORT_BITS),
            dst_port: BV::new_const(ctx, "dst_port_model", DST_PORT_BITS),
            state: BV::new_const(ctx, "state_model", STATE_BITS),
        }
    }

    /// All eight variables, in the order the Witness Translator renders them.
    pub fn variables(&self) -> [&BV<'ctx>; 8] {
        [
            &self.src_ip,
            &self.dst_ip,
            &self.in_iface,
            &self.out_iface,
            &self.protocol,
            &self.src_port,
            &self.dst_port,
            &self.state,
        ]
    }
}

/// The append-only Interface Enum (`SPEC_FULL.md` §3).
///
/// Lookup is by exact string match; once an index is assigned it is never reused or
/// reassigned, even though the table itself is shared behind `&self` (mirrors the Python
/// original's shared classmethod, but as an explicit value instead of a process global).
#[derive(Debug, Default)]
pub struct InterfaceTable {
    names: RefCell<Vec<String>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        InterfaceTable::default()
    }

    /// Returns the existing index for `name`, or appends it and returns the new index.
    pub fn get_or_insert(&self, name: &str) -> u32 {
        let mut names = self.names.borrow_mut();
        if let Some(index) = names.iter().position(|n| n == name) {
            return index as u32;
        }
        names.push(name.to_owned());
        (names.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.names.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name_at(&self, index: u32) -> Option<String> {
        self.names.borrow().get(index as usize).cloned()
    }
}

/// Owns the Packet Model and the Interface Enum for one run, and is threaded through every
/// compilation stage (Rule Compiler, Expression Compiler, Domain-Bounds Constraint).
pub struct SymbolContext<'ctx> {
    pub ctx: &'ctx Context,
    pub packet: PacketModel<'ctx>,
    pub interfaces: InterfaceTable,
}

impl<'ctx> SymbolContext<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        SymbolContext {
            ctx,
            packet: PacketModel::new(ctx),
            interfaces: InterfaceTable::new(),
        }
    }

    /// The domain-bounds constraint (`SPEC_FULL.md` §4.4), rebuilt fresh from the Interface
    /// Enum's *current* length. Must be reconstructed (not cached) after any expression
    /// compilation that might have extended the enum -- see the Lifecycle note in §3.
    ///
    /// A literal transcription of the Python original's `ULT(var, len(INTERFACE_ENUM))` would
    /// assert `var < 0` whenever no rule or expression in a run ever names an interface,
    /// which is unconditionally false and would make every such run unsatisfiable -- not the
    /// behavior any of the worked scenarios in `SPEC_FULL.md` §8 expect (several never
    /// mention an interface at all). This implementation omits the interface bound entirely
    /// while the Interface Enum is still empty, and only starts constraining `in_iface`/
    /// `out_iface` once at least one interface name has actually been seen.
    pub fn domain_bounds(&self) -> Bool<'ctx> {
        use crate::enums::{Protocol, State};

        let protocol_len = BV::from_u64(self.ctx, Protocol::len() as u64, PROTOCOL_BITS);
        let state_len = BV::from_u64(self.ctx, State::len() as u64, STATE_BITS);

        let mut clauses = vec![
            self.packet.protocol.bvult(&protocol_len),
            self.packet.state.bvult(&state_len),
        ];

        if !self.interfaces.is_empty() {
            let iface_len = BV::from_u64(self.ctx, self.interfaces.len() as u64, IN_IFACE_BITS);
            clauses.push(self.packet.in_iface.bvult(&iface_len));
            clauses.push(self.packet.out_iface.bvult(&iface_len));
        }

        let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
        Bool::and(self.ctx, &refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::Ast;

    #[test]
    fn interface_table_assigns_monotonic_indices() {
        let table = InterfaceTable::new();
        assert_eq!(table.get_or_insert("eth0"), 0);
        assert_eq!(table.get_or_insert("eth1"), 1);
        assert_eq!(table.get_or_insert("eth0"), 0, "re-lookup must not reassign");
        assert_eq!(table.len(), 2);
        assert_eq!(table.name_at(1), Some("eth1".to_owned()));
    }

    #[test]
    fn domain_bounds_do_not_force_unsat_when_no_interface_was_ever_named() {
        let cfg = z3::Config::new();
        let z3_ctx = z3::Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);

        let solver = z3::Solver::new(&z3_ctx);
        solver.assert(&ctx.domain_bounds());
        assert_eq!(solver.check(), z3::SatResult::Sat, "empty interface enum must not be unconditionally unsat");
    }

    #[test]
    fn domain_bounds_constrain_interfaces_once_one_is_named() {
        let cfg = z3::Config::new();
        let z3_ctx = z3::Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        ctx.interfaces.get_or_insert("eth0");

        let solver = z3::Solver::new(&z3_ctx);
        let out_of_range = BV::from_u64(&z3_ctx, 5, IN_IFACE_BITS);
        solver.assert(&ctx.domain_bounds());
        solver.assert(&ctx.packet.in_iface._eq(&out_of_range));
        assert_eq!(solver.check(), z3::SatResult::Unsat);
    }
}
