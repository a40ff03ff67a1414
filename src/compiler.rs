// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Rule Compiler (`SPEC_FULL.md` §4.2): maps one parsed [`Rule`] to a single boolean
//! constraint over the Packet Model, memoizing the result on the rule itself.
//!
//! Only rules with a terminal target (`ACCEPT`/`DROP`/`REJECT`) produce a constraint --
//! rules that jump to a user-defined chain are parsed, but compile to `None` (§4.2, and the
//! §9 open question about whether such rules should participate in first-match logic; this
//! crate keeps the Python original's behavior of ignoring them here).

use z3::ast::{Ast, Bool, BV};

use crate::enums::{Protocol, State};
use crate::errors::RuleError;
use crate::model::SymbolContext;
use crate::rule::{Cidr, PortSpec, Rule};

fn compile_ip<'ctx>(ctx: &SymbolContext<'ctx>, var: &BV<'ctx>, cidr: Cidr, invert: bool) -> Bool<'ctx> {
    let lo = BV::from_u64(ctx.ctx, cidr.low as u64, var.get_size());
    let hi = BV::from_u64(ctx.ctx, cidr.high as u64, var.get_size());
    let within = Bool::and(ctx.ctx, &[&lo.bvule(var), &var.bvule(&hi)]);
    if invert {
        within.not()
    } else {
        within
    }
}

fn compile_interface<'ctx>(
    ctx: &SymbolContext<'ctx>,
    var: &BV<'ctx>,
    name: Option<&str>,
    invert: bool,
) -> Option<Bool<'ctx>> {
    let name = name?;
    let index = ctx.interfaces.get_or_insert(name);
    let index_bv = BV::from_u64(ctx.ctx, index as u64, var.get_size());
    let eq = var._eq(&index_bv);
    Some(if invert { eq.not() } else { eq })
}

fn compile_protocol<'ctx>(ctx: &SymbolContext<'ctx>, var: &BV<'ctx>, protocol: Protocol) -> Option<Bool<'ctx>> {
    if protocol == Protocol::All {
        return None;
    }
    let index = BV::from_u64(ctx.ctx, protocol.index() as u64, var.get_size());
    Some(var._eq(&index))
}

/// Compiles one `--sport`/`--dport` spec. The range form's upper bound is passed through
/// `BV::from_u64` untouched -- for the default `0:655335` spec this overshoots the 16-bit
/// width and is truncated mod 2^16 by the bit-vector constructor itself, exactly mirroring
/// the numeral coercion the Python original's `z3` binding performed (`SPEC_FULL.md` §9: the
/// port-width anomaly is preserved, not silently fixed).
fn compile_port<'ctx>(ctx: &SymbolContext<'ctx>, var: &BV<'ctx>, spec: &PortSpec) -> Bool<'ctx> {
    match spec {
        PortSpec::Single(port) => {
            let value = BV::from_u64(ctx.ctx, *port as u64, var.get_size());
            var._eq(&value)
        }
        PortSpec::Range(lo, hi) => {
            let lo_bv = BV::from_u64(ctx.ctx, *lo as u64, var.get_size());
            let hi_bv = BV::from_u64(ctx.ctx, *hi as u64, var.get_size());
            Bool::and(ctx.ctx, &[&lo_bv.bvule(var), &var.bvule(&hi_bv)])
        }
        PortSpec::List(ports) => {
            let eqs: Vec<Bool<'ctx>> = ports
                .iter()
                .map(|p| {
                    let value = BV::from_u64(ctx.ctx, *p as u64, var.get_size());
                    var._eq(&value)
                })
                .collect();
            let refs: Vec<&Bool<'ctx>> = eqs.iter().collect();
            Bool::or(ctx.ctx, &refs)
        }
    }
}

fn compile_state<'ctx>(ctx: &SymbolContext<'ctx>, var: &BV<'ctx>, states: &[State]) -> Bool<'ctx> {
    let eqs: Vec<Bool<'ctx>> = states
        .iter()
        .map(|s| {
            let value = BV::from_u64(ctx.ctx, s.index() as u64, var.get_size());
            var._eq(&value)
        })
        .collect();
    let refs: Vec<&Bool<'ctx>> = eqs.iter().collect();
    Bool::or(ctx.ctx, &refs)
}

/// Compiles `rule` into its constraint and memoizes it on the rule. Idempotent: if the rule
/// was already compiled (`SPEC_FULL.md` §4.2 "Memoization"), this is a no-op.
pub fn compile_rule<'ctx>(ctx: &SymbolContext<'ctx>, rule: &Rule<'ctx>) -> Result<(), RuleError> {
    if rule.cached_constraint().is_some() {
        return Ok(());
    }

    if !rule.target.is_terminal() {
        rule.set_constraint(None);
        return Ok(());
    }

    let mut clauses: Vec<Bool<'ctx>> = Vec::new();

    // Preserves the Python original's bug: the destination's inversion guard checks
    // `not_source`, not `not_destination` (`SPEC_FULL.md` §9). An inverted destination only
    // takes effect when the source is *also* inverted, and only when a destination was
    // actually given. A rule's source being inverted says nothing about whether its
    // destination is present or inverted at all, so when `not_destination` is absent the
    // destination must compile to the ordinary unconstrained-true clause, not to an inverted
    // `Cidr::any()` (which would be `NOT(0 <= dst_ip <= u32::MAX)`, i.e. constant false,
    // making the whole rule unconditionally unsatisfiable). The Python original doesn't
    // settle this case at all -- `ipaddress.ip_network(None)` raises there -- so this is a
    // necessary deviation, not a reproduction; see DESIGN.md.
    if let Some(not_source) = rule.not_source {
        clauses.push(compile_ip(ctx, &ctx.packet.src_ip, not_source, true));
        clauses.push(match rule.not_destination {
            Some(not_destination) => compile_ip(ctx, &ctx.packet.dst_ip, not_destination, true),
            None => compile_ip(ctx, &ctx.packet.dst_ip, Cidr::any(), false),
        });
    } else {
        clauses.push(compile_ip(ctx, &ctx.packet.src_ip, rule.source.unwrap_or(Cidr::any()), false));
        clauses.push(compile_ip(
            ctx,
            &ctx.packet.dst_ip,
            rule.destination.unwrap_or(Cidr::any()),
            false,
        ));
    }

    if let Some(c) = compile_interface(ctx, &ctx.packet.in_iface, rule.in_iface.value.as_deref(), rule.in_iface.invert) {
        clauses.push(c);
    }
    if let Some(c) = compile_interface(ctx, &ctx.packet.out_iface, rule.out_iface.value.as_deref(), rule.out_iface.invert) {
        clauses.push(c);
    }
    if let Some(c) = compile_protocol(ctx, &ctx.packet.protocol, rule.protocol) {
        clauses.push(c);
    }
    clauses.push(compile_port(ctx, &ctx.packet.src_port, &rule.src_port));
    clauses.push(compile_port(ctx, &ctx.packet.dst_port, &rule.dst_port));
    if let Some(states) = &rule.state {
        clauses.push(compile_state(ctx, &ctx.packet.state, states));
    }

    let refs: Vec<&Bool<'ctx>> = clauses.iter().collect();
    let constraint = Bool::and(ctx.ctx, &refs);
    rule.set_constraint(Some(constraint));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_rule_line;
    use z3::{Config, Context, SatResult, Solver};

    fn fresh_ctx(cfg: &Config) -> Context {
        Context::new(cfg)
    }

    #[test]
    fn unconstrained_rule_is_tautological() {
        let cfg = Config::new();
        let z3_ctx = fresh_ctx(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let rule = parse_rule_line::<'_>("-A INPUT -j ACCEPT").unwrap();
        compile_rule(&ctx, &rule).unwrap();
        let constraint = rule.cached_constraint().unwrap().unwrap();

        let solver = Solver::new(&z3_ctx);
        solver.assert(&constraint.not());
        assert_eq!(solver.check(), SatResult::Unsat, "default rule must admit every packet");
    }

    #[test]
    fn negated_source_excludes_cidr() {
        let cfg = Config::new();
        let z3_ctx = fresh_ctx(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let rule = parse_rule_line::<'_>("-A INPUT ! -s 10.0.0.0/24 -j ACCEPT").unwrap();
        compile_rule(&ctx, &rule).unwrap();
        let constraint = rule.cached_constraint().unwrap().unwrap();

        let solver = Solver::new(&z3_ctx);
        let in_range = BV::from_u64(&z3_ctx, u32::from(std::net::Ipv4Addr::new(10, 0, 0, 7)) as u64, 32);
        solver.assert(&constraint);
        solver.assert(&ctx.packet.src_ip._eq(&in_range));
        assert_eq!(solver.check(), SatResult::Unsat);

        // Companion assertion: an address outside the excluded CIDR, with no destination
        // given at all, must be satisfiable -- a rule with an absent destination is not
        // supposed to be unconditionally unsat (the degenerate-constant-false bug this
        // guards against).
        let solver2 = Solver::new(&z3_ctx);
        let out_of_range = BV::from_u64(&z3_ctx, u32::from(std::net::Ipv4Addr::new(11, 0, 0, 1)) as u64, 32);
        solver2.assert(&constraint);
        solver2.assert(&ctx.packet.src_ip._eq(&out_of_range));
        assert_eq!(solver2.check(), SatResult::Sat);
    }

    #[test]
    fn non_terminal_target_compiles_to_none() {
        let cfg = Config::new();
        let z3_ctx = fresh_ctx(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let rule = parse_rule_line::<'_>("-A INPUT -j CUSTOM_CHAIN").unwrap();
        compile_rule(&ctx, &rule).unwrap();
        assert_eq!(rule.cached_constraint(), Some(None));
    }
}
