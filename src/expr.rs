// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Expression Compiler (`SPEC_FULL.md` §4.5): parses the flat, left-associative predicate
//! DSL into a constraint over the Packet Model.
//!
//! Deliberately does *not* implement `and`/`or` precedence -- the §9 redesign note documents
//! this as an explicit design choice inherited from the Python original, not an oversight.
//! Each new triple combines with the running accumulator using whichever `concat_op` was
//! last seen; callers wanting priority must split the call into multiple invocations.

use std::net::Ipv4Addr;
use std::str::FromStr;

use z3::ast::{Ast, Bool, BV};

use crate::enums::{Protocol, State};
use crate::errors::ExpressionError;
use crate::model::SymbolContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Op {
    fn parse(token: &str) -> Result<Self, ExpressionError> {
        match token {
            "==" => Ok(Op::Eq),
            "!=" => Ok(Op::Ne),
            "<=" => Ok(Op::Le),
            ">=" => Ok(Op::Ge),
            "<" => Ok(Op::Lt),
            ">" => Ok(Op::Gt),
            other => Err(ExpressionError::UnknownOperator { op: other.to_owned() }),
        }
    }

    /// Dispatches on the tagged variant rather than a string-keyed table (§9 "variable-sized
    /// union of comparators -> tagged variant").
    fn apply<'ctx>(self, lhs: &BV<'ctx>, rhs: &BV<'ctx>) -> Bool<'ctx> {
        match self {
            Op::Eq => lhs._eq(rhs),
            Op::Ne => lhs._eq(rhs).not(),
            Op::Le => lhs.bvule(rhs),
            Op::Ge => lhs.bvuge(rhs),
            Op::Lt => lhs.bvult(rhs),
            Op::Gt => lhs.bvugt(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConcatOp {
    And,
    Or,
}

impl ConcatOp {
    fn parse(token: &str) -> Result<Self, ExpressionError> {
        match token {
            "and" => Ok(ConcatOp::And),
            "or" => Ok(ConcatOp::Or),
            other => Err(ExpressionError::UnknownConcatOperator { op: other.to_owned() }),
        }
    }

    fn apply<'ctx>(self, ctx: &'ctx z3::Context, lhs: Bool<'ctx>, rhs: Bool<'ctx>) -> Bool<'ctx> {
        match self {
            ConcatOp::And => Bool::and(ctx, &[&lhs, &rhs]),
            ConcatOp::Or => Bool::or(ctx, &[&lhs, &rhs]),
        }
    }
}

/// One operand name, naming both the Packet Model variable it addresses and how its literal
/// operand is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    SrcIp,
    DstIp,
    InIface,
    OutIface,
    Protocol,
    SrcPort,
    DstPort,
    State,
}

impl Operand {
    fn parse(token: &str) -> Result<Self, ExpressionError> {
        match token {
            "src_ip" => Ok(Operand::SrcIp),
            "dst_ip" => Ok(Operand::DstIp),
            "in_iface" => Ok(Operand::InIface),
            "out_iface" => Ok(Operand::OutIface),
            "protocol" => Ok(Operand::Protocol),
            "src_port" => Ok(Operand::SrcPort),
            "dst_port" => Ok(Operand::DstPort),
            "state" => Ok(Operand::State),
            other => Err(ExpressionError::UnknownOperand { name: other.to_owned() }),
        }
    }

    fn variable<'a, 'ctx>(self, ctx: &'a SymbolContext<'ctx>) -> &'a BV<'ctx> {
        match self {
            Operand::SrcIp => &ctx.packet.src_ip,
            Operand::DstIp => &ctx.packet.dst_ip,
            Operand::InIface => &ctx.packet.in_iface,
            Operand::OutIface => &ctx.packet.out_iface,
            Operand::Protocol => &ctx.packet.protocol,
            Operand::SrcPort => &ctx.packet.src_port,
            Operand::DstPort => &ctx.packet.dst_port,
            Operand::State => &ctx.packet.state,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Operand::SrcIp => "src_ip",
            Operand::DstIp => "dst_ip",
            Operand::InIface => "in_iface",
            Operand::OutIface => "out_iface",
            Operand::Protocol => "protocol",
            Operand::SrcPort => "src_port",
            Operand::DstPort => "dst_port",
            Operand::State => "state",
        }
    }

    /// Parses the literal for this operand into its numeric Packet Model encoding.
    fn literal<'ctx>(self, ctx: &SymbolContext<'ctx>, literal: &str) -> Result<u64, ExpressionError> {
        let bad_literal = || ExpressionError::InvalidLiteral {
            operand: self.name().to_owned(),
            literal: literal.to_owned(),
        };
        match self {
            Operand::SrcIp | Operand::DstIp => {
                Ipv4Addr::from_str(literal).map(|ip| u32::from(ip) as u64).map_err(|_| bad_literal())
            }
            Operand::InIface | Operand::OutIface => Ok(ctx.interfaces.get_or_insert(literal) as u64),
            Operand::Protocol => Protocol::from_str(literal).map(|p| p.index() as u64).map_err(|_| bad_literal()),
            Operand::State => State::from_str(literal).map(|s| s.index() as u64).map_err(|_| bad_literal()),
            Operand::SrcPort | Operand::DstPort => literal.parse::<u64>().map_err(|_| bad_literal()),
        }
    }
}

/// Parses `tokens` (already whitespace-split) into a single constraint (`SPEC_FULL.md` §4.5).
pub fn compile_expression<'ctx>(
    ctx: &SymbolContext<'ctx>,
    tokens: &[String],
) -> Result<Bool<'ctx>, ExpressionError> {
    if tokens.len() % 4 != 3 {
        return Err(ExpressionError::BadTokenCount { count: tokens.len() });
    }

    let mut accumulator: Option<Bool<'ctx>> = None;
    let mut concat_op: Option<ConcatOp> = None;
    let mut i = 0;

    while i < tokens.len() {
        let operand = Operand::parse(&tokens[i])?;
        let op = Op::parse(&tokens[i + 1])?;
        let literal = operand.literal(ctx, &tokens[i + 2])?;
        i += 3;

        let var = operand.variable(ctx);
        let rhs = BV::from_u64(ctx.ctx, literal, var.get_size());
        let clause = op.apply(var, &rhs);

        accumulator = Some(match (accumulator, concat_op) {
            (None, _) => clause,
            (Some(acc), Some(join)) => join.apply(ctx.ctx, acc, clause),
            (Some(_), None) => unreachable!("concat_op is always set before a second triple"),
        });

        if i < tokens.len() {
            concat_op = Some(ConcatOp::parse(&tokens[i])?);
            i += 1;
        }
    }

    Ok(accumulator.expect("token count check above guarantees at least one triple"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::{Config, Context, SatResult, Solver};

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn single_equality_constrains_src_ip() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let constraint = compile_expression(&ctx, &toks("src_ip == 10.0.0.6")).unwrap();

        let solver = Solver::new(&z3_ctx);
        solver.assert(&constraint);
        let other = BV::from_u64(&z3_ctx, u32::from(Ipv4Addr::new(10, 0, 0, 7)) as u64, 32);
        solver.assert(&ctx.packet.src_ip._eq(&other));
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn left_associative_and_or_ignores_precedence() {
        // "a and b or c" must parse as (a and b) or c, not a and (b or c).
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let constraint =
            compile_expression(&ctx, &toks("dst_port == 1 and dst_port == 2 or dst_port == 3")).unwrap();

        let solver = Solver::new(&z3_ctx);
        let three = BV::from_u64(&z3_ctx, 3, 16);
        solver.assert(&constraint);
        solver.assert(&ctx.packet.dst_port._eq(&three));
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn rejects_bad_token_count() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let err = compile_expression(&ctx, &toks("src_ip == 10.0.0.6 and"));
        assert!(matches!(err, Err(ExpressionError::BadTokenCount { count: 4 })));
    }

    #[test]
    fn unknown_operand_is_rejected() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let err = compile_expression(&ctx, &toks("nonexistent == 1"));
        assert!(matches!(err, Err(ExpressionError::UnknownOperand { .. })));
    }

    #[test]
    fn interface_literal_extends_interface_enum() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        assert_eq!(ctx.interfaces.len(), 0);
        compile_expression(&ctx, &toks("in_iface == eth0")).unwrap();
        assert_eq!(ctx.interfaces.len(), 1);
    }
}
