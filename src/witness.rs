// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Witness Translator (`SPEC_FULL.md` §4.7): renders a solved [`Model`] back into
//! human-readable packet field values, in both the line-oriented text form (§6's stdout
//! contract) and a machine-readable form (`--format json`, the round-trip test property).

use serde::Serialize;
use z3::ast::Ast;
use z3::Model;

use crate::enums::{Protocol, State};
use crate::model::SymbolContext;

/// A solved packet, every field rendered into its human-facing representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Witness {
    pub src_ip: String,
    pub dst_ip: String,
    pub input_interface: String,
    pub output_interface: String,
    pub protocol: String,
    pub src_port: u32,
    pub dst_port: u32,
    pub state: String,
}

fn eval_u64<'ctx>(model: &Model<'ctx>, var: &z3::ast::BV<'ctx>) -> u64 {
    // `model_completion = true`: unqueried variables default to 0 (`SPEC_FULL.md` §4.6).
    model
        .eval(var, true)
        .and_then(|v| v.as_u64())
        .expect("model completion guarantees a concrete value for every queried variable")
}

fn render_ipv4(value: u64) -> String {
    std::net::Ipv4Addr::from(value as u32).to_string()
}

/// Translates `model` into a [`Witness`] (`SPEC_FULL.md` §4.7).
pub fn translate_model<'ctx>(ctx: &SymbolContext<'ctx>, model: &Model<'ctx>) -> Witness {
    let src_ip = eval_u64(model, &ctx.packet.src_ip);
    let dst_ip = eval_u64(model, &ctx.packet.dst_ip);
    let in_iface = eval_u64(model, &ctx.packet.in_iface) as u32;
    let out_iface = eval_u64(model, &ctx.packet.out_iface) as u32;
    let protocol = eval_u64(model, &ctx.packet.protocol) as u32;
    let src_port = eval_u64(model, &ctx.packet.src_port) as u32;
    let dst_port = eval_u64(model, &ctx.packet.dst_port) as u32;
    let state = eval_u64(model, &ctx.packet.state) as u32;

    Witness {
        src_ip: render_ipv4(src_ip),
        dst_ip: render_ipv4(dst_ip),
        input_interface: ctx.interfaces.name_at(in_iface).unwrap_or_else(|| in_iface.to_string()),
        output_interface: ctx.interfaces.name_at(out_iface).unwrap_or_else(|| out_iface.to_string()),
        protocol: Protocol::from_index(protocol).map(|p| p.to_string()).unwrap_or_else(|| protocol.to_string()),
        src_port,
        dst_port,
        state: State::from_index(state).map(|s| s.to_string()).unwrap_or_else(|| state.to_string()),
    }
}

impl Witness {
    /// One `key: value` line per field, in the order `SPEC_FULL.md` §4.7 / §6 specify.
    pub fn render_text(&self) -> String {
        format!(
            "  src_ip: {}\n  dst_ip: {}\n  input_interface: {}\n  output_interface: {}\n  protocol: {}\n  src_port: {}\n  dst_port: {}\n  state: {}",
            self.src_ip,
            self.dst_ip,
            self.input_interface,
            self.output_interface,
            self.protocol,
            self.src_port,
            self.dst_port,
            self.state,
        )
    }

    /// The round-trip expression (`SPEC_FULL.md` §8): this witness's fields re-expressed as
    /// `==` equalities conjoined with `and`, ready to feed back into [`crate::expr::compile_expression`].
    pub fn as_expression_tokens(&self) -> Vec<String> {
        vec![
            "src_ip".to_owned(), "==".to_owned(), self.src_ip.clone(), "and".to_owned(),
            "dst_ip".to_owned(), "==".to_owned(), self.dst_ip.clone(), "and".to_owned(),
            "in_iface".to_owned(), "==".to_owned(), self.input_interface.clone(), "and".to_owned(),
            "out_iface".to_owned(), "==".to_owned(), self.output_interface.clone(), "and".to_owned(),
            "protocol".to_owned(), "==".to_owned(), self.protocol.clone(), "and".to_owned(),
            "src_port".to_owned(), "==".to_owned(), self.src_port.to_string(), "and".to_owned(),
            "dst_port".to_owned(), "==".to_owned(), self.dst_port.to_string(), "and".to_owned(),
            "state".to_owned(), "==".to_owned(), self.state.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::enums::{ChainName, Policy};
    use crate::expr::compile_expression;
    use crate::parser::parse_rule_line;
    use z3::{Config, Context, Solver};

    #[test]
    fn translates_a_concrete_model() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let rules = vec![parse_rule_line::<'_>("-A INPUT -i eth0 -j ACCEPT").unwrap()];
        let chain = Chain::new(ChainName::Input, Policy::Drop, rules);
        chain.compile_rules(&ctx).unwrap();
        let formula = chain.assemble(&ctx);

        let toks: Vec<String> = "in_iface == eth0".split_whitespace().map(str::to_owned).collect();
        let predicate = compile_expression(&ctx, &toks).unwrap();

        let solver = Solver::new(&z3_ctx);
        solver.assert(&formula);
        solver.assert(&predicate);
        solver.assert(&ctx.domain_bounds());
        assert_eq!(solver.check(), z3::SatResult::Sat);
        let model = solver.get_model().unwrap();

        let witness = translate_model(&ctx, &model);
        assert_eq!(witness.input_interface, "eth0");
    }

    #[test]
    fn round_trip_expression_re_satisfies_the_chain() {
        let cfg = Config::new();
        let z3_ctx = Context::new(&cfg);
        let ctx = SymbolContext::new(&z3_ctx);
        let rules = vec![parse_rule_line::<'_>("-A INPUT -p tcp --dport 80:88 -j ACCEPT").unwrap()];
        let chain = Chain::new(ChainName::Input, Policy::Drop, rules);
        chain.compile_rules(&ctx).unwrap();
        let formula = chain.assemble(&ctx);

        let toks: Vec<String> = "dst_port == 85 and protocol == tcp".split_whitespace().map(str::to_owned).collect();
        let predicate = compile_expression(&ctx, &toks).unwrap();

        let solver = Solver::new(&z3_ctx);
        solver.assert(&formula);
        solver.assert(&predicate);
        solver.assert(&ctx.domain_bounds());
        assert_eq!(solver.check(), z3::SatResult::Sat);
        let model = solver.get_model().unwrap();
        let witness = translate_model(&ctx, &model);

        let round_trip_tokens = witness.as_expression_tokens();
        let round_trip_predicate = compile_expression(&ctx, &round_trip_tokens).unwrap();

        let solver2 = Solver::new(&z3_ctx);
        solver2.assert(&formula);
        solver2.assert(&round_trip_predicate);
        solver2.assert(&ctx.domain_bounds());
        assert_eq!(solver2.check(), z3::SatResult::Sat);
    }
}
