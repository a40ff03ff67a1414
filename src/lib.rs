// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! `solvetables` compiles a stateful packet-filter rule chain and a tiny predicate DSL into
//! a single bit-vector satisfiability problem, and reports a witness packet plus the rule
//! responsible for accepting it. See `SPEC_FULL.md` for the full component design.

pub mod attributor;
pub mod chain;
pub mod cli;
pub mod compiler;
pub mod enums;
pub mod errors;
pub mod expr;
pub mod logging;
pub mod model;
pub mod parser;
pub mod rule;
pub mod rules_file;
pub mod solver;
pub mod witness;

use slog::{info, Logger};

use crate::attributor::Attribution;
use crate::chain::Chain;
use crate::cli::Cli;
use crate::errors::UsageError;
use crate::model::SymbolContext;
use crate::solver::SolveOutcome;
use crate::witness::Witness;

/// The complete outcome of one run, independent of how it gets rendered to stdout.
pub enum Report {
    Unsat,
    Sat { witness: Witness, attribution: Attribution },
}

/// Runs the full pipeline described in `SPEC_FULL.md` §2's data-flow summary: parses and
/// compiles every rule, assembles the chain formula, compiles the user expression, solves,
/// and (if sat) translates the model and attributes it to a rule.
pub fn run(cli: &Cli, logger: &Logger) -> Result<Report, failure::Error> {
    let chain_name: enums::ChainName = cli.chain.into();
    let default_policy_arg: Option<enums::Policy> = cli.default_policy.map(Into::into);

    let contents = rules_file::read_rules_file(&cli.rules_file)?;
    let default_policy = rules_file::resolve_default_policy(default_policy_arg, &contents, chain_name.as_str())?;
    info!(logger, "resolved default policy"; "chain" => chain_name.as_str(), "policy" => default_policy.to_string());

    let lines = rules_file::rule_lines_for_chain(&contents, chain_name.as_str());
    let mut rules = Vec::with_capacity(lines.len());
    for line in &lines {
        let rule = parser::parse_rule_line(line)?;
        info!(logger, "parsed rule"; "rule" => *line);
        rules.push(rule);
    }

    let cfg = z3::Config::new();
    let z3_ctx = z3::Context::new(&cfg);
    let ctx = SymbolContext::new(&z3_ctx);

    let chain = Chain::new(chain_name, default_policy, rules);
    chain.compile_rules(&ctx)?;
    info!(logger, "compiled chain"; "chain" => chain_name.as_str(), "rule_count" => chain.rules.len());

    let tokens = cli.expression_tokens();
    if tokens.is_empty() {
        return Err(UsageError::EmptyExpression.into());
    }
    let user_predicate = expr::compile_expression(&ctx, &tokens)?;

    // The Interface Enum may have been extended while compiling the expression (interface
    // literals extend it on first sight, `SPEC_FULL.md` §4.5), so the chain formula and
    // domain bounds are only safe to build *after* this point (§3 "Lifecycle", §5).
    let chain_formula = chain.assemble(&ctx);

    let outcome = solver::solve(&ctx, &chain_formula, &user_predicate, chain.rules.len(), logger)?;

    match outcome {
        SolveOutcome::Unsat => {
            info!(logger, "solve finished"; "result" => "unsat");
            Ok(Report::Unsat)
        }
        SolveOutcome::Sat(model) => {
            let witness = witness::translate_model(&ctx, &model);
            let attribution = attributor::attribute(&ctx, &chain, &model);
            info!(logger, "solve finished"; "result" => "sat");
            Ok(Report::Sat { witness, attribution })
        }
    }
}
