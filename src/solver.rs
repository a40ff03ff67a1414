// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Solver Driver (`SPEC_FULL.md` §4.6): issues the single `check` call that decides
//! whether any packet is both accepted by the chain and satisfies the user predicate.

use std::time::Instant;

use slog::{debug, Logger};
use z3::ast::Bool;
use z3::{Model, SatResult, Solver};

use crate::errors::SolverError;
use crate::model::SymbolContext;

/// The outcome of one solve: either a model, or a confirmation that no such packet exists.
pub enum SolveOutcome<'ctx> {
    Sat(Model<'ctx>),
    Unsat,
}

/// Builds `chain_formula ∧ user_predicate ∧ domain_bounds` and issues one `check`
/// (`SPEC_FULL.md` §4.6). Logs the formula's size and the oracle's wall-clock time at debug
/// level -- pure diagnostics, never read back by the program (§5, §6).
pub fn solve<'ctx>(
    ctx: &SymbolContext<'ctx>,
    chain_formula: &Bool<'ctx>,
    user_predicate: &Bool<'ctx>,
    rule_count: usize,
    logger: &Logger,
) -> Result<SolveOutcome<'ctx>, SolverError> {
    let domain_bounds = ctx.domain_bounds();
    let solver = Solver::new(ctx.ctx);
    solver.assert(chain_formula);
    solver.assert(user_predicate);
    solver.assert(&domain_bounds);

    debug!(
        logger, "solving assembled formula";
        "rule_count" => rule_count,
        "interface_enum_len" => ctx.interfaces.len(),
    );

    let started = Instant::now();
    let result = solver.check();
    let elapsed = started.elapsed();
    debug!(
        logger, "solver finished";
        "result" => format!("{:?}", result),
        "elapsed_ms" => elapsed.as_millis() as u64,
    );

    match result {
        SatResult::Sat => {
            let model = solver.get_model().ok_or_else(|| SolverError::ContextInit {
                message: "solver reported sat but produced no model".to_owned(),
            })?;
            Ok(SolveOutcome::Sat(model))
        }
        SatResult::Unsat => Ok(SolveOutcome::Unsat),
        SatResult::Unknown => Err(SolverError::ContextInit {
            message: solver.get_reason_unknown().unwrap_or_else(|| "unknown".to_owned()),
        }),
    }
}
