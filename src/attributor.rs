// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Rule Attributor (`SPEC_FULL.md` §4.8): given a witness model, finds the first rule
//! whose constraints admit it.

use z3::ast::Ast;
use z3::{Model, SatResult, Solver};

use crate::chain::Chain;
use crate::enums::Policy;
use crate::model::SymbolContext;

/// The three shapes an attribution can take. Redesigns the Python original's "Something
/// went wrong!" message (reached whenever no rule matched after a sat solve, including the
/// common and entirely legitimate "accepted by the chain's default policy" case) into a
/// named outcome rather than an error (`SPEC_FULL.md` §4.8, §7, §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// The original text of the rule responsible for the accept.
    Rule(String),
    /// No rule matched, and the chain's default policy is ACCEPT -- the packet fell
    /// through to the implicit accept-everything clause (`SPEC_FULL.md` §4.3 step 3).
    DefaultPolicy,
    /// No rule matched and the default policy is not ACCEPT. Should be unreachable for a
    /// sat overall solve; kept as a named outcome rather than a panic so a solver
    /// inconsistency surfaces as a message instead of crashing the process.
    InternalInconsistency,
}

/// Scans every rule in `chain`, regardless of target (`SPEC_FULL.md` §4.8: "the attributor
/// scans all rules regardless of target, including DROP/REJECT rules" -- the §9 open
/// question about whether non-terminal-target rules should participate is left unresolved
/// upstream of this function, since non-terminal rules never produce a constraint here to
/// begin with).
pub fn attribute<'ctx>(ctx: &SymbolContext<'ctx>, chain: &Chain<'ctx>, model: &Model<'ctx>) -> Attribution {
    for rule in &chain.rules {
        let constraint = match rule.cached_constraint().flatten() {
            Some(c) => c,
            None => continue,
        };

        let solver = Solver::new(ctx.ctx);
        solver.assert(&constraint);
        solver.assert(&ctx.domain_bounds());
        for var in ctx.packet.variables() {
            if let Some(value) = model.eval(var, true) {
                solver.assert(&var._eq(&value));
            }
        }

        if solver.check() == SatResult::Sat {
            return Attribution::Rule(rule.text.clone());
        }
    }

    if chain.default_policy == Policy::Accept {
        Attribution::DefaultPolicy
    } else {
        Attribution::InternalInconsistency
    }
}
