// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The `Chain` record and the Chain Assembler (`SPEC_FULL.md` §4.3): combines the per-rule
//! constraints of an ordered chain into one first-match-wins formula, honoring the default
//! policy.

use z3::ast::Bool;

use crate::enums::{ChainName, Policy};
use crate::errors::RuleError;
use crate::model::SymbolContext;
use crate::rule::{Rule, Target};

/// An ordered sequence of rules for one chain, plus its default policy (`SPEC_FULL.md` §3).
pub struct Chain<'ctx> {
    pub name: ChainName,
    pub default_policy: Policy,
    pub rules: Vec<Rule<'ctx>>,
}

impl<'ctx> Chain<'ctx> {
    pub fn new(name: ChainName, default_policy: Policy, rules: Vec<Rule<'ctx>>) -> Self {
        Chain {
            name,
            default_policy,
            rules,
        }
    }

    /// Compiles every rule in the chain, in order. Must run to completion -- and thus fully
    /// settle the Interface Enum -- before [`Chain::assemble`] or the domain-bounds
    /// constraint are built (`SPEC_FULL.md` §3 "Lifecycle").
    pub fn compile_rules(&self, ctx: &SymbolContext<'ctx>) -> Result<(), RuleError> {
        for rule in &self.rules {
            crate::compiler::compile_rule(ctx, rule)?;
        }
        Ok(())
    }

    /// Assembles the first-match-wins formula (`SPEC_FULL.md` §4.3, algorithm steps 1-4).
    ///
    /// Every rule's compiled constraint is folded into `prior` regardless of target, but
    /// only `ACCEPT` rules contribute an `accepted` clause -- and that clause is guarded by
    /// the negation of every constraint seen strictly before it, which is what encodes
    /// first-match-wins as a single formula instead of a sequential evaluation.
    pub fn assemble(&self, ctx: &SymbolContext<'ctx>) -> Bool<'ctx> {
        let mut prior: Vec<Bool<'ctx>> = Vec::new();
        let mut accepted: Vec<Bool<'ctx>> = Vec::new();

        for rule in &self.rules {
            let constraint = match rule.cached_constraint().flatten() {
                Some(c) => c,
                None => continue,
            };

            if rule.target == Target::Accept {
                let clause = if prior.is_empty() {
                    constraint.clone()
                } else {
                    let refs: Vec<&Bool<'ctx>> = prior.iter().collect();
                    let not_prior = Bool::or(ctx.ctx, &refs).not();
                    Bool::and(ctx.ctx, &[&not_prior, &constraint])
                };
                accepted.push(clause);
            }

            prior.push(constraint);
        }

        if self.default_policy == Policy::Accept {
            accepted.push(Bool::from_bool(ctx.ctx, true));
        }

        if accepted.is_empty() {
            Bool::from_bool(ctx.ctx, false)
        } else {
            let refs: Vec<&Bool<'ctx>> = accepted.iter().collect();
            Bool::or(ctx.ctx, &refs)
        }
    }
}
