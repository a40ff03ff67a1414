// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! Typed error values for every compilation stage.
//!
//! Each stage gets its own `Fail`-deriving enum so the CLI front-end can match on the
//! kind to decide wording and exit status (see the error handling design in `SPEC_FULL.md`
//! §7). Application code otherwise threads `failure::Error` through `?`, since `failure::Error`
//! has a blanket `From<F: Fail>`.

use failure::Fail;

/// Errors surfaced while parsing CLI arguments, loading the rules file, or detecting the
/// default policy -- anything that happens before a single rule line is compiled.
#[derive(Debug, Fail)]
pub enum UsageError {
    #[fail(
        display = "unknown chain '{}': expected one of INPUT, FORWARD, OUTPUT",
        name
    )]
    UnknownChain { name: String },

    #[fail(
        display = "unable to detect default policy for chain '{}', pass --default-policy",
        chain
    )]
    UndetectedDefaultPolicy { chain: String },

    #[fail(display = "could not read rules file '{}': {}", path, source)]
    RulesFileUnreadable {
        path: String,
        #[fail(cause)]
        source: std::io::Error,
    },

    #[fail(display = "expression must not be empty")]
    EmptyExpression,
}

/// Errors raised while compiling one rule line into a [`crate::rule::Rule`].
#[derive(Debug, Fail)]
pub enum RuleError {
    #[fail(display = "rule `{}`: invalid CIDR '{}': {}", rule, value, source)]
    InvalidCidr {
        rule: String,
        value: String,
        #[fail(cause)]
        source: ipnetwork::IpNetworkError,
    },

    #[fail(display = "rule `{}`: unknown protocol '{}'", rule, name)]
    UnknownProtocol { rule: String, name: String },

    #[fail(display = "rule `{}`: malformed port spec '{}'", rule, spec)]
    MalformedPortSpec { rule: String, spec: String },

    #[fail(display = "rule `{}`: unknown connection state '{}'", rule, name)]
    UnknownState { rule: String, name: String },

    #[fail(display = "rule `{}`: {}", rule, message)]
    Malformed { rule: String, message: String },
}

/// Errors raised while compiling the user's predicate expression.
#[derive(Debug, Fail)]
pub enum ExpressionError {
    #[fail(display = "unknown field '{}'", name)]
    UnknownOperand { name: String },

    #[fail(display = "unknown operator '{}'", op)]
    UnknownOperator { op: String },

    #[fail(display = "unknown concatenation operator '{}', expected 'and' or 'or'", op)]
    UnknownConcatOperator { op: String },

    #[fail(display = "invalid literal '{}' for field '{}'", literal, operand)]
    InvalidLiteral { operand: String, literal: String },

    #[fail(
        display = "expression has {} token(s), expected a count congruent to 3 mod 4",
        count
    )]
    BadTokenCount { count: usize },
}

/// Errors raised by the solver driver itself, as opposed to an ordinary unsat result.
#[derive(Debug, Fail)]
pub enum SolverError {
    #[fail(display = "failed to initialize SMT context: {}", message)]
    ContextInit { message: String },
}
