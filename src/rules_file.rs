// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! Loading the rules file and detecting the default policy (`SPEC_FULL.md` §6) -- one of the
//! collaborators specified only at its interface (§1 "out of scope"), but still implemented
//! here since a CLI has to read its input somehow.

use regex::Regex;

use crate::enums::Policy;
use crate::errors::UsageError;

/// Reads `path` and returns its raw contents.
pub fn read_rules_file(path: &str) -> Result<String, UsageError> {
    std::fs::read_to_string(path).map_err(|source| UsageError::RulesFileUnreadable {
        path: path.to_owned(),
        source,
    })
}

/// Returns the lines of `contents` that append to `chain`, i.e. start with `-A <chain> `
/// (`SPEC_FULL.md` §6 "Rules file format").
pub fn rule_lines_for_chain<'a>(contents: &'a str, chain: &str) -> Vec<&'a str> {
    let prefix = format!("-A {} ", chain);
    contents.lines().filter(|line| line.starts_with(&prefix)).collect()
}

/// Detects the default policy for `chain` from an anchored `:<CHAIN> <POLICY>` line
/// (`SPEC_FULL.md` §6). Returns `None` if no such line exists, leaving the caller to fall
/// back to a usage error asking for `--default-policy`.
pub fn detect_default_policy(contents: &str, chain: &str) -> Option<Policy> {
    let pattern = format!(r"(?m)^:{}\s+(ACCEPT|DROP|REJECT)", regex::escape(chain));
    let re = Regex::new(&pattern).expect("pattern is built from a fixed template");
    re.captures(contents)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolves the default policy, consulting `--default-policy` first and falling back to
/// detection (`SPEC_FULL.md` §6).
pub fn resolve_default_policy(
    explicit: Option<Policy>,
    contents: &str,
    chain: &str,
) -> Result<Policy, UsageError> {
    if let Some(policy) = explicit {
        return Ok(policy);
    }
    detect_default_policy(contents, chain).ok_or_else(|| UsageError::UndetectedDefaultPolicy {
        chain: chain.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "*filter\n:INPUT DROP\n:FORWARD ACCEPT\n:OUTPUT ACCEPT\n-A INPUT -s 10.0.0.5 -j DROP\n-A INPUT -j ACCEPT\nCOMMIT\n";

    #[test]
    fn filters_rule_lines_by_chain() {
        let lines = rule_lines_for_chain(SAMPLE, "INPUT");
        assert_eq!(lines, vec!["-A INPUT -s 10.0.0.5 -j DROP", "-A INPUT -j ACCEPT"]);
    }

    #[test]
    fn detects_default_policy_from_anchored_line() {
        assert_eq!(detect_default_policy(SAMPLE, "INPUT"), Some(Policy::Drop));
        assert_eq!(detect_default_policy(SAMPLE, "FORWARD"), Some(Policy::Accept));
    }

    #[test]
    fn returns_none_when_policy_line_is_absent() {
        assert_eq!(detect_default_policy("*filter\nCOMMIT\n", "INPUT"), None);
    }

    #[test]
    fn explicit_policy_shortcircuits_detection() {
        let resolved = resolve_default_policy(Some(Policy::Reject), SAMPLE, "INPUT").unwrap();
        assert_eq!(resolved, Policy::Reject);
    }

    #[test]
    fn undetectable_policy_is_a_usage_error() {
        let err = resolve_default_policy(None, "*filter\nCOMMIT\n", "INPUT");
        assert!(matches!(err, Err(UsageError::UndetectedDefaultPolicy { .. })));
    }
}
