// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

//! The Rule Parser (`SPEC_FULL.md` §4.1): turns one `-A <CHAIN> <options...>` line into a
//! [`Rule`].
//!
//! The Python original drove this off a dynamic `argparse` parser built at import time; here
//! the option surface is a static table (`OPTIONS`), matching the "explicit option schema"
//! redesign note in §9. Each entry just documents the aliases this hand-rolled tokenizer
//! recognizes below -- there is no argparse-equivalent crate pulled in for nine positional
//! long-options with ad-hoc mutual-exclusion rules, so the table is descriptive, not driven.

use std::str::FromStr;

use ipnetwork::Ipv4Network;

use crate::enums::{Protocol, State};
use crate::errors::RuleError;
use crate::rule::{Cidr, Dimension, MatchExtensions, PortSpec, Rule, Target};

/// The Python original's default `--sport`/`--dport`, preserved verbatim including its
/// six-digit upper bound -- see `SPEC_FULL.md` §9 on the port-width anomaly. The bound is
/// truncated to 16 bits only at constraint-build time (`compiler::compile_port`), exactly
/// where the original's `z3` numeral coercion truncated it.
const DEFAULT_PORT_SPEC: PortSpec = PortSpec::Range(0, 655_335);

/// Descriptive entry for one recognized dimensional option. Not consulted by the tokenizer
/// (which matches on literal strings below); documents the schema for readers, per the §9
/// "explicit option schema" redesign note. Every alias pair here (negated or not) is
/// mutually exclusive with its sibling within the same rule line -- `-i`/`--not-in-interface`,
/// `--sport`/`--sports`, and so on -- matching the Python original's `argparse`
/// mutually-exclusive groups (§4.1).
#[allow(dead_code)]
struct OptionSpec {
    aliases: &'static [&'static str],
    negated_alias: Option<&'static str>,
    takes_value: bool,
    dimension: &'static str,
}

#[allow(dead_code)]
const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        aliases: &["-s", "--source"],
        negated_alias: Some("--not-source"),
        takes_value: true,
        dimension: "src_ip",
    },
    OptionSpec {
        aliases: &["-d", "--destination"],
        negated_alias: Some("--not-destination"),
        takes_value: true,
        dimension: "dst_ip",
    },
    OptionSpec {
        aliases: &["-i", "--in-interface"],
        negated_alias: Some("--not-in-interface"),
        takes_value: true,
        dimension: "in_iface",
    },
    OptionSpec {
        aliases: &["-o", "--out-interface"],
        negated_alias: Some("--not-out-interface"),
        takes_value: true,
        dimension: "out_iface",
    },
    OptionSpec {
        aliases: &["-p", "--protocol"],
        negated_alias: None,
        takes_value: true,
        dimension: "protocol",
    },
    OptionSpec {
        aliases: &["--sport", "--sports"],
        negated_alias: None,
        takes_value: true,
        dimension: "src_port",
    },
    OptionSpec {
        aliases: &["--dport", "--dports"],
        negated_alias: None,
        takes_value: true,
        dimension: "dst_port",
    },
    OptionSpec {
        aliases: &["--state", "--ctstate"],
        negated_alias: None,
        takes_value: true,
        dimension: "state",
    },
    OptionSpec {
        aliases: &["-j", "--jump"],
        negated_alias: None,
        takes_value: true,
        dimension: "target",
    },
];

/// Normalizes `! --opt` / `! -x` into `--not-opt` / `-nx`, exactly as the Python original's
/// `_fix_not_rule` did, before tokenizing.
fn normalize_negation(line: &str) -> String {
    line.replace("! --", "--not-").replace("! -", "-n")
}

fn parse_cidr(rule_text: &str, value: &str) -> Result<Cidr, RuleError> {
    Ipv4Network::from_str(value)
        .map(Cidr::from)
        .map_err(|source| RuleError::InvalidCidr {
            rule: rule_text.to_owned(),
            value: value.to_owned(),
            source,
        })
}

fn parse_port_spec(rule_text: &str, spec: &str) -> Result<PortSpec, RuleError> {
    let malformed = || RuleError::MalformedPortSpec {
        rule: rule_text.to_owned(),
        spec: spec.to_owned(),
    };

    if let Some((lo, hi)) = spec.split_once(':') {
        let lo: u32 = lo.parse().map_err(|_| malformed())?;
        let hi: u32 = hi.parse().map_err(|_| malformed())?;
        Ok(PortSpec::Range(lo, hi))
    } else if spec.contains(',') {
        let ports = spec
            .split(',')
            .map(|p| p.parse::<u32>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PortSpec::List(ports))
    } else {
        spec.parse::<u32>().map(PortSpec::Single).map_err(|_| malformed())
    }
}

fn parse_state_list(rule_text: &str, spec: &str) -> Result<Vec<State>, RuleError> {
    spec.split(',')
        .map(|s| {
            State::from_str(s).map_err(|_| RuleError::UnknownState {
                rule: rule_text.to_owned(),
                name: s.to_owned(),
            })
        })
        .collect()
}

fn parse_target(value: &str) -> Target {
    match value {
        "ACCEPT" => Target::Accept,
        "DROP" => Target::Drop,
        "REJECT" => Target::Reject,
        other => Target::Chain(other.to_owned()),
    }
}

/// Parses one `-A <CHAIN> <options...>` rule line into a [`Rule`].
pub fn parse_rule_line<'ctx>(line: &str) -> Result<Rule<'ctx>, RuleError> {
    let rule_text = line.to_owned();
    let normalized = normalize_negation(line);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let malformed = |message: &str| RuleError::Malformed {
        rule: rule_text.clone(),
        message: message.to_owned(),
    };

    let mut source = None;
    let mut not_source = None;
    let mut destination = None;
    let mut not_destination = None;
    let mut in_iface: Option<String> = None;
    let mut not_in_iface: Option<String> = None;
    let mut out_iface: Option<String> = None;
    let mut not_out_iface: Option<String> = None;
    let mut protocol = Protocol::All;
    let mut sport: Option<PortSpec> = None;
    let mut sports: Option<PortSpec> = None;
    let mut dport: Option<PortSpec> = None;
    let mut dports: Option<PortSpec> = None;
    let mut state = None;
    let mut target = None;
    let mut extensions = MatchExtensions::default();

    fn take_value<'t>(
        tokens: &[&'t str],
        i: &mut usize,
        token: &str,
        rule_text: &str,
    ) -> Result<&'t str, RuleError> {
        *i += 1;
        tokens.get(*i).copied().ok_or_else(|| RuleError::Malformed {
            rule: rule_text.to_owned(),
            message: format!("'{}' is missing its value", token),
        })
    }

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        macro_rules! take_value {
            () => {
                take_value(&tokens, &mut i, token, &rule_text)?
            };
        }

        match token {
            "-A" => {
                let _chain = take_value!();
            }
            "-s" | "--source" => source = Some(parse_cidr(&rule_text, take_value!())?),
            "--not-source" | "-ns" => not_source = Some(parse_cidr(&rule_text, take_value!())?),
            "-d" | "--destination" => destination = Some(parse_cidr(&rule_text, take_value!())?),
            "--not-destination" | "-nd" => {
                not_destination = Some(parse_cidr(&rule_text, take_value!())?)
            }
            "-i" | "--in-interface" => in_iface = Some(take_value!().to_owned()),
            "--not-in-interface" | "-ni" => not_in_iface = Some(take_value!().to_owned()),
            "-o" | "--out-interface" => out_iface = Some(take_value!().to_owned()),
            "--not-out-interface" | "-no" => not_out_iface = Some(take_value!().to_owned()),
            "-p" | "--protocol" => {
                let name = take_value!();
                protocol = Protocol::from_str(name).map_err(|_| RuleError::UnknownProtocol {
                    rule: rule_text.clone(),
                    name: name.to_owned(),
                })?;
            }
            "--sport" => sport = Some(parse_port_spec(&rule_text, take_value!())?),
            "--sports" => sports = Some(parse_port_spec(&rule_text, take_value!())?),
            "--dport" => dport = Some(parse_port_spec(&rule_text, take_value!())?),
            "--dports" => dports = Some(parse_port_spec(&rule_text, take_value!())?),
            "--state" | "--ctstate" => state = Some(parse_state_list(&rule_text, take_value!())?),
            "-j" | "--jump" => target = Some(parse_target(take_value!())),
            "-m" | "--match" => extensions.match_ext = Some(take_value!().to_owned()),
            "--tcp-flags" => {
                let a = take_value!().to_owned();
                let b = take_value!().to_owned();
                extensions.tcp_flags = Some((a, b));
            }
            "--icmp-type" => extensions.icmp_type = Some(take_value!().to_owned()),
            "--set" => extensions.set = true,
            "--name" => extensions.name = Some(take_value!().to_owned()),
            "--mask" => extensions.mask = Some(take_value!().to_owned()),
            "--rsource" => extensions.rsource = true,
            "--rcheck" => extensions.rcheck = true,
            "--seconds" => extensions.seconds = Some(take_value!().to_owned()),
            "-f" | "--fragment" => extensions.fragment = Some(take_value!().to_owned()),
            "-c" | "--set-counters" => extensions.set_counters = Some(take_value!().to_owned()),
            // Unrecognized tokens following a match-extension keyword are tolerated (§4.1);
            // they are simply skipped rather than rejected.
            _ => {}
        }
        i += 1;
    }

    if source.is_some() && not_source.is_some() {
        return Err(malformed("-s/--source and --not-source are mutually exclusive"));
    }
    if destination.is_some() && not_destination.is_some() {
        return Err(malformed(
            "-d/--destination and --not-destination are mutually exclusive",
        ));
    }
    if in_iface.is_some() && not_in_iface.is_some() {
        return Err(malformed(
            "-i/--in-interface and --not-in-interface are mutually exclusive",
        ));
    }
    if out_iface.is_some() && not_out_iface.is_some() {
        return Err(malformed(
            "-o/--out-interface and --not-out-interface are mutually exclusive",
        ));
    }
    if sport.is_some() && sports.is_some() {
        return Err(malformed("--sport and --sports are mutually exclusive"));
    }
    if dport.is_some() && dports.is_some() {
        return Err(malformed("--dport and --dports are mutually exclusive"));
    }

    let in_iface = match (in_iface, not_in_iface) {
        (Some(value), None) => Dimension { value: Some(value), invert: false },
        (None, Some(value)) => Dimension { value: Some(value), invert: true },
        (None, None) => Dimension::none(),
        (Some(_), Some(_)) => unreachable!("mutual exclusivity checked above"),
    };
    let out_iface = match (out_iface, not_out_iface) {
        (Some(value), None) => Dimension { value: Some(value), invert: false },
        (None, Some(value)) => Dimension { value: Some(value), invert: true },
        (None, None) => Dimension::none(),
        (Some(_), Some(_)) => unreachable!("mutual exclusivity checked above"),
    };
    let src_port = sport.or(sports).unwrap_or(DEFAULT_PORT_SPEC);
    let dst_port = dport.or(dports).unwrap_or(DEFAULT_PORT_SPEC);

    Ok(Rule::new(
        rule_text,
        target.unwrap_or(Target::Chain(String::new())),
        source,
        not_source,
        destination,
        not_destination,
        in_iface,
        out_iface,
        protocol,
        src_port,
        dst_port,
        state,
        extensions,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Target;

    #[test]
    fn parses_simple_accept_rule() {
        let rule = parse_rule_line::<'static>("-A INPUT -s 10.0.0.5 -j DROP").unwrap();
        assert_eq!(rule.target, Target::Drop);
        assert_eq!(rule.source.unwrap().low, u32::from(std::net::Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn normalizes_negated_long_option() {
        let rule = parse_rule_line::<'static>("-A INPUT ! -s 10.0.0.0/24 -j ACCEPT").unwrap();
        assert!(rule.not_source.is_some());
        assert!(rule.source.is_none());
    }

    #[test]
    fn rejects_malformed_cidr() {
        let err = parse_rule_line::<'static>("-A INPUT -s not-an-ip -j ACCEPT");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unknown_protocol() {
        let err = parse_rule_line::<'static>("-A INPUT -p carrier-pigeon -j ACCEPT");
        assert!(matches!(err, Err(RuleError::UnknownProtocol { .. })));
    }

    #[test]
    fn parses_port_range() {
        let rule = parse_rule_line::<'static>("-A INPUT -p tcp --dport 80:88 -j ACCEPT").unwrap();
        assert_eq!(rule.dst_port, PortSpec::Range(80, 88));
    }

    #[test]
    fn tolerates_recognized_but_inert_extensions() {
        let rule = parse_rule_line::<'static>(
            "-A INPUT -m conntrack --ctstate NEW -m comment --comment hello -j ACCEPT",
        )
        .unwrap();
        assert_eq!(rule.state, Some(vec![State::New]));
    }

    #[test]
    fn rejects_both_in_interface_and_not_in_interface() {
        let err = parse_rule_line::<'static>("-A INPUT -i eth0 --not-in-interface eth1 -j ACCEPT");
        assert!(matches!(err, Err(RuleError::Malformed { .. })));
    }

    #[test]
    fn rejects_both_out_interface_and_not_out_interface() {
        let err = parse_rule_line::<'static>("-A INPUT -o eth0 --not-out-interface eth1 -j ACCEPT");
        assert!(matches!(err, Err(RuleError::Malformed { .. })));
    }

    #[test]
    fn rejects_both_sport_and_sports() {
        let err = parse_rule_line::<'static>("-A INPUT --sport 80 --sports 81 -j ACCEPT");
        assert!(matches!(err, Err(RuleError::Malformed { .. })));
    }

    #[test]
    fn rejects_both_dport_and_dports() {
        let err = parse_rule_line::<'static>("-A INPUT --dport 80 --dports 81 -j ACCEPT");
        assert!(matches!(err, Err(RuleError::Malformed { .. })));
    }
}
