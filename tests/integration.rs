//! End-to-end scenarios straight out of `SPEC_FULL.md` §8, driving [`solvetables::run`]
//! through a real rules file on disk instead of in-memory strings.

use std::io::Write;

use clap::Parser;
use tempfile::NamedTempFile;

use solvetables::attributor::Attribution;
use solvetables::cli::Cli;
use solvetables::logging::build_logger;
use solvetables::{run, Report};

fn rules_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp rules file");
    write!(file, "{}", contents).expect("failed to write temp rules file");
    file
}

fn cli_for(chain: &str, path: &str, expression: &str) -> Cli {
    Cli::parse_from(["solvetables", chain, path, expression])
}

#[test]
fn scenario_default_accept_deny_one_host() {
    let file = rules_file("*filter\n:INPUT ACCEPT\n-A INPUT -s 10.0.0.5 -j DROP\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 10.0.0.5");
    let logger = build_logger(0);
    let report = run(&cli, &logger).unwrap();
    assert!(matches!(report, Report::Unsat));
}

#[test]
fn scenario_same_chain_different_source_falls_through_to_default_policy() {
    let file = rules_file("*filter\n:INPUT ACCEPT\n-A INPUT -s 10.0.0.5 -j DROP\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 10.0.0.6");
    let logger = build_logger(0);
    let report = run(&cli, &logger).unwrap();
    match report {
        Report::Sat { attribution, .. } => assert_eq!(attribution, Attribution::DefaultPolicy),
        Report::Unsat => panic!("expected sat"),
    }
}

#[test]
fn scenario_port_range_accept() {
    let file = rules_file("*filter\n:INPUT DROP\n-A INPUT -p tcp --dport 80:88 -j ACCEPT\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "dst_port == 85 and protocol == tcp");
    let logger = build_logger(0);
    let report = run(&cli, &logger).unwrap();
    match report {
        Report::Sat { attribution, .. } => {
            assert_eq!(
                attribution,
                Attribution::Rule("-A INPUT -p tcp --dport 80:88 -j ACCEPT".to_owned())
            );
        }
        Report::Unsat => panic!("expected sat"),
    }
}

#[test]
fn scenario_port_range_miss() {
    let file = rules_file("*filter\n:INPUT DROP\n-A INPUT -p tcp --dport 80:88 -j ACCEPT\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "dst_port == 90 and protocol == tcp");
    let logger = build_logger(0);
    let report = run(&cli, &logger).unwrap();
    assert!(matches!(report, Report::Unsat));
}

#[test]
fn scenario_negated_source() {
    let file = rules_file("*filter\n:INPUT DROP\n-A INPUT ! -s 10.0.0.0/24 -j ACCEPT\nCOMMIT\n");
    let logger = build_logger(0);

    let cli_miss = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 10.0.0.7");
    assert!(matches!(run(&cli_miss, &logger).unwrap(), Report::Unsat));

    let cli_hit = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 11.0.0.1");
    assert!(matches!(run(&cli_hit, &logger).unwrap(), Report::Sat { .. }));
}

#[test]
fn scenario_interface_first_sight() {
    let file = rules_file(
        "*filter\n:INPUT DROP\n-A INPUT -i eth0 -j ACCEPT\n-A INPUT -i eth1 -j DROP\nCOMMIT\n",
    );
    let logger = build_logger(0);

    let cli_eth1 = cli_for("INPUT", file.path().to_str().unwrap(), "in_iface == eth1");
    assert!(matches!(run(&cli_eth1, &logger).unwrap(), Report::Unsat));

    let cli_eth0 = cli_for("INPUT", file.path().to_str().unwrap(), "in_iface == eth0");
    assert!(matches!(run(&cli_eth0, &logger).unwrap(), Report::Sat { .. }));
}

#[test]
fn default_policy_is_detected_without_the_explicit_flag() {
    let file = rules_file("*filter\n:INPUT DROP\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 10.0.0.1");
    let logger = build_logger(0);
    assert!(matches!(run(&cli, &logger).unwrap(), Report::Unsat));
}

#[test]
fn missing_policy_line_without_override_is_a_usage_error() {
    let file = rules_file("*filter\nCOMMIT\n");
    let cli = cli_for("INPUT", file.path().to_str().unwrap(), "src_ip == 10.0.0.1");
    let logger = build_logger(0);
    assert!(run(&cli, &logger).is_err());
}
