// Copyright 2017 - 2019 Pit Kleyersburg <pitkley@googlemail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified or distributed
// except according to those terms.

use clap::Parser;
use serde_json::json;
use slog::error;

use solvetables::attributor::Attribution;
use solvetables::cli::{Cli, OutputFormat};
use solvetables::logging::build_logger;
use solvetables::{run, Report};

fn print_text(report: &Report) {
    match report {
        Report::Unsat => println!("The provided constraints are not satisfiable."),
        Report::Sat { witness, attribution } => {
            println!("The identified model is:");
            println!();
            println!("Use the following parameters to create packet for desired effect:");
            println!("{}", witness.render_text());
            println!();
            match attribution {
                Attribution::Rule(text) => {
                    println!("The iptables rule hit is:");
                    println!("{}", text);
                }
                Attribution::DefaultPolicy => {
                    println!("No rule matched; the chain's default policy accepted this packet.");
                }
                Attribution::InternalInconsistency => {
                    println!("Internal inconsistency: solved sat but no rule admits the witness.");
                }
            }
        }
    }
}

fn print_json(report: &Report) {
    let value = match report {
        Report::Unsat => json!({ "satisfiable": false }),
        Report::Sat { witness, attribution } => {
            let attribution_json = match attribution {
                Attribution::Rule(text) => json!({ "kind": "rule", "text": text }),
                Attribution::DefaultPolicy => json!({ "kind": "default_policy" }),
                Attribution::InternalInconsistency => json!({ "kind": "internal_inconsistency" }),
            };
            json!({
                "satisfiable": true,
                "witness": witness,
                "attribution": attribution_json,
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&value).expect("witness/attribution are always serializable"));
}

fn main() {
    let cli = Cli::parse();
    let logger = build_logger(cli.verbose);

    match run(&cli, &logger) {
        Ok(report) => match cli.format {
            OutputFormat::Text => print_text(&report),
            OutputFormat::Json => print_json(&report),
        },
        Err(e) => {
            error!(logger, "run failed"; "error" => e.to_string());
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
