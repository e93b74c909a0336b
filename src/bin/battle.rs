//! Battle CLI
//!
//! Pit the engines of a directory against each other and append results to a CSV log.

use std::{env, process::ExitCode, time::Duration};

use anyhow::{bail, Context};
use engine_battle::prelude::*;

fn print_usage() {
    println!("Engine battle orchestrator");
    println!();
    println!("Usage:");
    println!("  battle <engine_dir> [--repetitions N] [--budget N] [--cap N]");
    println!("                      [--log-file PATH] [--timeout-ms N] [--round-robin]");
    println!();
    println!("Engines are paired by family (file name containing 'hybrid', 'uct' or 'ab'):");
    println!("hybrid vs uct, hybrid vs ab, then uct vs ab. --round-robin pairs everyone.");
    println!();
    println!("Settings not given on the command line are read from BATTLE_* variables.");
}

struct Args {
    directory: String,
    config: Configuration,
    round_robin: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let Some(directory) = args.first() else {
        bail!("missing engine directory");
    };
    let mut config = Configuration::from_env();
    let mut round_robin = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--repetitions" | "-r" => {
                config = config.with_repetitions(value(args, &mut i, flag)?.parse()?)
            }
            "--budget" | "-b" => {
                config = config.with_match_budget(Some(value(args, &mut i, flag)?.parse()?))
            }
            "--cap" | "-c" => config = config.with_row_cap(value(args, &mut i, flag)?.parse()?),
            "--log-file" | "-o" => config = config.with_result_log(value(args, &mut i, flag)?),
            "--timeout-ms" | "-t" => {
                let ms: u64 = value(args, &mut i, flag)?.parse()?;
                config = config.with_response_timeout(Some(Duration::from_millis(ms)));
            }
            "--round-robin" => round_robin = true,
            other => bail!("unknown option '{other}'"),
        }
        i += 1;
    }

    Ok(Args {
        directory: directory.clone(),
        config,
        round_robin,
    })
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("{flag} expects a value"))
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e:#}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let arena = Arena::new(args.config);
    let result = if args.round_robin {
        arena.battle(&args.directory, RoundRobin)
    } else {
        arena.battle(&args.directory, FamilyGauntlet::default())
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
