//! `archgraph` command-line entry point

use anyhow::Context;
use archgraph_cli::commands::{self, render};
use archgraph_cli::{logging, ArchgraphConfig};
use archgraph_governance::{Actor, Role};
use archgraph_repository::ImportMode;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .long("snapshot")
        .short('s')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Repository snapshot file")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn actor_args() -> [Arg; 2] {
    [
        Arg::new("actor")
            .long("actor")
            .default_value("archgraph")
            .help("User recorded in bookkeeping and audit events"),
        Arg::new("role")
            .long("role")
            .default_value("architect")
            .value_parser(|s: &str| s.parse::<Role>())
            .help("viewer, contributor, architect or owner"),
    ]
}

fn out_arg() -> Arg {
    Arg::new("out")
        .long("out")
        .short('o')
        .value_parser(value_parser!(PathBuf))
        .help("Write the new snapshot here instead of over --snapshot")
}

fn cli() -> Command {
    Command::new("archgraph")
        .version(archgraph_governance::VERSION)
        .about("Versioned enterprise-architecture repository with governed commits")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("archgraph.toml to load"),
        )
        .subcommand(
            Command::new("stats")
                .about("Summarize a snapshot")
                .arg(snapshot_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a change document without committing")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("changes")
                        .long("changes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Change document"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("commit")
                .about("Commit a change document")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("changes")
                        .long("changes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Change document"),
                )
                .args(actor_args())
                .arg(out_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("import")
                .about("Apply a batch import")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Batch file with objects and relationships"),
                )
                .arg(
                    Arg::new("upsert")
                        .long("upsert")
                        .action(ArgAction::SetTrue)
                        .help("Replace existing ids instead of rejecting them"),
                )
                .args(actor_args())
                .arg(out_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("history")
                .about("Commit change documents in order and print the audit trail")
                .arg(snapshot_arg())
                .arg(
                    Arg::new("changes")
                        .long("changes")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Change document; repeat to commit several"),
                )
                .args(actor_args())
                .arg(json_arg()),
        )
}

fn path(args: &ArgMatches, name: &str) -> anyhow::Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("--{name} is required"))
}

fn actor(args: &ArgMatches) -> Actor {
    let name = args
        .get_one::<String>("actor")
        .map_or("archgraph", String::as_str);
    let role = args
        .get_one::<Role>("role")
        .copied()
        .unwrap_or(Role::Architect);
    Actor::new(name, role)
}

/// Runs the selected command; `Ok(false)` means refused or blocking
fn run(matches: &ArgMatches) -> anyhow::Result<bool> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ArchgraphConfig::load(path)?,
        None => ArchgraphConfig::default(),
    };
    logging::init(&config.logging)?;

    let Some((name, args)) = matches.subcommand() else {
        return Ok(true);
    };
    let json = args.get_flag("json");
    let (output, ok) = match name {
        "stats" => {
            let report = commands::stats(&config, &path(args, "snapshot")?)?;
            (render(&report, json)?, true)
        }
        "validate" => {
            let report =
                commands::validate(&config, &path(args, "snapshot")?, &path(args, "changes")?)?;
            (render(&report, json)?, !report.is_blocking())
        }
        "commit" => {
            let report = commands::commit(
                &config,
                &path(args, "snapshot")?,
                &path(args, "changes")?,
                actor(args),
                args.get_one::<PathBuf>("out").map(PathBuf::as_path),
            )?;
            (render(&report, json)?, report.applied)
        }
        "import" => {
            let mode = if args.get_flag("upsert") {
                ImportMode::Upsert
            } else {
                ImportMode::CreateOnly
            };
            let report = commands::import(
                &config,
                &path(args, "snapshot")?,
                &path(args, "batch")?,
                mode,
                actor(args),
                args.get_one::<PathBuf>("out").map(PathBuf::as_path),
            )?;
            (render(&report, json)?, report.applied)
        }
        "history" => {
            let changes: Vec<PathBuf> = args
                .get_many::<PathBuf>("changes")
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default();
            let report = commands::history(&config, &path(args, "snapshot")?, &changes, actor(args))?;
            (render(&report, json)?, report.intact)
        }
        other => anyhow::bail!("unknown command {other}"),
    };
    println!("{}", output.trim_end());
    Ok(ok)
}

fn main() -> ExitCode {
    match run(&cli().get_matches()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
