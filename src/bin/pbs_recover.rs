//! Runs a recovery pass over the job and reservation save directories, and
//! optionally the database, and prints what was recovered and discarded.
//!
//! Log level: `PBSSTORE_LOG`, then `RUST_LOG`, then `-v` / `-q`, default `warn`.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use pbsstore::{
    Config, PersistenceBuilder, Result,
    recovery::RecoverySummary,
};
use tracing::{Level, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "pbs_recover", version, about = "Recover PBS jobs, reservations and nodes from their save files")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// job save directory, overrides `paths.jobs`
    #[arg(long)]
    jobs: Option<PathBuf>,

    /// reservation save directory, overrides `paths.resvs`
    #[arg(long)]
    resvs: Option<PathBuf>,

    /// also recover jobs, reservations and nodes from the configured database
    #[arg(long)]
    db: bool,

    /// print the summaries as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn env_filter(args: &Args) -> EnvFilter {
    if let Ok(directives) = std::env::var("PBSSTORE_LOG") {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    EnvFilter::new(level.as_str())
}

fn init_tracing(args: &Args) {
    tracing_subscriber::registry().with(env_filter(args)).with(fmt::layer().with_writer(std::io::stderr).with_target(true).without_time().compact()).init();
}

fn run(args: &Args) -> Result<Vec<RecoverySummary>> {
    let config = match &args.config {
        Some(path) => Config::create(path)?,
        None => Config::default(),
    };
    let mut builder = PersistenceBuilder::from_config(config);
    if let Some(jobs) = &args.jobs {
        builder = builder.jobs_dir(jobs);
    }
    if let Some(resvs) = &args.resvs {
        builder = builder.resvs_dir(resvs);
    }
    let persistence = builder.build()?;
    let recovery = persistence.recovery();

    let mut summaries = vec![recovery.jobs_from_files()?.summary(), recovery.resvs_from_files()?.summary()];
    if args.db {
        summaries.push(recovery.jobs_from_db()?.summary());
        summaries.push(recovery.resvs_from_db()?.summary());
        summaries.push(recovery.nodes()?.summary());
    }
    Ok(summaries)
}

fn print_human(summaries: &[RecoverySummary]) {
    for s in summaries {
        println!("{}: {} recovered, {} discarded, {} stuck, {} stale copies", s.kind, s.recovered, s.discarded.len(), s.stuck.len(), s.stale_copies.len());
        for d in &s.discarded {
            println!("  discarded {} at {}: {}", d.candidate, d.stage, d.reason);
        }
        for path in &s.stuck {
            println!("  stuck {}", path);
        }
        for path in &s.stale_copies {
            println!("  stale copy {}", path);
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    let summaries = match run(&args) {
        Ok(summaries) => summaries,
        Err(e) => {
            error!("recovery failed: {}", e);
            eprintln!("pbs_recover: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&summaries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("pbs_recover: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_human(&summaries);
    }

    if summaries.iter().any(|s| !s.discarded.is_empty()) { ExitCode::from(2) } else { ExitCode::SUCCESS }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::Args;

    #[test]
    fn test_args() {
        let args = Args::parse_from(["pbs_recover", "-c", "/etc/pbs.toml", "--jobs", "/tmp/jobs", "--json", "-v"]);
        assert_eq!(args.config.unwrap().to_str(), Some("/etc/pbs.toml"));
        assert_eq!(args.jobs.unwrap().to_str(), Some("/tmp/jobs"));
        assert!(args.json && args.verbose && !args.db);
        assert!(Args::try_parse_from(["pbs_recover", "-v", "-q"]).is_err());
    }
}
