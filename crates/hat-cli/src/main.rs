//! Hat command line runner
//!
//! Loads a scenario file and runs its named tests, reporting each result as
//! it is produced.
//!
//! Usage:
//!   hat [-f hatfile.yaml] [-v...] [-j] run <name> [--route 1,2] [--host URL] [--session|--no-session]
//!   hat runall
//!   hat list [name]

mod output;
mod runner;
mod scenario;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use hat_engine::RenderPolicy;
use output::{report, JsonOutput, OutputWriter, ReadableOutput};
use runner::{Runner, TestArgs};
use scenario::{ScenarioFile, DEFAULT_FILE};
use std::path::PathBuf;

/// Hat - declarative HTTP scenario tests
#[derive(Parser, Debug)]
#[command(name = "hat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file to load
    #[arg(short, long, default_value = DEFAULT_FILE, env = "HAT_FILE", global = true)]
    file: PathBuf,

    /// Increase output detail (-v headers, -vv bodies)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as a JSON array
    #[arg(short, long, global = true)]
    json: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    /// Which results of a group to show
    #[arg(long, value_enum, default_value_t = Report::Failures, global = true)]
    report: Report,

    /// Log level for diagnostics written to stderr
    #[arg(long, default_value = "warn", env = "HAT_LOG", global = true)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one test by name
    Run {
        /// Test name ('-' and '_' are interchangeable)
        name: String,

        #[command(flatten)]
        test: TestOptions,
    },

    /// Run every test in the scenario file
    Runall {
        #[command(flatten)]
        test: TestOptions,
    },

    /// Show the available tests
    List {
        /// Only describe this test
        name: Option<String>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args, Debug)]
struct TestOptions {
    /// Routes to run, as 1-based indices (see `hat list -v`)
    #[arg(long)]
    route: Option<String>,

    /// Hosts to run against, comma separated
    #[arg(long)]
    host: Option<String>,

    /// Reuse one HTTP connection pool for the whole run
    #[arg(long, overrides_with = "no_session")]
    session: bool,

    /// Use a fresh HTTP client for every call
    #[arg(long, overrides_with = "session")]
    no_session: bool,
}

impl From<TestOptions> for TestArgs {
    fn from(options: TestOptions) -> Self {
        let session = match (options.session, options.no_session) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        TestArgs {
            route: options.route,
            host: options.host,
            session,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Report {
    /// Every result of a group
    All,
    /// Failed results; passing ones only with -v
    Failures,
}

impl From<Report> for RenderPolicy {
    fn from(report: Report) -> Self {
        match report {
            Report::All => RenderPolicy::Flat,
            Report::Failures => RenderPolicy::Filtered,
        }
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(args.log_level.into()),
        )
        .init();

    let code = match run(args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> anyhow::Result<bool> {
    if let Command::Completions { shell } = args.command {
        clap_complete::generate(shell, &mut Args::command(), "hat", &mut std::io::stdout());
        return Ok(true);
    }

    let scenario = ScenarioFile::from_file(&args.file)?;
    tracing::debug!(
        file = %args.file.display(),
        hosts = scenario.hosts.len(),
        routes = scenario.routes.len(),
        suites = scenario.suites.len(),
        "loaded scenario"
    );

    let mut output: Box<dyn OutputWriter> = if args.json {
        Box::new(JsonOutput::stdout())
    } else {
        Box::new(ReadableOutput::stdio(
            args.verbose,
            !args.no_color,
            args.report.into(),
        ))
    };

    let success = match args.command {
        Command::Run { name, test } => {
            let runner = Runner::new(&scenario, test.into());
            report(runner.run(&name), output.as_mut())
        }
        Command::Runall { test } => {
            let runner = Runner::new(&scenario, test.into());
            report(runner.run_all(), output.as_mut())
        }
        Command::List { name } => {
            let runner = Runner::new(&scenario, TestArgs::default());
            for line in runner.help(name.as_deref(), args.verbose > 0) {
                println!("{line}");
            }
            Ok(true)
        }
        Command::Completions { .. } => Ok(true),
    }
    .context("Failed to write results")?;

    Ok(success)
}
