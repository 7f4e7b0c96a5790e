use clap::{Parser, Subcommand};

use std::io::{self, BufRead, Write};

use singleton::{
    check_singleton, colors_enabled, GuardConfig, StatusRecord, WriterSink, DEFAULT_BOUNDARY,
    DEFAULT_NAMESPACE, ROOT_ENV,
};

/// detect a running instance through access-controlled private namespaces
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Override the directory backing the lock-file fallback (non-Windows).
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<std::path::PathBuf>,

    /// Boundary descriptor name; must match across instances.
    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_BOUNDARY)]
    boundary: String,

    /// Private namespace name; must match across instances.
    #[arg(long, global = true, value_name = "NAME", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Disable ANSI colors in the report.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check, then keep the claim until a line (or EOF) arrives on stdin
    Run,

    /// Check, print the report and release immediately
    Check {
        /// Print a JSON document instead of the plain report
        #[arg(long)]
        json: bool,
    },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::new().filter_or("SINGLETON_LOG", "warn")).init();

    // If a custom directory is given, export it so that the configuration
    // layer picks it up the same way as a user-provided environment.
    if let Some(dir) = &cli.dir {
        std::env::set_var(ROOT_ENV, dir);
    }

    let config = GuardConfig::from_env()
        .with_boundary(cli.boundary.as_str())
        .with_namespace(cli.namespace.as_str());
    let color = !cli.no_color && colors_enabled();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, color),
        Commands::Check { json: false } => check(&config, color),
        Commands::Check { json: true } => check_json(&config),
    }
}

fn run(config: &GuardConfig, color: bool) -> io::Result<()> {
    let mut sink = WriterSink::new(io::stdout(), color);
    let (guard, status) = check_singleton(config, &mut sink)?;
    sink.finish()?;
    log::info!("check finished: {status:?}");

    // Hold every handle until dismissed. Only the line break matters, so the
    // input is never decoded. Whatever the outcome, the exit status stays 0.
    let mut line = Vec::new();
    io::stdin().lock().read_until(b'\n', &mut line)?;

    drop(guard);
    log::info!("released");
    Ok(())
}

fn check(config: &GuardConfig, color: bool) -> io::Result<()> {
    let mut sink = WriterSink::new(io::stdout(), color);
    let (guard, status) = check_singleton(config, &mut sink)?;
    drop(guard);
    log::info!("check finished: {status:?}");
    sink.finish()
}

fn check_json(config: &GuardConfig) -> io::Result<()> {
    let mut report: Vec<String> = Vec::new();
    let (guard, status) = check_singleton(config, &mut report)?;
    let record = StatusRecord::new(&status, guard.owns_namespace(), report);
    drop(guard);

    let json = serde_json::to_string_pretty(&record)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}")?;
    stdout.flush()
}
