//! CLI entry point for the nugetfix tool.
//!
//! Reconciles the package references of a `packages.config` solution so
//! every project uses the highest referenced version of each package.
//!
//! # Usage
//!
//! ```bash
//! nugetfix [OPTIONS] [SOLUTION]
//!
//! # Reconcile the only .sln in the current directory
//! nugetfix
//!
//! # Reconcile every project file found below a directory
//! nugetfix --discover path/to/repo
//!
//! # Report package usage as JSON without changing anything
//! nugetfix --scan App.sln --output packages.json
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use color_eyre::eyre::{WrapErr, eyre};
use nf_core::Config;
use nf_reconcile::{Reconciler, Solution};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Normalizes package references, package manifests and binding redirects
/// across the projects of a solution.
#[derive(Parser)]
#[command(name = "nugetfix", version, about, long_about = None)]
struct Cli {
    /// Solution file, or a directory with `--discover`.
    ///
    /// Defaults to the only `.sln` file in the current directory.
    solution: Option<Utf8PathBuf>,

    /// Reconcile every project file found below the directory instead of
    /// the projects listed in a solution file.
    #[arg(long)]
    discover: bool,

    /// Report package usage as JSON without writing any file.
    #[arg(long)]
    scan: bool,

    /// Output file for `--scan` (defaults to stdout).
    #[arg(short, long, requires = "scan")]
    output: Option<Utf8PathBuf>,

    /// Configuration file.
    ///
    /// Defaults to `<solution name>.nugetfix.json` beside the solution.
    #[arg(short, long, env = "NUGETFIX_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Loads the configuration for a solution.
///
/// An explicit `--config` file must exist. Otherwise
/// `<name>.nugetfix.json` in the solution directory is used when present.
fn load_config(explicit: Option<&Utf8Path>, dir: &Utf8Path, name: &str) -> color_eyre::Result<Config> {
    let path = match explicit {
        Some(path) => path.to_owned(),
        None => {
            let beside = dir.join(format!("{name}.nugetfix.json"));
            if !beside.is_file() {
                return Ok(Config::default());
            }
            beside
        }
    };
    info!(path = %path, "Loading configuration");
    Config::load(&path).wrap_err_with(|| format!("Invalid configuration: {path}"))
}

/// Returns the working directory as a UTF-8 path.
fn current_dir() -> color_eyre::Result<Utf8PathBuf> {
    let dir = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|dir| eyre!("Working directory is not valid UTF-8: {}", dir.display()))
}

/// Resolves the directory argument of `--discover`.
fn resolve_dir(path: Option<&Utf8Path>) -> color_eyre::Result<Utf8PathBuf> {
    let dir = match path {
        Some(path) => path.to_owned(),
        None => current_dir()?,
    };
    if !dir.is_dir() {
        return Err(eyre!("Path is not a directory: {dir}"));
    }
    Ok(dir.canonicalize_utf8()?)
}

/// Resolves the solution file argument.
///
/// A directory argument, or no argument, selects the only `.sln` file in
/// that directory.
fn resolve_solution_file(path: Option<&Utf8Path>) -> color_eyre::Result<Utf8PathBuf> {
    let path = match path {
        Some(path) if path.is_dir() => Solution::locate(path)?,
        Some(path) if path.is_file() => path.to_owned(),
        Some(path) => return Err(eyre!("Solution does not exist: {path}")),
        None => Solution::locate(&current_dir()?)?,
    };
    Ok(path.canonicalize_utf8()?)
}

/// Builds the solution to work on and its configuration.
fn open_solution(cli: &Cli) -> color_eyre::Result<(Solution, Config)> {
    if cli.discover {
        let dir = resolve_dir(cli.solution.as_deref())?;
        let name = dir.file_name().unwrap_or("solution").to_owned();
        let config = load_config(cli.config.as_deref(), &dir, &name)?;
        let solution = Solution::discover(&dir, &config.discovery)?;
        return Ok((solution, config));
    }

    let sln = resolve_solution_file(cli.solution.as_deref())?;
    let dir = sln.parent().map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned);
    let name = sln.file_stem().unwrap_or("solution").to_owned();
    let config = load_config(cli.config.as_deref(), &dir, &name)?;
    let solution = Solution::load(&sln, &config.discovery)?;
    Ok((solution, config))
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs a full reconciliation and prints the change report.
///
/// # Errors
///
/// Returns an error if the run could not start or was aborted.
fn run_reconcile(solution: &Solution, config: Config) -> color_eyre::Result<()> {
    let summary = Reconciler::new(config).reconcile(solution)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write!(handle, "{}", summary.report)?;

    if summary.aborted {
        return Err(eyre!("Reconciliation of {} was aborted", solution.name()));
    }
    Ok(())
}

/// Runs a read-only scan and writes the JSON report.
///
/// # Errors
///
/// Returns an error if scanning or writing fails.
fn run_scan(solution: &Solution, config: Config, output: Option<&Utf8Path>) -> color_eyre::Result<()> {
    let report = Reconciler::new(config).scan(solution)?;
    let json = report.to_json()?;

    if let Some(output_path) = output {
        std::fs::write(output_path, format!("{json}\n"))?;
        info!(path = %output_path, "Scan report written");
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}")?;
    }
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to the selected mode
    let (solution, config) = open_solution(&cli)?;
    if cli.scan {
        run_scan(&solution, config, cli.output.as_deref())
    } else {
        run_reconcile(&solution, config)
    }
}
