//! The `he-bench` binary: parses the CLI, validates the paths it was given,
//! and hands off to [`he_bench::driver::run`].

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use he_bench::driver::{self, DriverOptions, DriverOutcome};
use he_bench::error::HarnessError;

/// A homomorphic-encryption backend benchmarking harness.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the backend shared library.
    #[arg(short = 'b', long)]
    backend_lib_path: PathBuf,

    /// Path to the YAML run configuration.
    #[arg(short = 'c', long, default_value = "benchmark_config.yaml")]
    benchmark_config_file: PathBuf,

    /// Write the default configuration implied by the backend's registered
    /// benchmarks to `benchmark_config_file`, then exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    dump_config: bool,

    /// Validate every result sample against the reference computation.
    #[arg(short = 'v', long, default_value_t = true, action = clap::ArgAction::Set)]
    enable_validation: bool,

    /// Print the final summary table to stdout.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    run_overview: bool,

    /// Process-wide random seed. Defaults to the current wall-clock time.
    #[arg(long)]
    random_seed: Option<u64>,

    /// Milliseconds to sleep between benchmarks.
    #[arg(long, default_value_t = 1000)]
    report_delay: u64,

    /// Root directory under which per-benchmark reports are written.
    #[arg(long, default_value = ".")]
    report_root_path: PathBuf,

    /// Flatten the report directory layout to a single level, joining path
    /// segments with `-` instead of nesting directories.
    #[arg(long = "single-path-report", default_value_t = false, action = clap::ArgAction::Set)]
    single_path_report: bool,
}

/// A path under `/tmp/`, or a symlink anywhere, is rejected for the backend
/// library and the config file.
fn check_path_security(path: &Path, label: &str) -> Result<(), HarnessError> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if metadata.file_type().is_symlink() {
            return Err(HarnessError::ConfigError {
                location: label.to_string(),
                reason: format!("{} must not be a symlink", path.display()),
            });
        }
    }
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if absolute.starts_with("/tmp") {
        return Err(HarnessError::ConfigError {
            location: label.to_string(),
            reason: format!("{} must not live under /tmp/", path.display()),
        });
    }
    Ok(())
}

fn main() -> ExitCode {
    human_panic::setup_panic!();
    env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:?}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    check_path_security(&args.backend_lib_path, "backend_lib_path")
        .context("backend library path failed security check")?;
    check_path_security(&args.benchmark_config_file, "benchmark_config_file")
        .context("benchmark config path failed security check")?;

    let opts = DriverOptions {
        backend_lib_path: args.backend_lib_path.clone(),
        benchmark_config_file: args.benchmark_config_file.clone(),
        dump_config: args.dump_config,
        enable_validation: args.enable_validation,
        run_overview: args.run_overview,
        random_seed: args.random_seed,
        report_delay_ms: args.report_delay,
        report_root_path: args.report_root_path.clone(),
        single_path_report: args.single_path_report,
    };

    let outcome = driver::run(&opts).context("harness run failed")?;
    let code = u8::try_from(outcome.exit_code()).unwrap_or(255);
    Ok(ExitCode::from(code))
}
