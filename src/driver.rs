//! Top-level orchestration. Loads the backend, resolves a run configuration,
//! drives each requested benchmark through the [`Engine`] and [`runner`],
//! writes its reports, and aggregates a final summary.
//!
//! Data flow: Configurator → list of [`BenchmarkRequest`]s → Driver →
//! `Engine::describe` → description token → `Engine::create` → Runner →
//! Backend Proxy → Timing Report → on-disk CSV.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bridge::{BackendLibrary, BackendProxy};
use crate::config::{BenchmarkRequest, RunConfig};
use crate::dataset::{self, Dataset, ParameterSpec, Strictness};
use crate::engine::{DescriptionToken, Engine};
use crate::error::HarnessError;
use crate::runner::{self, Outcome};
use crate::timing::report::{write_report, write_summary, ReportHeader};
use crate::timing::{si_prefix, TimeRatio, TimingLog};
use crate::workload::{self, ParamValue, WorkloadDescriptor};

/// Fallback Latency minimum test time when nothing else specifies one.
const DEFAULT_MIN_TEST_TIME_MS: u64 = 1000;
/// Fallback per-parameter sample count, used when neither the backend nor a
/// run configuration supplies one.
const FALLBACK_SAMPLE_SIZE: u64 = 5;
/// Validation tolerance for floating-point comparisons; the YAML schema has
/// no field to override it.
const DEFAULT_TOLERANCE: f64 = 0.05;

/// CLI options the Driver needs, resolved by the binary's argument parser.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Path to the backend shared library.
    pub backend_lib_path: PathBuf,
    /// Path to the YAML run configuration.
    pub benchmark_config_file: PathBuf,
    /// If set, write the default configuration to `benchmark_config_file`
    /// and stop before running anything.
    pub dump_config: bool,
    /// `--enable_validation`.
    pub enable_validation: bool,
    /// `--run_overview`: print the final summary table to stdout.
    pub run_overview: bool,
    /// `--random_seed`; `None` means "use wall-clock time".
    pub random_seed: Option<u64>,
    /// `--report_delay`, milliseconds between benchmarks.
    pub report_delay_ms: u64,
    /// `--report_root_path`.
    pub report_root_path: PathBuf,
    /// `--single-path-report`.
    pub single_path_report: bool,
}

/// One completed (or failed) benchmark's outcome, kept for the final
/// overview table.
#[derive(Debug)]
pub struct RunResult {
    /// Human-readable header, from [`DescriptionToken::header`].
    pub header: String,
    /// Outcome of the pipeline run.
    pub outcome: Outcome,
    /// Timing log collected during the run (empty if the benchmark never
    /// reached the pipeline).
    pub log: TimingLog,
}

/// What [`run`] did.
pub enum DriverOutcome {
    /// `--dump_config` wrote the default configuration and nothing else ran.
    DumpedConfig,
    /// Benchmarks ran; `results` is one entry per request, in request order.
    Ran(Vec<RunResult>),
}

impl DriverOutcome {
    /// Maps this outcome to a process exit code: `0` on full success, `1` if
    /// any benchmark failed or failed validation, `3` if a `CRITICAL_ERROR`
    /// aborted the run early.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverOutcome::DumpedConfig => 0,
            DriverOutcome::Ran(results) => {
                if results.iter().any(|r| r.outcome.is_critical()) {
                    3
                } else if results.iter().any(|r| !r.outcome.is_success()) {
                    1
                } else {
                    0
                }
            }
        }
    }
}

/// Runs the full harness sequence. Returns `Err` only for a failure that is
/// fatal before (or regardless of) any benchmark running — the caller maps
/// that to exit code `2`.
pub fn run(opts: &DriverOptions) -> Result<DriverOutcome, HarnessError> {
    log::info!("loading backend library from {}...", opts.backend_lib_path.display());
    let library = BackendLibrary::load(&opts.backend_lib_path)?;
    let engine = Engine::new(BackendProxy::new(Box::new(library)))?;
    log::info!("engine ready: {} registered descriptors", engine.count());

    if opts.dump_config {
        let config = RunConfig::dump_default(&engine)?;
        config.save(&opts.benchmark_config_file)?;
        log::info!("wrote default configuration to {}", opts.benchmark_config_file.display());
        return Ok(DriverOutcome::DumpedConfig);
    }

    let config = RunConfig::load(&opts.benchmark_config_file)?;
    let strictness = if config.strict_datasets { Strictness::Strict } else { Strictness::Loose };
    let default_min_test_time = config.default_min_test_time;
    let default_sample_sizes = config.default_sample_sizes.clone();
    let run_seed = opts.random_seed.or(config.random_seed).unwrap_or_else(wall_clock_seed);
    log::info!("process-wide random seed: {run_seed}");

    let requests = config.into_requests();
    let mut results = Vec::with_capacity(requests.len());

    for (position, request) in requests.into_iter().enumerate() {
        if position > 0 {
            std::thread::sleep(std::time::Duration::from_millis(opts.report_delay_ms));
        }

        let token = match engine.describe(request.descriptor_index, &request.workload_params) {
            Ok(token) => token,
            Err(err) => {
                log::error!("could not describe benchmark {}: {err}", request.descriptor_index);
                results.push(RunResult { header: format!("descriptor {}", request.descriptor_index), outcome: Outcome::Failed(err), log: TimingLog::new() });
                continue;
            }
        };

        let header = token.header.clone();
        let catalogue_entry = workload::find_match(&token.descriptor).expect("token was resolved against the catalogue already");

        let dataset = match build_dataset(&token, catalogue_entry, &request, &default_sample_sizes, strictness, run_seed) {
            Ok(dataset) => dataset,
            Err(err) => {
                log::error!("[{header}] could not build dataset: {err}");
                results.push(RunResult { header, outcome: Outcome::Failed(err), log: TimingLog::new() });
                continue;
            }
        };
        if let Some(budget) = request.max_loaded_size {
            if let Err(err) = dataset.check_budget(budget) {
                log::error!("[{header}] {err}");
                results.push(RunResult { header, outcome: Outcome::Failed(err), log: TimingLog::new() });
                continue;
            }
        }

        let min_test_time_ms = resolve_min_test_time(&token, &request, default_min_test_time);
        let scheme = engine.scheme_name(token.descriptor.scheme).unwrap_or_default();
        let security = engine.security_name(token.descriptor.scheme, token.descriptor.security).unwrap_or_default();
        let report_header = build_report_header(&token, &dataset, &scheme, &security);
        let path_fragment = token.path_fragment.clone();

        let benchmark = match engine.create(token) {
            Ok(benchmark) => benchmark,
            Err(err) => {
                log::error!("[{header}] could not create benchmark: {err}");
                results.push(RunResult { header, outcome: Outcome::Failed(err), log: TimingLog::new() });
                continue;
            }
        };

        let (log, outcome) = runner::run(&benchmark, &dataset, min_test_time_ms, DEFAULT_TOLERANCE, opts.enable_validation);
        if let Err(err) = benchmark.destroy() {
            log::warn!("[{header}] failed to destroy benchmark handle: {err}");
        }

        match &outcome {
            Outcome::Success => log::info!("[{header}] SUCCESS"),
            Outcome::Failed(err) if outcome.is_critical() => log::error!("[{header}] CRITICAL: {err}"),
            Outcome::Failed(err) => log::warn!("[{header}] FAILED: {err}"),
            Outcome::ValidationFailed { index_tuple, first_bad_offset } => {
                log::warn!("[{header}] VALIDATION FAILED at sample {index_tuple:?}, offset {first_bad_offset}");
            }
        }

        if let Err(err) = write_benchmark_report(&opts.report_root_path, &path_fragment, opts.single_path_report, &report_header, &log) {
            log::warn!("[{header}] failed to write report: {err}");
        }

        let critical = outcome.is_critical();
        results.push(RunResult { header, outcome, log });
        if critical {
            log::error!("aborting run after CRITICAL_ERROR");
            break;
        }
    }

    if opts.run_overview {
        print_overview(&results);
    }

    Ok(DriverOutcome::Ran(results))
}

fn wall_clock_seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

fn resolve_min_test_time(token: &DescriptionToken, request: &BenchmarkRequest, config_default: Option<u64>) -> u64 {
    if let Some(ms) = request.min_test_time_ms_override {
        return ms;
    }
    if token.descriptor.min_test_time_ms != 0 {
        return token.descriptor.min_test_time_ms;
    }
    config_default.unwrap_or(DEFAULT_MIN_TEST_TIME_MS)
}

/// Resolves the per-parameter sample counts to generate or validate against.
///
/// Each operation parameter `p` is resolved independently, in priority
/// order: the request's own override at `p` if present and non-zero, else
/// the run-level default at `p` if present and non-zero, else whatever the
/// Engine already resolved at `p` from the backend descriptor and the
/// catalogue. `request.force_config` makes the request's override at `p`
/// authoritative even when it is present but `0`, instead of falling
/// through — the only way to force a parameter to zero samples.
fn resolve_sample_sizes(token: &DescriptionToken, request: &BenchmarkRequest, run_default: &[u64]) -> Vec<u64> {
    (0..token.sample_sizes.len())
        .map(|p| {
            if let Some(&configured) = request.per_parameter_sample_counts.get(p) {
                if request.force_config || configured != 0 {
                    return configured;
                }
            }
            if let Some(&default) = run_default.get(p) {
                if default != 0 {
                    return default;
                }
            }
            token.sample_sizes[p]
        })
        .collect()
}

fn build_dataset(
    token: &DescriptionToken,
    catalogue_entry: &WorkloadDescriptor,
    request: &BenchmarkRequest,
    run_default_sample_sizes: &[u64],
    strictness: Strictness,
    seed: u64,
) -> Result<Dataset, HarnessError> {
    if let Some(filename) = &request.dataset_filename {
        let dataset = dataset::load_csv(Path::new(filename), token.workload.data_type, strictness)?;
        let operand_lengths = (catalogue_entry.operand_lengths)(&token.workload);
        for (p, expected) in operand_lengths.iter().enumerate() {
            let found = dataset.inputs.get(p).and_then(|samples| samples.first()).map(Vec::len);
            if let Some(found) = found {
                if found != *expected {
                    return Err(crate::error::DatasetErrorKind::ShapeMismatch { parameter: p, expected: *expected, found }.into());
                }
            }
        }
        return Ok(dataset);
    }

    let sample_sizes = resolve_sample_sizes(token, request, run_default_sample_sizes);
    let distributions = (catalogue_entry.param_distributions)(&token.workload);
    let operand_lengths = (catalogue_entry.operand_lengths)(&token.workload);
    let data_type = token.workload.data_type;
    let specs: Vec<ParameterSpec> = distributions
        .into_iter()
        .zip(operand_lengths)
        .enumerate()
        .map(|(p, (distribution, vector_len))| ParameterSpec {
            sample_count: sample_sizes.get(p).copied().unwrap_or(FALLBACK_SAMPLE_SIZE),
            vector_len,
            distribution,
            data_type,
        })
        .collect();

    let workload = &token.workload;
    let effective_seed = request.random_seed.unwrap_or(seed);
    let (dataset, report) = dataset::generate(&specs, effective_seed, |inputs| {
        (catalogue_entry.compute_reference)(workload, inputs)
    });
    log::debug!(
        "generated {} bytes across sample counts {:?}",
        report.bytes_allocated,
        report.samples_per_parameter
    );
    Ok(dataset)
}

fn format_param_value(value: ParamValue) -> String {
    match value {
        ParamValue::Int64(v) => v.to_string(),
        ParamValue::UInt64(v) => v.to_string(),
        ParamValue::Float64(v) => v.to_string(),
    }
}

fn cipher_mask_bits(mask: u64, width: usize) -> String {
    (0..width).map(|i| if mask & (1 << i) != 0 { '1' } else { '0' }).collect()
}

fn build_report_header(token: &DescriptionToken, dataset: &Dataset, scheme: &str, security: &str) -> ReportHeader {
    ReportHeader {
        workload_name: token.workload.name.to_string(),
        scheme: scheme.to_string(),
        category: format!("{:?}", token.descriptor.category),
        data_type: format!("{:?}", token.descriptor.data_type),
        cipher_mask_bits: cipher_mask_bits(token.descriptor.cipher_param_mask, dataset.inputs.len()),
        security: security.to_string(),
        extra_code: token.descriptor.other,
        params: token.workload.params.iter().map(|p| format!("{}={}", p.name, format_param_value(p.value))).collect(),
    }
}

/// Lays out `path_fragment` under `root`, either as nested directories or
/// (`single_path`) flattened to one level with `-` separators, and writes
/// both the Report CSV and the Summary CSV there.
fn write_benchmark_report(
    root: &Path,
    path_fragment: &str,
    single_path: bool,
    header: &ReportHeader,
    log: &TimingLog,
) -> Result<(), HarnessError> {
    let (report_path, summary_path) = if single_path {
        let flat = path_fragment.replace('/', "-");
        (root.join(format!("{flat}-report.csv")), root.join(format!("{flat}-summary.csv")))
    } else {
        let dir = root.join(path_fragment);
        std::fs::create_dir_all(&dir)?;
        (dir.join("report.csv"), dir.join("summary.csv"))
    };
    if single_path {
        std::fs::create_dir_all(root)?;
    }

    let mut report_bytes = Vec::new();
    write_report(&mut report_bytes, header, log)?;
    std::fs::write(&report_path, report_bytes)?;

    let mut summary_bytes = Vec::new();
    write_summary(&mut summary_bytes, header, log, TimeRatio::NANOSECONDS)?;
    std::fs::write(&summary_path, summary_bytes)?;

    Ok(())
}

/// Prints the final aggregate table: each benchmark's average wall and CPU
/// time per `operate` event, with SI prefixes, as a Markdown table.
fn print_overview(results: &[RunResult]) {
    println!("| Benchmark | Status | Mean Operate Time |");
    println!("|---|---|---|");
    for result in results {
        let status = match &result.outcome {
            Outcome::Success => "SUCCESS".to_string(),
            Outcome::Failed(err) if result.outcome.is_critical() => format!("CRITICAL ({err})"),
            Outcome::Failed(err) => format!("FAILED ({err})"),
            Outcome::ValidationFailed { index_tuple, .. } => format!("VALIDATION FAILED ({index_tuple:?})"),
        };
        let mean = result
            .log
            .stats()
            .get("operate")
            .map(|stats| {
                let (value, prefix) = si_prefix(stats.mean());
                format!("{value:.3} {prefix}s")
            })
            .unwrap_or_else(|| "-".to_string());
        println!("| {} | {status} | {mean} |", result.header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BenchmarkDescriptor, Category, DataType};
    use crate::workload::{ResolvedWorkload, WorkloadId};

    fn token_with_sample_sizes(sample_sizes: Vec<u64>) -> DescriptionToken {
        DescriptionToken {
            index: 0,
            workload: ResolvedWorkload {
                id: WorkloadId::ElementwiseAdd,
                name: "Test",
                data_type: DataType::Int64,
                params: Vec::new(),
            },
            descriptor: BenchmarkDescriptor {
                workload_id: 0,
                data_type: DataType::Int64,
                category: Category::Offline,
                warmup_iterations: 0,
                min_test_time_ms: 0,
                offline_sample_count: Vec::new(),
                cipher_param_mask: 0,
                scheme: 0,
                security: 0,
                other: 0,
            },
            sample_sizes,
            header: "Test".to_string(),
            path_fragment: "test".to_string(),
        }
    }

    fn request_with(per_parameter_sample_counts: Vec<u64>, force_config: bool) -> BenchmarkRequest {
        BenchmarkRequest {
            descriptor_index: 0,
            workload_params: Vec::new(),
            per_parameter_sample_counts,
            dataset_filename: None,
            min_test_time_ms_override: None,
            random_seed: None,
            force_config,
            max_loaded_size: None,
        }
    }

    #[test]
    fn resolves_each_parameter_independently() {
        let token = token_with_sample_sizes(vec![10, 10]);
        // Only parameter 0 is overridden; parameter 1 falls through to the
        // token's own resolved value, not the whole vector being ignored.
        let request = request_with(vec![8], false);
        assert_eq!(resolve_sample_sizes(&token, &request, &[]), vec![8, 10]);
    }

    #[test]
    fn a_present_zero_override_falls_through_without_force() {
        let token = token_with_sample_sizes(vec![10, 10]);
        let request = request_with(vec![0, 8], false);
        assert_eq!(resolve_sample_sizes(&token, &request, &[]), vec![10, 8]);
    }

    #[test]
    fn force_config_makes_a_zero_override_authoritative() {
        let token = token_with_sample_sizes(vec![10, 10]);
        let request = request_with(vec![0, 8], true);
        assert_eq!(resolve_sample_sizes(&token, &request, &[]), vec![0, 8]);
    }

    #[test]
    fn run_default_fills_in_ahead_of_the_token_fallback() {
        let token = token_with_sample_sizes(vec![10, 10]);
        let request = request_with(Vec::new(), false);
        assert_eq!(resolve_sample_sizes(&token, &request, &[6, 6]), vec![6, 6]);
    }
}
