//! A benchmarking harness for homomorphic-encryption (HE) backend plugins.
//!
//! `he-bench` loads a backend shared library that implements a fixed C ABI
//! (the "bridge", see [`bridge`]), discovers the benchmarks that backend
//! registers ([`engine`]), materialises each one according to a run
//! configuration ([`config`]), drives it through a fixed operational
//! pipeline — encode, encrypt, load, operate, store, decrypt, decode
//! ([`runner`]) — validates results against a reference implementation
//! computed over the plaintext workload ([`workload`], [`dataset`]), and
//! emits per-benchmark timing reports plus an aggregate summary
//! ([`timing`]).
//!
//! The harness does not itself perform homomorphic encryption, implement any
//! HE scheme, persist encrypted artifacts, certify the security of a
//! backend, or retry failed benchmarks.
//!
//! # Usage
//! `he-bench` is primarily designed to be used as an executable, but it is
//! modular and can also be used as a library for integration into a larger
//! system, or for more granular control over the benchmarking scope and
//! process.
//!
//! ## As an executable
//! Refer to the output of the `--help` flag for information on how to use
//! the `he-bench` binary:
//! ```console
//! $ he-bench --help
//! Usage: he-bench --backend_lib_path <BACKEND_LIB_PATH> [OPTIONS]
//!
//! Options:
//!   -b, --backend_lib_path <PATH>       Path to the backend shared library
//!   -c, --benchmark_config_file <PATH>  YAML run configuration [default: benchmark_config.yaml]
//!       --dump_config                   Write the default configuration and exit
//!   -v, --enable_validation <BOOL>      [default: true]
//!       --run_overview <BOOL>           [default: true]
//!       --random_seed <SEED>            [default: current wall-clock time]
//!       --report_delay <MS>             [default: 1000]
//!       --report_root_path <PATH>       [default: .]
//!       --single-path-report <BOOL>     [default: false]
//!   -h, --help                          Print help
//!   -V, --version                       Print version
//! ```
//!
//! ## As a library
//! ```no_run
//! use std::path::PathBuf;
//!
//! use he_bench::driver::{self, DriverOptions};
//!
//! let opts = DriverOptions {
//!     backend_lib_path: PathBuf::from("libbackend.so"),
//!     benchmark_config_file: PathBuf::from("benchmark_config.yaml"),
//!     dump_config: false,
//!     enable_validation: true,
//!     run_overview: true,
//!     random_seed: None,
//!     report_delay_ms: 1000,
//!     report_root_path: PathBuf::from("reports"),
//!     single_path_report: false,
//! };
//! let outcome = driver::run(&opts).expect("harness run failed");
//! # let _ = outcome;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod engine;
pub mod error;
pub mod handle;
pub mod numeric;
pub mod runner;
pub mod timing;
pub mod workload;

pub use config::RunConfig;
pub use driver::{run, DriverOptions, DriverOutcome, RunResult};
pub use engine::Engine;
pub use error::HarnessError;
