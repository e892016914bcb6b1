//! Error kinds produced by the harness.
//!
//! Every fallible harness operation returns [`HarnessError`] (or wraps it in
//! an [`anyhow::Error`] once it crosses into orchestration code that also
//! needs to attach place-specific context, the way the Driver and CLI do).
//! [`BenchmarkAlreadyLive`] is deliberately *not* a variant here: the spec
//! treats creating a second live benchmark on one engine as a programmer
//! error, so it is a `panic!` at the call site instead (see
//! [`crate::engine::Engine::create`]).
//!
//! [`BenchmarkAlreadyLive`]: https://en.wikipedia.org/wiki/Programmer_error

use std::path::PathBuf;

use crate::bridge::ErrorCode;

/// Everything that can go wrong while running the harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A required bridge symbol was missing from the backend library, or the
    /// library itself could not be opened.
    #[error("backend library at {path} could not be loaded: {reason}")]
    BackendLoadError {
        /// Path to the backend shared library.
        path: PathBuf,
        /// The missing symbol name, or a description of why the load failed.
        reason: String,
    },

    /// A bridge call returned a non-success error code.
    ///
    /// `critical` is `true` when `code` is the backend's reserved
    /// `CRITICAL_ERROR` code, in which case the whole run must abort rather
    /// than just the current benchmark.
    #[error("backend error {code} ({code_text}): {last_text}")]
    BackendError {
        /// Raw error code returned by the backend.
        code: ErrorCode,
        /// Text for `code` as reported by `getErrorDescription`.
        code_text: String,
        /// Text of the most recent backend-internal error, from
        /// `getLastErrorDescription`.
        last_text: String,
        /// Whether this error is the backend's `CRITICAL_ERROR` sentinel.
        critical: bool,
    },

    /// The run configuration (CLI flags or YAML file) is invalid.
    #[error("configuration error at {location}: {reason}")]
    ConfigError {
        /// Human-readable location of the problem (a flag name, a YAML path).
        location: String,
        /// What was wrong.
        reason: String,
    },

    /// A dataset could not be produced for a benchmark.
    #[error("dataset error: {0}")]
    DatasetError(#[from] DatasetErrorKind),

    /// A decoded result sample did not match the reference computation.
    #[error("validation failed at sample index {index_tuple:?}, first mismatch at offset {first_bad_offset}")]
    ValidationFailed {
        /// Multi-dimensional sample index that failed.
        index_tuple: Vec<u64>,
        /// Offset within that sample's output vector of the first mismatch.
        first_bad_offset: usize,
    },

    /// No registered workload matched a backend-declared descriptor.
    #[error("no workload in the catalogue matches backend descriptor (workload_id={workload_id}, data_type={data_type:?})")]
    NoMatchingWorkload {
        /// The backend's raw workload id.
        workload_id: u32,
        /// The backend's declared data type.
        data_type: crate::bridge::DataType,
    },

    /// Wraps an I/O failure (reading a config file, a CSV dataset, writing a
    /// report) with no further harness-specific classification.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sub-kinds of [`HarnessError::DatasetError`].
#[derive(Debug, thiserror::Error)]
pub enum DatasetErrorKind {
    /// A loaded dataset's shape did not match what the workload declares.
    #[error("dataset shape mismatch for parameter {parameter}: expected vector length {expected}, found {found}")]
    ShapeMismatch {
        /// Which operation parameter (0-indexed) mismatched.
        parameter: usize,
        /// Vector length the workload shape requires.
        expected: usize,
        /// Vector length actually present in the dataset.
        found: usize,
    },

    /// The dataset would exceed `max_loaded_size` bytes.
    #[error("dataset too large: {required} bytes required, budget is {budget} bytes")]
    TooLarge {
        /// Bytes the dataset would occupy.
        required: u64,
        /// The configured byte budget.
        budget: u64,
    },

    /// A CSV dataset file could not be parsed.
    #[error("could not parse dataset row {line} in {file}: {reason}")]
    ParseFailure {
        /// Path to the file containing the bad row.
        file: PathBuf,
        /// Line number (1-based) of the bad row.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Not every sample row within one `(tag, index)` group had the same
    /// length.
    #[error("inconsistent row width in {file} for group ({tag}, {index}): row {line} has {found} elements, expected {expected}")]
    InconsistentRowWidth {
        /// Path to the file containing the bad row.
        file: PathBuf,
        /// `input` or `output`.
        tag: String,
        /// Operation parameter or output component index.
        index: usize,
        /// Line number (1-based) of the bad row.
        line: usize,
        /// Row width found.
        found: usize,
        /// Row width established by the first row in the group.
        expected: usize,
    },
}
