//! The bridge: the fixed C ABI a backend plugin must expose.
//!
//! This module only describes the wire-level shapes (raw handles, error
//! codes, the benchmark descriptor layout, the C function signatures a
//! backend must export) and the trait, [`RawBridge`], that lets the rest of
//! the harness call them without caring whether they came from a loaded
//! shared library ([`BackendLibrary`]) or from an in-process stand-in used by
//! this crate's own test suite ([`mock::MockBridge`]).
//!
//! [`BackendProxy`] builds on top of [`RawBridge`] to turn raw error codes
//! into [`HarnessError`], which is the only layer the Engine, Runner, and
//! Driver ever see.

mod load;
pub mod mock;
mod proxy;

pub use load::BackendLibrary;
pub use proxy::BackendProxy;

use crate::error::HarnessError;

/// An opaque backend-owned identifier. The harness never interprets the
/// value, only stores and replays it.
pub type RawHandle = u64;

/// Sentinel meaning "no handle" — never a value a backend should hand back
/// for a live resource.
pub const INVALID_HANDLE: RawHandle = 0;

/// Raw backend return code. `0` is success; [`CRITICAL_ERROR`] is the
/// reserved unrecoverable sentinel.
pub type ErrorCode = i32;

/// Success sentinel.
pub const SUCCESS: ErrorCode = 0;

/// Reserved error code that aborts the whole run rather than just the
/// current benchmark.
pub const CRITICAL_ERROR: ErrorCode = -1;

/// The element type of one operation parameter or result component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// Signed 32-bit integer.
    Int32 = 0,
    /// Signed 64-bit integer.
    Int64 = 1,
    /// IEEE-754 single precision.
    Float32 = 2,
    /// IEEE-754 double precision.
    Float64 = 3,
}

impl DataType {
    /// Size in bytes of one element of this type on the wire.
    pub fn element_size(self) -> usize {
        match self {
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
        }
    }

    pub(crate) fn from_wire(value: u8) -> Result<Self, HarnessError> {
        match value {
            0 => Ok(DataType::Int32),
            1 => Ok(DataType::Int64),
            2 => Ok(DataType::Float32),
            3 => Ok(DataType::Float64),
            other => Err(HarnessError::ConfigError {
                location: "backend descriptor data_type".to_string(),
                reason: format!("unrecognized data type tag {other}"),
            }),
        }
    }
}

/// Execution style of a benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Category {
    /// Many repetitions of one operation.
    Latency = 0,
    /// One pass over a batch of input samples.
    Offline = 1,
}

impl Category {
    pub(crate) fn from_wire(value: u8) -> Result<Self, HarnessError> {
        match value {
            0 => Ok(Category::Latency),
            1 => Ok(Category::Offline),
            other => Err(HarnessError::ConfigError {
                location: "backend descriptor category".to_string(),
                reason: format!("unrecognized category tag {other}"),
            }),
        }
    }
}

/// Largest number of operation parameters any registered workload declares
/// (the catalogue's own widest entry, `LogisticRegression`, has 3: weights,
/// bias, features). Fixes the width of the wire-level `data_count` array.
pub const MAX_OPERATION_PARAMS: usize = 8;

/// A backend-declared benchmark descriptor.
#[derive(Debug, Clone)]
pub struct BenchmarkDescriptor {
    /// Which workload this benchmark exercises, as the backend names it.
    pub workload_id: u32,
    /// Element type of the benchmark's operands.
    pub data_type: DataType,
    /// Latency or Offline.
    pub category: Category,
    /// Latency-only: untimed iterations run before timing starts.
    pub warmup_iterations: u32,
    /// Latency-only: minimum wall-clock milliseconds to keep timing.
    pub min_test_time_ms: u64,
    /// Offline-only: per-operation-parameter sample count the backend would
    /// like (`data_count[p]`); entry `p` is `0` if that parameter defers to
    /// the workload's own default. May be shorter than the benchmark's
    /// actual operand count, in which case the missing entries are treated
    /// as `0`.
    pub offline_sample_count: Vec<u64>,
    /// Bit `i` set iff operation parameter `i` is supplied encrypted.
    pub cipher_param_mask: u64,
    /// Backend-declared scheme identifier.
    pub scheme: u32,
    /// Backend-declared security-level identifier.
    pub security: u32,
    /// Free-form backend integer, opaque to the harness.
    pub other: i64,
}

/// Selects a sub-range of samples for one operation parameter during
/// `operate`.
#[derive(Debug, Clone, Copy)]
pub struct SampleIndexer {
    /// First sample index in the range.
    pub value_index: u64,
    /// Number of samples in the range, starting at `value_index`.
    pub batch_size: u64,
}

/// The raw bridge surface, one method per C symbol a backend exports.
///
/// Implementors translate the two-call string-size-negotiation pattern and
/// raw buffer handling into plain Rust values; [`BackendProxy`] is the layer
/// that turns the `ErrorCode` this trait still deals in into
/// [`HarnessError`]. Splitting the trait out this way — rather than folding
/// FFI and error translation into one type — is what lets
/// [`mock::MockBridge`] stand in for a real shared library in this crate's
/// own tests: the Engine, the Runner, and the Proxy's error-handling logic
/// are all exercised without ever calling `dlopen`.
pub trait RawBridge {
    /// `initEngine`.
    fn init_engine(&self) -> Result<RawHandle, ErrorCode>;
    /// `subscribeBenchmarksCount`.
    fn subscribe_benchmarks_count(&self, engine: RawHandle) -> Result<u64, ErrorCode>;
    /// `subscribeBenchmarks`.
    fn subscribe_benchmarks(
        &self,
        engine: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode>;
    /// `getWorkloadParamsDetails`.
    fn get_workload_params_details(&self, descriptor: RawHandle) -> Result<Vec<u8>, ErrorCode>;
    /// `describeBenchmark`.
    fn describe_benchmark(
        &self,
        descriptor: RawHandle,
        params: &[u8],
    ) -> Result<BenchmarkDescriptor, ErrorCode>;
    /// `createBenchmark`.
    fn create_benchmark(&self, descriptor: RawHandle) -> Result<RawHandle, ErrorCode>;
    /// `encode`.
    fn encode(
        &self,
        benchmark: RawHandle,
        param_index: u64,
        data: &[u8],
        sample_count: u64,
    ) -> Result<RawHandle, ErrorCode>;
    /// `decode`.
    fn decode(
        &self,
        benchmark: RawHandle,
        handle: RawHandle,
        expected_len: u64,
    ) -> Result<Vec<u8>, ErrorCode>;
    /// `encrypt`.
    fn encrypt(&self, benchmark: RawHandle, plaintext: RawHandle) -> Result<RawHandle, ErrorCode>;
    /// `decrypt`.
    fn decrypt(&self, benchmark: RawHandle, ciphertext: RawHandle) -> Result<RawHandle, ErrorCode>;
    /// `load`.
    fn load(&self, benchmark: RawHandle, handles: &[RawHandle]) -> Result<RawHandle, ErrorCode>;
    /// `store`.
    fn store(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode>;
    /// `operate`.
    fn operate(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        indexers: &[SampleIndexer],
    ) -> Result<(), ErrorCode>;
    /// `destroyHandle`.
    fn destroy_handle(&self, handle: RawHandle) -> Result<(), ErrorCode>;
    /// `getSchemeName`.
    fn get_scheme_name(&self, scheme: u32) -> Result<String, ErrorCode>;
    /// `getSchemeSecurityName`.
    fn get_scheme_security_name(&self, scheme: u32, security: u32) -> Result<String, ErrorCode>;
    /// `getBenchmarkDescriptionEx`.
    fn get_benchmark_description_ex(
        &self,
        descriptor: RawHandle,
        params: &[u8],
    ) -> Result<String, ErrorCode>;
    /// `getErrorDescription`.
    fn get_error_description(&self, code: ErrorCode) -> Result<String, ErrorCode>;
    /// `getLastErrorDescription`.
    fn get_last_error_description(&self) -> Result<String, ErrorCode>;
}
