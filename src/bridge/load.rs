//! Loading a backend shared library and resolving the bridge ABI from it.
//!
//! Every required symbol is resolved once, eagerly, at
//! [`BackendLibrary::load`] time — a missing symbol is reported before any
//! benchmark runs rather than failing mid-pipeline. [`BackendLibrary`] itself
//! then implements [`RawBridge`] on top of the resolved function pointers,
//! including the two-call string/buffer-size negotiation pattern every
//! string-returning call uses.

use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use libloading::Library;

use super::{
    BenchmarkDescriptor, Category, DataType, ErrorCode, RawBridge, RawHandle, SampleIndexer,
    MAX_OPERATION_PARAMS,
};
use crate::error::HarnessError;

type InitEngineFn = unsafe extern "C" fn(*mut RawHandle) -> ErrorCode;
type CountFn = unsafe extern "C" fn(RawHandle, *mut u64) -> ErrorCode;
type SubscribeBenchmarksFn = unsafe extern "C" fn(RawHandle, *mut RawHandle, u64) -> ErrorCode;
type GetWorkloadParamsDetailsFn = unsafe extern "C" fn(RawHandle, *mut u8, *mut u64) -> ErrorCode;
type DescribeBenchmarkFn =
    unsafe extern "C" fn(RawHandle, *const u8, u64, *mut RawDescriptorFfi) -> ErrorCode;
type CreateBenchmarkFn = unsafe extern "C" fn(RawHandle, *mut RawHandle) -> ErrorCode;
type EncodeFn = unsafe extern "C" fn(RawHandle, u64, *const u8, u64, u64, *mut RawHandle) -> ErrorCode;
type DecodeFn = unsafe extern "C" fn(RawHandle, RawHandle, *mut u8, u64) -> ErrorCode;
type EncryptFn = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle) -> ErrorCode;
type DecryptFn = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle) -> ErrorCode;
type LoadFn = unsafe extern "C" fn(RawHandle, *const RawHandle, u64, *mut RawHandle) -> ErrorCode;
type StoreFn = unsafe extern "C" fn(RawHandle, RawHandle, *mut RawHandle, u64) -> ErrorCode;
type OperateFn =
    unsafe extern "C" fn(RawHandle, RawHandle, *const SampleIndexerFfi, u64) -> ErrorCode;
type DestroyHandleFn = unsafe extern "C" fn(RawHandle) -> ErrorCode;
type GetSchemeNameFn = unsafe extern "C" fn(u32, *mut u8, *mut u64) -> ErrorCode;
type GetSchemeSecurityNameFn = unsafe extern "C" fn(u32, u32, *mut u8, *mut u64) -> ErrorCode;
type GetBenchmarkDescriptionExFn =
    unsafe extern "C" fn(RawHandle, *const u8, u64, *mut u8, *mut u64) -> ErrorCode;
type GetErrorDescriptionFn = unsafe extern "C" fn(ErrorCode, *mut u8, *mut u64) -> ErrorCode;
type GetLastErrorDescriptionFn = unsafe extern "C" fn(*mut u8, *mut u64) -> ErrorCode;

/// On-the-wire layout `describeBenchmark` fills in.
#[repr(C)]
struct RawDescriptorFfi {
    workload_id: u32,
    data_type: u8,
    category: u8,
    _pad: [u8; 2],
    warmup_iterations: u32,
    min_test_time_ms: u64,
    offline_sample_count: [u64; MAX_OPERATION_PARAMS],
    cipher_param_mask: u64,
    scheme: u32,
    security: u32,
    other: i64,
}

/// On-the-wire layout of one `operate` sample indexer.
#[repr(C)]
struct SampleIndexerFfi {
    value_index: u64,
    batch_size: u64,
}

/// Every required backend symbol, resolved once from the loaded library.
struct Symbols {
    init_engine: InitEngineFn,
    subscribe_benchmarks_count: CountFn,
    subscribe_benchmarks: SubscribeBenchmarksFn,
    get_workload_params_details: GetWorkloadParamsDetailsFn,
    describe_benchmark: DescribeBenchmarkFn,
    create_benchmark: CreateBenchmarkFn,
    encode: EncodeFn,
    decode: DecodeFn,
    encrypt: EncryptFn,
    decrypt: DecryptFn,
    load: LoadFn,
    store: StoreFn,
    operate: OperateFn,
    destroy_handle: DestroyHandleFn,
    get_scheme_name: GetSchemeNameFn,
    get_scheme_security_name: GetSchemeSecurityNameFn,
    get_benchmark_description_ex: GetBenchmarkDescriptionExFn,
    get_error_description: GetErrorDescriptionFn,
    get_last_error_description: GetLastErrorDescriptionFn,
}

/// A loaded backend shared library plus its resolved bridge symbols.
///
/// Construct with [`BackendLibrary::load`] and hand it directly to
/// [`crate::bridge::BackendProxy::new`] (boxed) — `BackendLibrary` implements
/// [`RawBridge`] itself, so there is no separate borrowed wrapper to keep
/// alive. Keeping the library handle and the resolved symbols in the same
/// value, with the library declared last, means the library cannot be
/// unloaded while any function pointer in `symbols` might still be called.
pub struct BackendLibrary {
    symbols: Symbols,
    // Declared last so it drops last: every function pointer in `symbols` is
    // only valid as long as this stays mapped in.
    _library: Library,
}

macro_rules! resolve {
    ($lib:expr, $path:expr, $name:literal) => {{
        let symbol = unsafe { $lib.get($name.as_bytes()) }.map_err(|_: libloading::Error| {
            HarnessError::BackendLoadError {
                path: $path.to_path_buf(),
                reason: format!("missing required symbol `{}`", $name),
            }
        })?;
        *symbol
    }};
}

impl BackendLibrary {
    /// Loads a backend shared library from `path` and resolves every symbol
    /// the bridge ABI requires.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BackendLoadError`] if the library cannot be
    /// opened, or if any required symbol is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        log::info!("loading backend library from {}...", path.display());

        let library = unsafe { Library::new(path) }.map_err(|err| {
            HarnessError::BackendLoadError {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        })?;

        let symbols = Symbols {
            init_engine: resolve!(library, path, "initEngine"),
            subscribe_benchmarks_count: resolve!(library, path, "subscribeBenchmarksCount"),
            subscribe_benchmarks: resolve!(library, path, "subscribeBenchmarks"),
            get_workload_params_details: resolve!(library, path, "getWorkloadParamsDetails"),
            describe_benchmark: resolve!(library, path, "describeBenchmark"),
            create_benchmark: resolve!(library, path, "createBenchmark"),
            encode: resolve!(library, path, "encode"),
            decode: resolve!(library, path, "decode"),
            encrypt: resolve!(library, path, "encrypt"),
            decrypt: resolve!(library, path, "decrypt"),
            load: resolve!(library, path, "load"),
            store: resolve!(library, path, "store"),
            operate: resolve!(library, path, "operate"),
            destroy_handle: resolve!(library, path, "destroyHandle"),
            get_scheme_name: resolve!(library, path, "getSchemeName"),
            get_scheme_security_name: resolve!(library, path, "getSchemeSecurityName"),
            get_benchmark_description_ex: resolve!(library, path, "getBenchmarkDescriptionEx"),
            get_error_description: resolve!(library, path, "getErrorDescription"),
            get_last_error_description: resolve!(library, path, "getLastErrorDescription"),
        };

        log::debug!("resolved all {} bridge symbols", 19);
        Ok(Self {
            symbols,
            _library: library,
        })
    }

}

/// Calls a string-returning backend function using the two-call pattern:
/// first with a null buffer to learn the required size, then with an
/// allocated buffer of that size. A required size of zero is treated as a
/// fatal backend error (modeled as [`ZERO_SIZE_ERROR`]) rather than an empty
/// string.
const ZERO_SIZE_ERROR: ErrorCode = c_int::MIN;

fn fetch_string(
    mut call: impl FnMut(*mut u8, *mut u64) -> ErrorCode,
) -> Result<String, ErrorCode> {
    let mut size: u64 = 0;
    let code = call(std::ptr::null_mut(), &mut size);
    if code != super::SUCCESS {
        return Err(code);
    }
    if size == 0 {
        return Err(ZERO_SIZE_ERROR);
    }

    let mut buffer = vec![0u8; size as usize];
    let code = call(buffer.as_mut_ptr(), &mut size);
    if code != super::SUCCESS {
        return Err(code);
    }
    buffer.truncate(size as usize);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

impl RawBridge for BackendLibrary {
    fn init_engine(&self) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe { (self.symbols.init_engine)(&mut out) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn subscribe_benchmarks_count(&self, engine: RawHandle) -> Result<u64, ErrorCode> {
        let mut out = 0u64;
        let code = unsafe { (self.symbols.subscribe_benchmarks_count)(engine, &mut out) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn subscribe_benchmarks(
        &self,
        engine: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode> {
        let mut out = vec![super::INVALID_HANDLE; capacity as usize];
        let code =
            unsafe { (self.symbols.subscribe_benchmarks)(engine, out.as_mut_ptr(), capacity) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn get_workload_params_details(&self, descriptor: RawHandle) -> Result<Vec<u8>, ErrorCode> {
        let mut size: u64 = 0;
        let code =
            unsafe { (self.symbols.get_workload_params_details)(descriptor, std::ptr::null_mut(), &mut size) };
        if code != super::SUCCESS {
            return Err(code);
        }
        if size == 0 {
            return Err(ZERO_SIZE_ERROR);
        }
        let mut buffer = vec![0u8; size as usize];
        let code = unsafe {
            (self.symbols.get_workload_params_details)(descriptor, buffer.as_mut_ptr(), &mut size)
        };
        if code == super::SUCCESS {
            buffer.truncate(size as usize);
            Ok(buffer)
        } else {
            Err(code)
        }
    }

    fn describe_benchmark(
        &self,
        descriptor: RawHandle,
        params: &[u8],
    ) -> Result<BenchmarkDescriptor, ErrorCode> {
        let mut raw = RawDescriptorFfi {
            workload_id: 0,
            data_type: 0,
            category: 0,
            _pad: [0; 2],
            warmup_iterations: 0,
            min_test_time_ms: 0,
            offline_sample_count: [0; MAX_OPERATION_PARAMS],
            cipher_param_mask: 0,
            scheme: 0,
            security: 0,
            other: 0,
        };
        let code = unsafe {
            (self.symbols.describe_benchmark)(
                descriptor,
                params.as_ptr(),
                params.len() as u64,
                &mut raw,
            )
        };
        if code != super::SUCCESS {
            return Err(code);
        }
        let data_type = DataType::from_wire(raw.data_type).map_err(|_| code)?;
        let category = Category::from_wire(raw.category).map_err(|_| code)?;
        Ok(BenchmarkDescriptor {
            workload_id: raw.workload_id,
            data_type,
            category,
            warmup_iterations: raw.warmup_iterations,
            min_test_time_ms: raw.min_test_time_ms,
            offline_sample_count: raw.offline_sample_count.to_vec(),
            cipher_param_mask: raw.cipher_param_mask,
            scheme: raw.scheme,
            security: raw.security,
            other: raw.other,
        })
    }

    fn create_benchmark(&self, descriptor: RawHandle) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe { (self.symbols.create_benchmark)(descriptor, &mut out) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn encode(
        &self,
        benchmark: RawHandle,
        param_index: u64,
        data: &[u8],
        sample_count: u64,
    ) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe {
            (self.symbols.encode)(
                benchmark,
                param_index,
                data.as_ptr(),
                data.len() as u64,
                sample_count,
                &mut out,
            )
        };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn decode(
        &self,
        benchmark: RawHandle,
        handle: RawHandle,
        expected_len: u64,
    ) -> Result<Vec<u8>, ErrorCode> {
        let mut buffer = vec![0u8; expected_len as usize];
        let code =
            unsafe { (self.symbols.decode)(benchmark, handle, buffer.as_mut_ptr(), expected_len) };
        if code == super::SUCCESS {
            Ok(buffer)
        } else {
            Err(code)
        }
    }

    fn encrypt(&self, benchmark: RawHandle, plaintext: RawHandle) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe { (self.symbols.encrypt)(benchmark, plaintext, &mut out) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn decrypt(&self, benchmark: RawHandle, ciphertext: RawHandle) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe { (self.symbols.decrypt)(benchmark, ciphertext, &mut out) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn load(&self, benchmark: RawHandle, handles: &[RawHandle]) -> Result<RawHandle, ErrorCode> {
        let mut out = super::INVALID_HANDLE;
        let code = unsafe {
            (self.symbols.load)(benchmark, handles.as_ptr(), handles.len() as u64, &mut out)
        };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn store(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode> {
        let mut out = vec![super::INVALID_HANDLE; capacity as usize];
        let code =
            unsafe { (self.symbols.store)(benchmark, remote, out.as_mut_ptr(), capacity) };
        if code == super::SUCCESS {
            Ok(out)
        } else {
            Err(code)
        }
    }

    fn operate(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        indexers: &[SampleIndexer],
    ) -> Result<(), ErrorCode> {
        let raw_indexers: Vec<SampleIndexerFfi> = indexers
            .iter()
            .map(|i| SampleIndexerFfi {
                value_index: i.value_index,
                batch_size: i.batch_size,
            })
            .collect();
        let code = unsafe {
            (self.symbols.operate)(
                benchmark,
                remote,
                raw_indexers.as_ptr(),
                raw_indexers.len() as u64,
            )
        };
        if code == super::SUCCESS {
            Ok(())
        } else {
            Err(code)
        }
    }

    fn destroy_handle(&self, handle: RawHandle) -> Result<(), ErrorCode> {
        let code = unsafe { (self.symbols.destroy_handle)(handle) };
        if code == super::SUCCESS {
            Ok(())
        } else {
            Err(code)
        }
    }

    fn get_scheme_name(&self, scheme: u32) -> Result<String, ErrorCode> {
        fetch_string(|buf, size| unsafe { (self.symbols.get_scheme_name)(scheme, buf, size) })
    }

    fn get_scheme_security_name(&self, scheme: u32, security: u32) -> Result<String, ErrorCode> {
        fetch_string(|buf, size| unsafe {
            (self.symbols.get_scheme_security_name)(scheme, security, buf, size)
        })
    }

    fn get_benchmark_description_ex(
        &self,
        descriptor: RawHandle,
        params: &[u8],
    ) -> Result<String, ErrorCode> {
        fetch_string(|buf, size| unsafe {
            (self.symbols.get_benchmark_description_ex)(
                descriptor,
                params.as_ptr(),
                params.len() as u64,
                buf,
                size,
            )
        })
    }

    fn get_error_description(&self, code: ErrorCode) -> Result<String, ErrorCode> {
        fetch_string(|buf, size| unsafe { (self.symbols.get_error_description)(code, buf, size) })
    }

    fn get_last_error_description(&self) -> Result<String, ErrorCode> {
        fetch_string(|buf, size| unsafe {
            (self.symbols.get_last_error_description)(buf, size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_library_reports_backend_load_error() {
        let result = BackendLibrary::load(PathBuf::from("/nonexistent/path/to/backend.so"));
        match result {
            Err(HarnessError::BackendLoadError { .. }) => {}
            Err(other) => panic!("expected BackendLoadError, got {other:?}"),
            Ok(_) => panic!("expected load to fail for a nonexistent path"),
        }
    }
}
