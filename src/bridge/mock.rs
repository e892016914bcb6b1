//! An in-process [`RawBridge`] stand-in used only by this crate's own test
//! suite, so the Engine, the Runner, and the Proxy's error-handling logic can
//! all be exercised without `dlopen`-ing a real backend shared library.
//!
//! The mock keeps just enough state to behave like a tiny, well-behaved
//! backend: one fixed catalogue of benchmark descriptors, handles that must
//! be destroyed before they can be reused, and operations that round-trip
//! data rather than actually computing anything cryptographic.

#![cfg(test)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{BenchmarkDescriptor, Category, DataType, ErrorCode, RawBridge, RawHandle, SampleIndexer};

const UNKNOWN_HANDLE: ErrorCode = 1;
const WRONG_RESOURCE_KIND: ErrorCode = 2;
const NOT_ENCRYPTED: ErrorCode = 3;

#[derive(Clone)]
enum Resource {
    Engine,
    Descriptor { index: usize },
    Benchmark,
    Buffer { data: Vec<u8>, encrypted: bool },
    Remote { members: Vec<RawHandle> },
}

/// One entry in the mock's fixed descriptor catalogue.
struct Seed {
    workload_id: u32,
    data_type: DataType,
    category: Category,
}

/// An in-process double for a backend shared library.
pub struct MockBridge {
    next_handle: Cell<RawHandle>,
    resources: RefCell<HashMap<RawHandle, Resource>>,
    last_error: RefCell<String>,
    catalogue: Vec<Seed>,
}

impl MockBridge {
    /// Builds a mock with a small fixed catalogue: one Latency benchmark and
    /// one Offline benchmark, both over `Int64` data.
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            resources: RefCell::new(HashMap::new()),
            last_error: RefCell::new(String::new()),
            catalogue: vec![
                Seed {
                    workload_id: 1,
                    data_type: DataType::Int64,
                    category: Category::Latency,
                },
                Seed {
                    workload_id: 2,
                    data_type: DataType::Int64,
                    category: Category::Offline,
                },
            ],
        }
    }

    fn fail(&self, code: ErrorCode, reason: impl Into<String>) -> ErrorCode {
        *self.last_error.borrow_mut() = reason.into();
        code
    }

    fn alloc(&self, resource: Resource) -> RawHandle {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.resources.borrow_mut().insert(handle, resource);
        handle
    }

    fn get(&self, handle: RawHandle) -> Result<Resource, ErrorCode> {
        self.resources
            .borrow()
            .get(&handle)
            .cloned()
            .ok_or_else(|| self.fail(UNKNOWN_HANDLE, format!("unknown handle {handle}")))
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RawBridge for MockBridge {
    fn init_engine(&self) -> Result<RawHandle, ErrorCode> {
        Ok(self.alloc(Resource::Engine))
    }

    fn subscribe_benchmarks_count(&self, engine: RawHandle) -> Result<u64, ErrorCode> {
        match self.get(engine)? {
            Resource::Engine => Ok(self.catalogue.len() as u64),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not an engine")),
        }
    }

    fn subscribe_benchmarks(
        &self,
        engine: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode> {
        match self.get(engine)? {
            Resource::Engine => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not an engine")),
        }
        let take = (capacity as usize).min(self.catalogue.len());
        Ok((0..take)
            .map(|index| self.alloc(Resource::Descriptor { index }))
            .collect())
    }

    fn get_workload_params_details(&self, descriptor: RawHandle) -> Result<Vec<u8>, ErrorCode> {
        match self.get(descriptor)? {
            Resource::Descriptor { .. } => Ok(Vec::new()),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a descriptor")),
        }
    }

    fn describe_benchmark(
        &self,
        descriptor: RawHandle,
        _params: &[u8],
    ) -> Result<BenchmarkDescriptor, ErrorCode> {
        let index = match self.get(descriptor)? {
            Resource::Descriptor { index } => index,
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a descriptor")),
        };
        let seed = &self.catalogue[index];
        Ok(BenchmarkDescriptor {
            workload_id: seed.workload_id,
            data_type: seed.data_type,
            category: seed.category,
            warmup_iterations: 2,
            min_test_time_ms: 100,
            offline_sample_count: vec![16, 16],
            cipher_param_mask: 0b11,
            scheme: 0,
            security: 0,
            other: 0,
        })
    }

    fn create_benchmark(&self, descriptor: RawHandle) -> Result<RawHandle, ErrorCode> {
        match self.get(descriptor)? {
            Resource::Descriptor { .. } => Ok(self.alloc(Resource::Benchmark)),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a descriptor")),
        }
    }

    fn encode(
        &self,
        benchmark: RawHandle,
        _param_index: u64,
        data: &[u8],
        _sample_count: u64,
    ) -> Result<RawHandle, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => Ok(self.alloc(Resource::Buffer {
                data: data.to_vec(),
                encrypted: false,
            })),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
    }

    fn decode(
        &self,
        benchmark: RawHandle,
        handle: RawHandle,
        _expected_len: u64,
    ) -> Result<Vec<u8>, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        match self.get(handle)? {
            Resource::Buffer { data, .. } => Ok(data),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a buffer")),
        }
    }

    fn encrypt(&self, benchmark: RawHandle, plaintext: RawHandle) -> Result<RawHandle, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        match self.get(plaintext)? {
            Resource::Buffer { data, .. } => Ok(self.alloc(Resource::Buffer {
                data,
                encrypted: true,
            })),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a buffer")),
        }
    }

    fn decrypt(&self, benchmark: RawHandle, ciphertext: RawHandle) -> Result<RawHandle, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        match self.get(ciphertext)? {
            Resource::Buffer {
                data,
                encrypted: true,
            } => Ok(self.alloc(Resource::Buffer {
                data,
                encrypted: false,
            })),
            Resource::Buffer { encrypted: false, .. } => {
                Err(self.fail(NOT_ENCRYPTED, "buffer is not encrypted"))
            }
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a buffer")),
        }
    }

    fn load(&self, benchmark: RawHandle, handles: &[RawHandle]) -> Result<RawHandle, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        for &handle in handles {
            self.get(handle)?;
        }
        Ok(self.alloc(Resource::Remote {
            members: handles.to_vec(),
        }))
    }

    fn store(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        capacity: u64,
    ) -> Result<Vec<RawHandle>, ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        let members = match self.get(remote)? {
            Resource::Remote { members } => members,
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a remote")),
        };
        // Results computed from at least one ciphertext member stay
        // ciphertexts, mirroring a real backend that never drops back to
        // plaintext mid-pipeline.
        let encrypted = members
            .iter()
            .any(|&m| matches!(self.get(m), Ok(Resource::Buffer { encrypted: true, .. })));
        Ok((0..capacity)
            .map(|_| {
                self.alloc(Resource::Buffer {
                    data: Vec::new(),
                    encrypted,
                })
            })
            .collect())
    }

    fn operate(
        &self,
        benchmark: RawHandle,
        remote: RawHandle,
        _indexers: &[SampleIndexer],
    ) -> Result<(), ErrorCode> {
        match self.get(benchmark)? {
            Resource::Benchmark => {}
            _ => return Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a benchmark")),
        }
        match self.get(remote)? {
            Resource::Remote { .. } => Ok(()),
            _ => Err(self.fail(WRONG_RESOURCE_KIND, "handle is not a remote")),
        }
    }

    fn destroy_handle(&self, handle: RawHandle) -> Result<(), ErrorCode> {
        self.resources
            .borrow_mut()
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| self.fail(UNKNOWN_HANDLE, format!("unknown handle {handle}")))
    }

    fn get_scheme_name(&self, scheme: u32) -> Result<String, ErrorCode> {
        Ok(format!("mock-scheme-{scheme}"))
    }

    fn get_scheme_security_name(&self, scheme: u32, security: u32) -> Result<String, ErrorCode> {
        Ok(format!("mock-security-{scheme}-{security}"))
    }

    fn get_benchmark_description_ex(
        &self,
        descriptor: RawHandle,
        _params: &[u8],
    ) -> Result<String, ErrorCode> {
        self.get(descriptor)?;
        Ok("mock benchmark, no extra description".to_string())
    }

    fn get_error_description(&self, code: ErrorCode) -> Result<String, ErrorCode> {
        let text = match code {
            UNKNOWN_HANDLE => "unknown handle",
            WRONG_RESOURCE_KIND => "handle refers to the wrong kind of resource",
            NOT_ENCRYPTED => "buffer is not encrypted",
            _ => "unrecognized mock error code",
        };
        Ok(text.to_string())
    }

    fn get_last_error_description(&self) -> Result<String, ErrorCode> {
        let message = self.last_error.borrow();
        if message.is_empty() {
            Ok("no error recorded".to_string())
        } else {
            Ok(message.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_round_trip() {
        let bridge = MockBridge::new();
        let engine = bridge.init_engine().unwrap();
        let count = bridge.subscribe_benchmarks_count(engine).unwrap();
        assert_eq!(count, 2);
        let descriptors = bridge.subscribe_benchmarks(engine, count).unwrap();
        assert_eq!(descriptors.len(), 2);
        let described = bridge.describe_benchmark(descriptors[0], &[]).unwrap();
        assert_eq!(described.category, Category::Latency);
        for handle in descriptors {
            bridge.destroy_handle(handle).unwrap();
        }
        bridge.destroy_handle(engine).unwrap();
    }

    #[test]
    fn encrypt_decrypt_round_trips_the_bytes() {
        let bridge = MockBridge::new();
        let engine = bridge.init_engine().unwrap();
        let descriptors = bridge.subscribe_benchmarks(engine, 1).unwrap();
        let benchmark = bridge.create_benchmark(descriptors[0]).unwrap();
        let plaintext = bridge.encode(benchmark, 0, &[1, 2, 3, 4], 1).unwrap();
        let ciphertext = bridge.encrypt(benchmark, plaintext).unwrap();
        let decrypted = bridge.decrypt(benchmark, ciphertext).unwrap();
        let bytes = bridge.decode(benchmark, decrypted, 4).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);

        bridge.destroy_handle(decrypted).unwrap();
        bridge.destroy_handle(ciphertext).unwrap();
        bridge.destroy_handle(plaintext).unwrap();
        bridge.destroy_handle(benchmark).unwrap();
        bridge.destroy_handle(descriptors[0]).unwrap();
        bridge.destroy_handle(engine).unwrap();
    }

    #[test]
    fn unknown_handle_reports_last_error() {
        let bridge = MockBridge::new();
        let err = bridge.destroy_handle(12345).unwrap_err();
        assert_eq!(err, UNKNOWN_HANDLE);
        let last = bridge.get_last_error_description().unwrap();
        assert!(last.contains("12345"));
    }
}
