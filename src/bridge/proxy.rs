//! The checked layer: turns raw bridge error codes into [`HarnessError`].
//!
//! [`BackendProxy`] is the only thing the rest of the harness talks to. It
//! owns a `Box<dyn RawBridge>` (either a [`super::BackendLibrary`] loaded
//! from a real shared library, or a [`super::mock::MockBridge`] in tests) and
//! exposes one fallible method per bridge operation, wrapping every returned
//! [`Handle`] so it can only be destroyed once.

use super::{BenchmarkDescriptor, ErrorCode, RawBridge, RawHandle, SampleIndexer, CRITICAL_ERROR};
use crate::error::HarnessError;
use crate::handle::Handle;

/// Checked wrapper around a [`RawBridge`].
pub struct BackendProxy {
    bridge: Box<dyn RawBridge>,
}

impl BackendProxy {
    /// Wraps a raw bridge implementation.
    pub fn new(bridge: Box<dyn RawBridge>) -> Self {
        Self { bridge }
    }

    /// Turns a raw error code into a [`HarnessError::BackendError`], looking
    /// up human-readable text through the backend itself. Best-effort: if
    /// the text lookups themselves fail, a placeholder is used instead of
    /// recursing.
    fn translate(&self, code: ErrorCode) -> HarnessError {
        let code_text = self
            .bridge
            .get_error_description(code)
            .unwrap_or_else(|_| "<error description unavailable>".to_string());
        let last_text = self
            .bridge
            .get_last_error_description()
            .unwrap_or_else(|_| "<last error description unavailable>".to_string());
        HarnessError::BackendError {
            code,
            code_text,
            last_text,
            critical: code == CRITICAL_ERROR,
        }
    }

    /// `initEngine`.
    pub fn init_engine(&self) -> Result<Handle<'_>, HarnessError> {
        let raw = self.bridge.init_engine().map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "engine", self))
    }

    /// `subscribeBenchmarksCount`.
    pub fn subscribe_benchmarks_count(&self, engine: &Handle<'_>) -> Result<u64, HarnessError> {
        self.bridge
            .subscribe_benchmarks_count(engine.raw())
            .map_err(|c| self.translate(c))
    }

    /// `subscribeBenchmarks`.
    pub fn subscribe_benchmarks(
        &self,
        engine: &Handle<'_>,
        count: u64,
    ) -> Result<Vec<Handle<'_>>, HarnessError> {
        let raws = self
            .bridge
            .subscribe_benchmarks(engine.raw(), count)
            .map_err(|c| self.translate(c))?;
        Ok(raws
            .into_iter()
            .map(|raw| Handle::new(raw, "descriptor", self))
            .collect())
    }

    /// `getWorkloadParamsDetails`.
    pub fn get_workload_params_details(
        &self,
        descriptor: &Handle<'_>,
    ) -> Result<Vec<u8>, HarnessError> {
        self.bridge
            .get_workload_params_details(descriptor.raw())
            .map_err(|c| self.translate(c))
    }

    /// `describeBenchmark`.
    pub fn describe_benchmark(
        &self,
        descriptor: &Handle<'_>,
        params: &[u8],
    ) -> Result<BenchmarkDescriptor, HarnessError> {
        self.bridge
            .describe_benchmark(descriptor.raw(), params)
            .map_err(|c| self.translate(c))
    }

    /// `createBenchmark`.
    pub fn create_benchmark(&self, descriptor: &Handle<'_>) -> Result<Handle<'_>, HarnessError> {
        let raw = self
            .bridge
            .create_benchmark(descriptor.raw())
            .map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "benchmark", self))
    }

    /// `encode`.
    pub fn encode(
        &self,
        benchmark: &Handle<'_>,
        param_index: u64,
        data: &[u8],
        sample_count: u64,
    ) -> Result<Handle<'_>, HarnessError> {
        let raw = self
            .bridge
            .encode(benchmark.raw(), param_index, data, sample_count)
            .map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "encoded", self))
    }

    /// `decode`.
    pub fn decode(
        &self,
        benchmark: &Handle<'_>,
        handle: &Handle<'_>,
        expected_len: u64,
    ) -> Result<Vec<u8>, HarnessError> {
        self.bridge
            .decode(benchmark.raw(), handle.raw(), expected_len)
            .map_err(|c| self.translate(c))
    }

    /// `encrypt`.
    pub fn encrypt(
        &self,
        benchmark: &Handle<'_>,
        plaintext: &Handle<'_>,
    ) -> Result<Handle<'_>, HarnessError> {
        let raw = self
            .bridge
            .encrypt(benchmark.raw(), plaintext.raw())
            .map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "ciphertext", self))
    }

    /// `decrypt`.
    pub fn decrypt(
        &self,
        benchmark: &Handle<'_>,
        ciphertext: &Handle<'_>,
    ) -> Result<Handle<'_>, HarnessError> {
        let raw = self
            .bridge
            .decrypt(benchmark.raw(), ciphertext.raw())
            .map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "decrypted", self))
    }

    /// `load`.
    pub fn load(
        &self,
        benchmark: &Handle<'_>,
        handles: &[&Handle<'_>],
    ) -> Result<Handle<'_>, HarnessError> {
        let raws: Vec<RawHandle> = handles.iter().map(|h| h.raw()).collect();
        let raw = self
            .bridge
            .load(benchmark.raw(), &raws)
            .map_err(|c| self.translate(c))?;
        Ok(Handle::new(raw, "remote", self))
    }

    /// `store`.
    pub fn store(
        &self,
        benchmark: &Handle<'_>,
        remote: &Handle<'_>,
        capacity: u64,
    ) -> Result<Vec<Handle<'_>>, HarnessError> {
        let raws = self
            .bridge
            .store(benchmark.raw(), remote.raw(), capacity)
            .map_err(|c| self.translate(c))?;
        Ok(raws
            .into_iter()
            .map(|raw| Handle::new(raw, "stored", self))
            .collect())
    }

    /// `operate`.
    pub fn operate(
        &self,
        benchmark: &Handle<'_>,
        remote: &Handle<'_>,
        indexers: &[SampleIndexer],
    ) -> Result<(), HarnessError> {
        self.bridge
            .operate(benchmark.raw(), remote.raw(), indexers)
            .map_err(|c| self.translate(c))
    }

    /// `destroyHandle`. Only [`Handle::destroy`] should call this.
    pub(crate) fn destroy_handle(&self, raw: RawHandle) -> Result<(), HarnessError> {
        self.bridge
            .destroy_handle(raw)
            .map_err(|c| self.translate(c))
    }

    /// `getSchemeName`.
    pub fn scheme_name(&self, scheme: u32) -> Result<String, HarnessError> {
        self.bridge
            .get_scheme_name(scheme)
            .map_err(|c| self.translate(c))
    }

    /// `getSchemeSecurityName`.
    pub fn security_name(&self, scheme: u32, security: u32) -> Result<String, HarnessError> {
        self.bridge
            .get_scheme_security_name(scheme, security)
            .map_err(|c| self.translate(c))
    }

    /// `getBenchmarkDescriptionEx`.
    pub fn extra_description(
        &self,
        descriptor: &Handle<'_>,
        params: &[u8],
    ) -> Result<String, HarnessError> {
        self.bridge
            .get_benchmark_description_ex(descriptor.raw(), params)
            .map_err(|c| self.translate(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;

    fn proxy() -> BackendProxy {
        BackendProxy::new(Box::new(MockBridge::new()))
    }

    #[test]
    fn init_engine_returns_a_destroyable_handle() {
        let proxy = proxy();
        let engine = proxy.init_engine().expect("init should succeed");
        engine.destroy().expect("destroy should succeed");
    }

    #[test]
    fn backend_error_carries_code_and_texts() {
        let proxy = proxy();
        let engine = proxy.init_engine().unwrap();
        // Ask for a descriptor count on a bogus handle raw value to trigger
        // the mock's "unknown handle" error path.
        let bogus = Handle::new(999_999, "descriptor", &proxy);
        let err = proxy
            .subscribe_benchmarks_count(&bogus)
            .expect_err("bogus handle should fail");
        match err {
            HarnessError::BackendError {
                code_text,
                last_text,
                critical,
                ..
            } => {
                assert!(!code_text.is_empty());
                assert!(!last_text.is_empty());
                assert!(!critical);
            }
            other => panic!("expected BackendError, got {other:?}"),
        }
        bogus.destroy().ok();
        engine.destroy().unwrap();
    }
}
