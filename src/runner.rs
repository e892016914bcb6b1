//! Drives one created [`Benchmark`] through its category pipeline — encode,
//! encrypt, load, operate, store, decrypt, decode, validate — timing every
//! stage and cleaning up every handle it acquires in LIFO order, on every
//! exit path.
//!
//! Latency benchmarks repeat the operate/store/decrypt/decode tail in a
//! timed loop until `min_test_time_ms` elapses or a harness-wide iteration
//! cap is hit; Offline benchmarks make one `operate` call over the full
//! Cartesian product of input samples.

use crate::bridge::{BackendProxy, Category, DataType, SampleIndexer};
use crate::dataset::{delinearize, Dataset};
use crate::engine::Benchmark;
use crate::error::HarnessError;
use crate::handle::Handle;
use crate::numeric::Element;
use crate::timing::{Clock, EventId, TimingEvent, TimingLog};

/// Outcome of driving one benchmark through the pipeline.
#[derive(Debug)]
pub enum Outcome {
    /// Every pipeline stage completed and every result sample validated.
    Success,
    /// A pipeline stage returned a non-critical [`HarnessError`].
    Failed(HarnessError),
    /// Every stage completed, but at least one result sample did not match
    /// the reference computation.
    ValidationFailed {
        /// Multi-dimensional sample index of the first mismatch.
        index_tuple: Vec<u64>,
        /// Offset within that sample's output vector of the first mismatch.
        first_bad_offset: usize,
    },
}

impl Outcome {
    /// `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// `true` if this outcome should abort the whole run rather than just
    /// move on to the next benchmark (a backend-reported `CRITICAL_ERROR`).
    pub fn is_critical(&self) -> bool {
        matches!(self, Outcome::Failed(HarnessError::BackendError { critical: true, .. }))
    }
}

/// Harness-wide cap on Latency timed iterations, so a backend whose
/// `min_test_time_ms` the harness can never satisfy (e.g. a clock that
/// doesn't advance) cannot loop forever.
pub const MAX_LATENCY_ITERATIONS: u64 = 1_000_000;

const EVENT_ENCODE: EventId = "encode";
const EVENT_ENCRYPT: EventId = "encrypt";
const EVENT_LOAD: EventId = "load";
const EVENT_OPERATE: EventId = "operate";

/// Increments/decrements a multi-index over per-parameter sample counts in
/// row-major order.
#[derive(Debug, Clone)]
pub struct ComponentCounter {
    counts: Vec<u64>,
    indices: Vec<u64>,
}

impl ComponentCounter {
    /// A fresh counter at the zero multi-index over `counts`.
    pub fn new(counts: Vec<u64>) -> Self {
        let len = counts.len();
        Self { counts, indices: vec![0; len] }
    }

    /// The current multi-index.
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// Advances to the next multi-index in row-major order. Returns `true`
    /// exactly on the call that wraps the counter back to zero — the final
    /// increment of a full pass over the Cartesian product.
    pub fn inc(&mut self) -> bool {
        for p in (0..self.indices.len()).rev() {
            self.indices[p] += 1;
            if self.indices[p] < self.counts[p].max(1) {
                return false;
            }
            self.indices[p] = 0;
        }
        true
    }

    /// Exact inverse of [`ComponentCounter::inc`].
    pub fn dec(&mut self) -> bool {
        for p in (0..self.indices.len()).rev() {
            if self.indices[p] == 0 {
                self.indices[p] = self.counts[p].max(1) - 1;
            } else {
                self.indices[p] -= 1;
                return false;
            }
        }
        true
    }
}

/// Drives `benchmark` through its category pipeline against `dataset`.
///
/// `min_test_time_ms` and `tolerance` are resolved by the caller (the
/// Driver) from the run configuration and the backend's own declared
/// defaults; `validate` corresponds to `--enable_validation`.
pub fn run(
    benchmark: &Benchmark<'_>,
    dataset: &Dataset,
    min_test_time_ms: u64,
    tolerance: f64,
    validate: bool,
) -> (TimingLog, Outcome) {
    let mut stack: Vec<Handle<'_>> = Vec::new();
    let mut log = TimingLog::new();
    let clock = Clock::start();

    let result = run_inner(benchmark, dataset, min_test_time_ms, tolerance, validate, &mut stack, &mut log, &clock);
    let cleanup_result = drain_destroy(&mut stack, 0);

    let outcome = match (result, cleanup_result) {
        (Ok(outcome), Ok(())) => outcome,
        (Ok(_), Err(err)) => Outcome::Failed(err),
        (Err(err), _) => Outcome::Failed(err),
    };
    (log, outcome)
}

#[allow(clippy::too_many_arguments)]
fn run_inner<'p>(
    benchmark: &Benchmark<'p>,
    dataset: &Dataset,
    min_test_time_ms: u64,
    tolerance: f64,
    validate: bool,
    stack: &mut Vec<Handle<'p>>,
    log: &mut TimingLog,
    clock: &Clock,
) -> Result<Outcome, HarnessError> {
    let handle = benchmark.handle();
    let proxy = handle.proxy();
    let descriptor = &benchmark.token().descriptor;
    let data_type = descriptor.data_type;
    let param_count = dataset.inputs.len();
    let component_count = dataset.outputs.len();

    // 1. encode — one parameter pack at a time.
    let (ws, cs) = (clock.wall_nanos(), clock.cpu_nanos());
    let mut operate_idx = Vec::with_capacity(param_count);
    for (p, samples) in dataset.inputs.iter().enumerate() {
        let bytes = flatten(samples);
        let sample_count = samples.len() as u64;
        let encoded = proxy.encode(handle, p as u64, &bytes, sample_count)?;
        stack.push(encoded);
        operate_idx.push(stack.len() - 1);
    }
    push_event(log, EVENT_ENCODE, 0, param_count as u64, ws, cs, clock);

    // 2. encrypt each masked operation parameter.
    let (ws, cs) = (clock.wall_nanos(), clock.cpu_nanos());
    let mut any_encrypted = false;
    for (p, idx) in operate_idx.iter_mut().enumerate() {
        if descriptor.cipher_param_mask & (1 << p) != 0 {
            let ciphertext = proxy.encrypt(handle, &stack[*idx])?;
            stack.push(ciphertext);
            *idx = stack.len() - 1;
            any_encrypted = true;
        }
    }
    push_event(log, EVENT_ENCRYPT, 0, param_count as u64, ws, cs, clock);

    // 3. load all operation parameters into one remote handle.
    let (ws, cs) = (clock.wall_nanos(), clock.cpu_nanos());
    let refs: Vec<&Handle<'p>> = operate_idx.iter().map(|&i| &stack[i]).collect();
    let remote = proxy.load(handle, &refs)?;
    stack.push(remote);
    let remote_idx = stack.len() - 1;
    push_event(log, EVENT_LOAD, 0, param_count as u64, ws, cs, clock);

    let input_sample_counts: Vec<u64> = dataset.inputs.iter().map(|p| p.len() as u64).collect();
    let output_vector_lens: Vec<usize> =
        dataset.outputs.iter().map(|c| c.first().map_or(0, Vec::len)).collect();

    match descriptor.category {
        Category::Latency => run_latency(
            proxy,
            handle,
            remote_idx,
            param_count,
            component_count,
            &output_vector_lens,
            any_encrypted,
            data_type,
            descriptor.warmup_iterations,
            min_test_time_ms,
            dataset,
            tolerance,
            validate,
            stack,
            log,
            clock,
        ),
        Category::Offline => run_offline(
            proxy,
            handle,
            remote_idx,
            component_count,
            &output_vector_lens,
            any_encrypted,
            data_type,
            &input_sample_counts,
            dataset,
            tolerance,
            validate,
            stack,
            log,
            clock,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_latency<'p>(
    proxy: &BackendProxy,
    handle: &Handle<'p>,
    remote_idx: usize,
    param_count: usize,
    component_count: usize,
    output_vector_lens: &[usize],
    any_encrypted: bool,
    data_type: DataType,
    warmup_iterations: u32,
    min_test_time_ms: u64,
    dataset: &Dataset,
    tolerance: f64,
    validate: bool,
    stack: &mut Vec<Handle<'p>>,
    log: &mut TimingLog,
    clock: &Clock,
) -> Result<Outcome, HarnessError> {
    let indexers: Vec<SampleIndexer> =
        (0..param_count).map(|_| SampleIndexer { value_index: 0, batch_size: 1 }).collect();

    for _ in 0..warmup_iterations {
        let before = stack.len();
        proxy.operate(handle, &stack[remote_idx], &indexers)?;
        store_decrypt_decode(
            proxy,
            handle,
            &stack[remote_idx],
            component_count,
            output_vector_lens,
            any_encrypted,
            data_type,
            1,
            stack,
        )?;
        drain_destroy(stack, before)?;
    }

    let mut first_decoded: Option<Vec<Vec<Element>>> = None;
    let mut iterations = 0u64;
    let start = clock.wall_nanos();
    loop {
        let (ws, cs) = (clock.wall_nanos(), clock.cpu_nanos());
        let before = stack.len();
        proxy.operate(handle, &stack[remote_idx], &indexers)?;
        let decoded = store_decrypt_decode(
            proxy,
            handle,
            &stack[remote_idx],
            component_count,
            output_vector_lens,
            any_encrypted,
            data_type,
            1,
            stack,
        )?;
        drain_destroy(stack, before)?;
        push_event(log, EVENT_OPERATE, iterations, 1, ws, cs, clock);
        if first_decoded.is_none() {
            first_decoded = Some(decoded);
        }
        iterations += 1;
        let elapsed_ms = (clock.wall_nanos() - start) / 1_000_000;
        if elapsed_ms >= min_test_time_ms || iterations >= MAX_LATENCY_ITERATIONS {
            break;
        }
    }

    if validate {
        if let Some(decoded) = first_decoded {
            if let Some(offset) = first_mismatch(&decoded, dataset, 0, tolerance) {
                return Ok(Outcome::ValidationFailed {
                    index_tuple: vec![0; param_count],
                    first_bad_offset: offset,
                });
            }
        }
    }
    Ok(Outcome::Success)
}

#[allow(clippy::too_many_arguments)]
fn run_offline<'p>(
    proxy: &BackendProxy,
    handle: &Handle<'p>,
    remote_idx: usize,
    component_count: usize,
    output_vector_lens: &[usize],
    any_encrypted: bool,
    data_type: DataType,
    input_sample_counts: &[u64],
    dataset: &Dataset,
    tolerance: f64,
    validate: bool,
    stack: &mut Vec<Handle<'p>>,
    log: &mut TimingLog,
    clock: &Clock,
) -> Result<Outcome, HarnessError> {
    let indexers: Vec<SampleIndexer> = input_sample_counts
        .iter()
        .map(|&count| SampleIndexer { value_index: 0, batch_size: count })
        .collect();
    let total_samples: u64 = input_sample_counts.iter().product();

    let (ws, cs) = (clock.wall_nanos(), clock.cpu_nanos());
    proxy.operate(handle, &stack[remote_idx], &indexers)?;
    push_event(log, EVENT_OPERATE, 0, total_samples, ws, cs, clock);

    let before = stack.len();
    let decoded = store_decrypt_decode(
        proxy,
        handle,
        &stack[remote_idx],
        component_count,
        output_vector_lens,
        any_encrypted,
        data_type,
        total_samples as usize,
        stack,
    )?;
    drain_destroy(stack, before)?;

    if validate {
        for sample_idx in 0..total_samples as usize {
            if let Some(offset) = first_mismatch(&decoded, dataset, sample_idx, tolerance) {
                return Ok(Outcome::ValidationFailed {
                    index_tuple: delinearize(sample_idx as u64, input_sample_counts),
                    first_bad_offset: offset,
                });
            }
        }
    }
    Ok(Outcome::Success)
}

/// store → (decrypt) → decode for every output component, returning each
/// component's decoded elements flattened across all `sample_count` samples
/// in row-major order. Every handle this acquires is pushed onto `stack` so
/// the caller's [`drain_destroy`] scope destroys it.
#[allow(clippy::too_many_arguments)]
fn store_decrypt_decode<'p>(
    proxy: &BackendProxy,
    benchmark: &Handle<'p>,
    remote: &Handle<'p>,
    component_count: usize,
    output_vector_lens: &[usize],
    decrypt_outputs: bool,
    data_type: DataType,
    sample_count: usize,
    stack: &mut Vec<Handle<'p>>,
) -> Result<Vec<Vec<Element>>, HarnessError> {
    let stored = proxy.store(benchmark, remote, component_count as u64)?;
    let stored_idx: Vec<usize> = stored
        .into_iter()
        .map(|h| {
            stack.push(h);
            stack.len() - 1
        })
        .collect();

    let mut decoded = Vec::with_capacity(component_count);
    for (c, &idx) in stored_idx.iter().enumerate() {
        let final_idx = if decrypt_outputs {
            let plaintext = proxy.decrypt(benchmark, &stack[idx])?;
            stack.push(plaintext);
            stack.len() - 1
        } else {
            idx
        };
        let element_count = output_vector_lens[c] * sample_count;
        let expected_bytes = (element_count * data_type.element_size()) as u64;
        let bytes = proxy.decode(benchmark, &stack[final_idx], expected_bytes)?;
        decoded.push(unflatten(&bytes, data_type, element_count));
    }
    Ok(decoded)
}

/// Compares the decoded sample at `sample_idx` for every output component
/// against `dataset`'s reference, returning the offset of the first mismatch
/// within that sample's vector.
fn first_mismatch(decoded: &[Vec<Element>], dataset: &Dataset, sample_idx: usize, tolerance: f64) -> Option<usize> {
    for (c, component) in decoded.iter().enumerate() {
        let reference = dataset.outputs[c].get(sample_idx)?;
        let vector_len = reference.len();
        let start = sample_idx * vector_len;
        for k in 0..vector_len {
            let actual = component[start + k];
            if !actual.matches_reference(reference[k], tolerance) {
                return Some(k);
            }
        }
    }
    None
}

/// Destroys every handle in `stack` past index `from`, in LIFO (most
/// recently acquired first) order, continuing past individual failures so
/// every handle gets a destroy attempt on every exit path.
fn drain_destroy(stack: &mut Vec<Handle<'_>>, from: usize) -> Result<(), HarnessError> {
    let mut first_err = None;
    while stack.len() > from {
        let handle = stack.pop().expect("stack.len() > from implies a next element");
        if let Err(err) = handle.destroy() {
            log::warn!("failed to destroy handle during pipeline cleanup: {err}");
            if first_err.is_none() {
                first_err = Some(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn push_event(log: &mut TimingLog, event_id: EventId, iteration: u64, input_sample_count: u64, wall_start: u64, cpu_start: u64, clock: &Clock) {
    log.record(TimingEvent {
        event_id,
        iteration,
        input_sample_count,
        wall_start,
        wall_end: clock.wall_nanos(),
        cpu_start,
        cpu_end: clock.cpu_nanos(),
    });
}

fn flatten(samples: &[Vec<Element>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for sample in samples {
        for element in sample {
            bytes.extend(element.to_le_bytes());
        }
    }
    bytes
}

fn unflatten(bytes: &[u8], data_type: DataType, count: usize) -> Vec<Element> {
    let elem_size = data_type.element_size();
    (0..count)
        .map(|i| {
            let offset = i * elem_size;
            Element::from_le_bytes(&bytes[offset..offset + elem_size], data_type)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_counter_wraps_after_the_full_product() {
        let mut counter = ComponentCounter::new(vec![2, 3]);
        let mut wraps = 0;
        for _ in 0..6 {
            if counter.inc() {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert_eq!(counter.indices(), [0, 0]);
    }

    #[test]
    fn component_counter_dec_is_the_exact_inverse_of_inc() {
        let mut counter = ComponentCounter::new(vec![2, 3, 4]);
        let mut history = vec![counter.indices().to_vec()];
        for _ in 0..23 {
            counter.inc();
            history.push(counter.indices().to_vec());
        }
        for expected in history.into_iter().rev() {
            assert_eq!(counter.indices(), expected.as_slice());
            counter.dec();
        }
    }

    mod pipeline {
        use super::super::*;
        use crate::bridge::{BenchmarkDescriptor, ErrorCode, RawBridge, RawHandle};
        use crate::engine::Engine;
        use std::cell::{Cell, RefCell};
        use std::collections::HashMap;

        /// A test double that actually echoes encoded input bytes back out
        /// through `load`/`operate`/`store`, so the pipeline's plumbing
        /// (handle bookkeeping, event recording, cleanup) can be exercised
        /// end to end against a dataset the decoded result is known to
        /// match exactly, without modelling real backend arithmetic.
        struct EchoBridge {
            next: Cell<RawHandle>,
            buffers: RefCell<HashMap<RawHandle, Vec<u8>>>,
            remotes: RefCell<HashMap<RawHandle, Vec<RawHandle>>>,
            category: Category,
            cipher_param_mask: u64,
            fail_after_operates: Cell<Option<u32>>,
        }

        impl EchoBridge {
            fn new(category: Category, cipher_param_mask: u64) -> Self {
                Self {
                    next: Cell::new(1),
                    buffers: RefCell::new(HashMap::new()),
                    remotes: RefCell::new(HashMap::new()),
                    category,
                    cipher_param_mask,
                    fail_after_operates: Cell::new(None),
                }
            }

            fn alloc(&self) -> RawHandle {
                let h = self.next.get();
                self.next.set(h + 1);
                h
            }
        }

        impl RawBridge for EchoBridge {
            fn init_engine(&self) -> Result<RawHandle, ErrorCode> {
                Ok(self.alloc())
            }

            fn subscribe_benchmarks_count(&self, _engine: RawHandle) -> Result<u64, ErrorCode> {
                Ok(1)
            }

            fn subscribe_benchmarks(&self, _engine: RawHandle, capacity: u64) -> Result<Vec<RawHandle>, ErrorCode> {
                Ok((0..capacity.min(1)).map(|_| self.alloc()).collect())
            }

            fn get_workload_params_details(&self, _descriptor: RawHandle) -> Result<Vec<u8>, ErrorCode> {
                Ok(Vec::new())
            }

            fn describe_benchmark(&self, _descriptor: RawHandle, _params: &[u8]) -> Result<BenchmarkDescriptor, ErrorCode> {
                Ok(BenchmarkDescriptor {
                    workload_id: 1,
                    data_type: DataType::Int64,
                    category: self.category,
                    warmup_iterations: 1,
                    min_test_time_ms: 0,
                    offline_sample_count: vec![3, 3],
                    cipher_param_mask: self.cipher_param_mask,
                    scheme: 0,
                    security: 0,
                    other: 0,
                })
            }

            fn create_benchmark(&self, _descriptor: RawHandle) -> Result<RawHandle, ErrorCode> {
                Ok(self.alloc())
            }

            fn encode(&self, _benchmark: RawHandle, _param_index: u64, data: &[u8], _sample_count: u64) -> Result<RawHandle, ErrorCode> {
                let h = self.alloc();
                self.buffers.borrow_mut().insert(h, data.to_vec());
                Ok(h)
            }

            fn decode(&self, _benchmark: RawHandle, handle: RawHandle, expected_len: u64) -> Result<Vec<u8>, ErrorCode> {
                let buffers = self.buffers.borrow();
                let data = buffers.get(&handle).ok_or(1)?;
                let mut out = data.clone();
                out.resize(expected_len as usize, 0);
                Ok(out)
            }

            fn encrypt(&self, _benchmark: RawHandle, plaintext: RawHandle) -> Result<RawHandle, ErrorCode> {
                let data = self.buffers.borrow().get(&plaintext).cloned().ok_or(1)?;
                let h = self.alloc();
                self.buffers.borrow_mut().insert(h, data);
                Ok(h)
            }

            fn decrypt(&self, _benchmark: RawHandle, ciphertext: RawHandle) -> Result<RawHandle, ErrorCode> {
                let data = self.buffers.borrow().get(&ciphertext).cloned().ok_or(1)?;
                let h = self.alloc();
                self.buffers.borrow_mut().insert(h, data);
                Ok(h)
            }

            fn load(&self, _benchmark: RawHandle, handles: &[RawHandle]) -> Result<RawHandle, ErrorCode> {
                let h = self.alloc();
                self.remotes.borrow_mut().insert(h, handles.to_vec());
                Ok(h)
            }

            fn store(&self, _benchmark: RawHandle, remote: RawHandle, capacity: u64) -> Result<Vec<RawHandle>, ErrorCode> {
                let members = self.remotes.borrow().get(&remote).cloned().ok_or(1)?;
                // Single-parameter workloads: echo the one loaded member back
                // out as the single output component.
                let source = members.first().copied().ok_or(1)?;
                let data = self.buffers.borrow().get(&source).cloned().ok_or(1)?;
                Ok((0..capacity)
                    .map(|_| {
                        let h = self.alloc();
                        self.buffers.borrow_mut().insert(h, data.clone());
                        h
                    })
                    .collect())
            }

            fn operate(&self, _benchmark: RawHandle, _remote: RawHandle, _indexers: &[SampleIndexer]) -> Result<(), ErrorCode> {
                if let Some(remaining) = self.fail_after_operates.get() {
                    if remaining == 0 {
                        return Err(42);
                    }
                    self.fail_after_operates.set(Some(remaining - 1));
                }
                Ok(())
            }

            fn destroy_handle(&self, handle: RawHandle) -> Result<(), ErrorCode> {
                let had_buffer = self.buffers.borrow_mut().remove(&handle).is_some();
                let had_remote = self.remotes.borrow_mut().remove(&handle).is_some();
                if had_buffer || had_remote || handle != 0 {
                    Ok(())
                } else {
                    Err(1)
                }
            }

            fn get_scheme_name(&self, _scheme: u32) -> Result<String, ErrorCode> {
                Ok("echo".to_string())
            }

            fn get_scheme_security_name(&self, _scheme: u32, _security: u32) -> Result<String, ErrorCode> {
                Ok("echo-security".to_string())
            }

            fn get_benchmark_description_ex(&self, _descriptor: RawHandle, _params: &[u8]) -> Result<String, ErrorCode> {
                Ok(String::new())
            }

            fn get_error_description(&self, _code: ErrorCode) -> Result<String, ErrorCode> {
                Ok("echo bridge error".to_string())
            }

            fn get_last_error_description(&self) -> Result<String, ErrorCode> {
                Ok("echo bridge error".to_string())
            }
        }

        fn dataset_for(samples: Vec<i64>) -> Dataset {
            let values: Vec<Vec<Element>> = samples.into_iter().map(|v| vec![Element::Int64(v)]).collect();
            Dataset {
                inputs: vec![values.clone()],
                outputs: vec![values],
            }
        }

        #[test]
        fn latency_pipeline_validates_an_echoed_result() {
            let engine = Engine::new(BackendProxy::new(Box::new(EchoBridge::new(Category::Latency, 0)))).unwrap();
            let token = engine.describe(0, &[]).unwrap();
            let benchmark = engine.create(token).unwrap();
            let dataset = dataset_for(vec![7]);

            let (log, outcome) = run(&benchmark, &dataset, 0, 0.05, true);
            assert!(outcome.is_success(), "{outcome:?}");
            assert!(log.stats().contains_key("operate"));
            benchmark.destroy().unwrap();
        }

        #[test]
        fn offline_pipeline_validates_every_echoed_sample() {
            let engine = Engine::new(BackendProxy::new(Box::new(EchoBridge::new(Category::Offline, 0)))).unwrap();
            let token = engine.describe(0, &[]).unwrap();
            let benchmark = engine.create(token).unwrap();
            let dataset = dataset_for(vec![1, 2, 3]);

            let (_log, outcome) = run(&benchmark, &dataset, 0, 0.05, true);
            assert!(outcome.is_success(), "{outcome:?}");
            benchmark.destroy().unwrap();
        }

        #[test]
        fn pipeline_round_trips_through_encryption() {
            let engine = Engine::new(BackendProxy::new(Box::new(EchoBridge::new(Category::Latency, 0b1)))).unwrap();
            let token = engine.describe(0, &[]).unwrap();
            let benchmark = engine.create(token).unwrap();
            let dataset = dataset_for(vec![9]);

            let (_log, outcome) = run(&benchmark, &dataset, 0, 0.05, true);
            assert!(outcome.is_success(), "{outcome:?}");
            benchmark.destroy().unwrap();
        }

        #[test]
        fn mismatched_reference_reports_validation_failed() {
            let engine = Engine::new(BackendProxy::new(Box::new(EchoBridge::new(Category::Latency, 0)))).unwrap();
            let token = engine.describe(0, &[]).unwrap();
            let benchmark = engine.create(token).unwrap();
            let mut dataset = dataset_for(vec![7]);
            dataset.outputs[0][0][0] = Element::Int64(999);

            let (_log, outcome) = run(&benchmark, &dataset, 0, 0.05, true);
            assert!(matches!(outcome, Outcome::ValidationFailed { .. }));
            benchmark.destroy().unwrap();
        }

        #[test]
        fn a_failing_operate_call_still_leaves_every_handle_destroyed() {
            let bridge = EchoBridge::new(Category::Latency, 0);
            bridge.fail_after_operates.set(Some(0));
            let engine = Engine::new(BackendProxy::new(Box::new(bridge))).unwrap();
            let token = engine.describe(0, &[]).unwrap();
            let benchmark = engine.create(token).unwrap();
            let dataset = dataset_for(vec![7]);

            // No panic means every acquired handle reached `destroy_handle`
            // exactly once; `EchoBridge::destroy_handle` never panics, and
            // `Handle::drop` would panic on a leak.
            let (_log, outcome) = run(&benchmark, &dataset, 0, 0.05, true);
            assert!(matches!(outcome, Outcome::Failed(_)));
            benchmark.destroy().unwrap();
        }
    }
}
