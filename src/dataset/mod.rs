//! Produces the input samples a benchmark operates over and the
//! ground-truth outputs it is validated against, either by pseudo-random
//! generation with a reproducible seed or by loading a CSV-described
//! dataset from disk.
//!
//! A [`Dataset`] is a ragged three-level array: `inputs[p][s][k]` and
//! `outputs[c][s][k]`, where `p` indexes an operation parameter, `c` an
//! output component, `s` a sample within that parameter/component, and `k`
//! an element of the sample vector.

mod csv_loader;
mod generate;

pub use csv_loader::load_csv;
pub use generate::generate;

use crate::bridge::DataType;
use crate::error::{DatasetErrorKind, HarnessError};
use crate::numeric::Element;

/// Whether malformed dataset rows are a hard failure or a logged skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// A malformed row fails the benchmark with `DatasetError::ParseFailure`.
    Strict,
    /// A malformed row is logged at `warn` and skipped.
    Loose,
}

/// Per-parameter sampling distribution used during generation.
#[derive(Debug, Clone, Copy)]
pub enum Distribution {
    /// Uniform over `[low, high]`.
    Uniform { low: f64, high: f64 },
    /// Normal with the given mean and standard deviation.
    Normal { mean: f64, std_dev: f64 },
}

/// What to generate for one operation parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    /// Number of samples to generate for this parameter.
    pub sample_count: u64,
    /// Length of one sample's element vector.
    pub vector_len: usize,
    /// Distribution to draw elements from.
    pub distribution: Distribution,
    /// Element type to generate.
    pub data_type: DataType,
}

/// Ragged three-level array: `inputs[p][s][k]` or `outputs[c][s][k]`.
pub type RaggedArray = Vec<Vec<Vec<Element>>>;

/// Input samples and reference outputs for one benchmark run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// `inputs[p][s]` is the `s`-th sample vector for operation parameter `p`.
    pub inputs: RaggedArray,
    /// `outputs[c][s]` is the `s`-th reference sample vector for output
    /// component `c`.
    pub outputs: RaggedArray,
}

impl Dataset {
    /// Total bytes all input and output elements would occupy on the wire.
    pub fn byte_size(&self) -> u64 {
        let mut total: u64 = 0;
        for parameter in self.inputs.iter().chain(self.outputs.iter()) {
            for sample in parameter {
                for element in sample {
                    total += element.data_type().element_size() as u64;
                }
            }
        }
        total
    }

    /// Fails with `DatasetError::TooLarge` if [`Dataset::byte_size`] exceeds
    /// `max_loaded_size`.
    pub fn check_budget(&self, max_loaded_size: u64) -> Result<(), HarnessError> {
        let required = self.byte_size();
        if required > max_loaded_size {
            return Err(DatasetErrorKind::TooLarge {
                required,
                budget: max_loaded_size,
            }
            .into());
        }
        Ok(())
    }
}

/// Bookkeeping returned alongside a generated dataset, logged at `debug` but
/// otherwise unused — not part of the dataset's semantic content.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Total bytes allocated across all generated parameters.
    pub bytes_allocated: u64,
    /// Sample count actually generated per operation parameter, in order.
    pub samples_per_parameter: Vec<u64>,
}

/// Linearises a multi-index `(i0, ..., i_{P-1})` over per-parameter sample
/// counts `(c0, ..., c_{P-1})` as `Σ_p i_p · Π_{q>p} c_q`.
pub fn linear_index(indices: &[u64], counts: &[u64]) -> u64 {
    debug_assert_eq!(indices.len(), counts.len());
    let mut linear = 0u64;
    for p in 0..indices.len() {
        let suffix_product: u64 = counts[p + 1..].iter().product();
        linear += indices[p] * suffix_product;
    }
    linear
}

/// Inverse of [`linear_index`]: recovers the multi-index a row-major linear
/// offset corresponds to, given the same per-parameter sample counts.
pub fn delinearize(linear: u64, counts: &[u64]) -> Vec<u64> {
    let mut indices = vec![0u64; counts.len()];
    let mut remainder = linear;
    for p in (0..counts.len()).rev() {
        let extent = counts[p].max(1);
        indices[p] = remainder % extent;
        remainder /= extent;
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_index_matches_row_major_layout() {
        let counts = [2u64, 3u64];
        // (1, 2) -> 1*3 + 2 = 5.
        assert_eq!(linear_index(&[1, 2], &counts), 5);
        assert_eq!(linear_index(&[0, 0], &counts), 0);
        assert_eq!(linear_index(&[1, 2], &counts), counts.iter().product::<u64>() - 1);
    }

    #[test]
    fn delinearize_is_the_exact_inverse_of_linear_index() {
        let counts = [2u64, 3u64, 4u64];
        for a in 0..counts[0] {
            for b in 0..counts[1] {
                for c in 0..counts[2] {
                    let linear = linear_index(&[a, b, c], &counts);
                    assert_eq!(delinearize(linear, &counts), vec![a, b, c]);
                }
            }
        }
    }

    #[test]
    fn budget_check_fails_when_dataset_exceeds_it() {
        let dataset = Dataset {
            inputs: vec![vec![vec![Element::Float64(1.0)]]],
            outputs: vec![],
        };
        assert_eq!(dataset.byte_size(), 8);
        assert!(dataset.check_budget(16).is_ok());
        let err = dataset.check_budget(4).unwrap_err();
        match err {
            HarnessError::DatasetError(DatasetErrorKind::TooLarge { required, budget }) => {
                assert_eq!(required, 8);
                assert_eq!(budget, 4);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }
}
