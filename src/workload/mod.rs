//! Per-workload shape, reference computation, and parameter schema,
//! registered once as data rather than as a class hierarchy.
//!
//! Each [`WorkloadDescriptor`] is a plain struct of function pointers for
//! *match* (does this backend descriptor implement this workload?),
//! *complete-description* (resolve workload parameters against the backend
//! descriptor and run configuration), *default sample sizes*, and
//! *compute-reference* (ground truth from generated or loaded inputs). This
//! crate's [`catalogue::all`] is the concrete registry.

pub mod catalogue;

use crate::bridge::{BenchmarkDescriptor, DataType};
use crate::dataset::{Distribution, RaggedArray};
use crate::error::HarnessError;

/// Canonical identifier for a recognised workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadId {
    /// Componentwise sum of two vectors.
    ElementwiseAdd,
    /// Componentwise product of two vectors.
    ElementwiseMul,
    /// Inner product of two vectors.
    DotProduct,
    /// Dense matrix product.
    MatrixMultiply,
    /// Exact sigmoid logistic regression.
    LogisticRegression,
    /// Logistic regression via a degree-3 odd Taylor truncation of sigmoid.
    LogisticRegressionPolyD3,
    /// Logistic regression via a degree-5 odd Taylor truncation of sigmoid.
    LogisticRegressionPolyD5,
    /// Logistic regression via a degree-7 odd Taylor truncation of sigmoid.
    LogisticRegressionPolyD7,
    /// Multiset intersection of two sets of fixed-dimension items.
    SimpleSetIntersection,
    /// User-defined workload whose reference is supplied via the dataset.
    Generic,
}

/// A tagged, named workload-parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Signed 64-bit parameter (e.g. a polynomial degree).
    Int64(i64),
    /// Unsigned 64-bit parameter (e.g. a vector length).
    UInt64(u64),
    /// Floating-point parameter (e.g. a distribution mean).
    Float64(f64),
}

impl ParamValue {
    /// Interprets the value as a non-negative count, if it is one.
    pub fn as_u64(self) -> Option<u64> {
        match self {
            ParamValue::UInt64(v) => Some(v),
            ParamValue::Int64(v) if v >= 0 => Some(v as u64),
            ParamValue::Float64(v) if v >= 0.0 && v.fract() == 0.0 => Some(v as u64),
            _ => None,
        }
    }

    /// Widens the value to `f64` for arithmetic.
    pub fn as_f64(self) -> f64 {
        match self {
            ParamValue::Int64(v) => v as f64,
            ParamValue::UInt64(v) => v as f64,
            ParamValue::Float64(v) => v,
        }
    }
}

/// One resolved `(name, value)` pair supplied per run.
#[derive(Debug, Clone)]
pub struct WorkloadParameter {
    /// Parameter name, matching a [`WorkloadDescriptor::param_schema`] entry.
    pub name: &'static str,
    /// The resolved value.
    pub value: ParamValue,
}

/// One entry in a workload's parameter schema: a name and a validity
/// constraint, with the tag implicit in which [`ParamValue`] variant the
/// constraint accepts.
#[derive(Clone, Copy)]
pub struct ParamSchemaEntry {
    /// Parameter name.
    pub name: &'static str,
    /// Returns `true` if `value` is an acceptable value for this parameter.
    pub constraint: fn(ParamValue) -> bool,
}

/// A workload after its parameters have been resolved against a concrete
/// backend descriptor and run configuration (produced by
/// [`WorkloadDescriptor::complete_description`], consumed by
/// `Engine::describe`).
#[derive(Debug, Clone)]
pub struct ResolvedWorkload {
    /// Which catalogue entry this is.
    pub id: WorkloadId,
    /// Display name, used in report headers.
    pub name: &'static str,
    /// Element type the benchmark operates over.
    pub data_type: DataType,
    /// Resolved parameter values, in schema order.
    pub params: Vec<WorkloadParameter>,
}

impl ResolvedWorkload {
    /// Looks up a resolved parameter by name.
    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Convenience accessor for a parameter expected to hold a count.
    pub fn count(&self, name: &str) -> Option<u64> {
        self.param(name).and_then(ParamValue::as_u64)
    }
}

/// Registry entry modelling a workload as data rather than a type. Fields
/// are boxed closures rather than bare `fn` pointers because several catalogue
/// entries (the four logistic-regression variants, which share everything
/// but their activation function) are generated by a small factory function
/// that needs to capture that difference.
pub struct WorkloadDescriptor {
    /// Which workload this is.
    pub id: WorkloadId,
    /// Display name.
    pub name: &'static str,
    /// Parameter schema, in the order the Configurator lists values.
    pub param_schema: &'static [ParamSchemaEntry],
    /// Returns `true` if `descriptor` is an instance of this workload.
    pub matches: Box<dyn Fn(&BenchmarkDescriptor) -> bool + Send + Sync>,
    /// Resolves workload parameters from the backend descriptor and any
    /// config overrides already merged into `overrides`.
    pub complete_description: Box<
        dyn Fn(&BenchmarkDescriptor, &[WorkloadParameter]) -> Result<ResolvedWorkload, HarnessError>
            + Send
            + Sync,
    >,
    /// Per-operation-parameter sampling distribution.
    pub param_distributions: Box<dyn Fn(&ResolvedWorkload) -> Vec<Distribution> + Send + Sync>,
    /// Length of one sample's element vector, per operation parameter.
    pub operand_lengths: Box<dyn Fn(&ResolvedWorkload) -> Vec<usize> + Send + Sync>,
    /// Length of one sample's element vector, per output component.
    pub output_lengths: Box<dyn Fn(&ResolvedWorkload) -> Vec<usize> + Send + Sync>,
    /// Default per-parameter sample counts when the config and backend both
    /// omit them (the harness fallback is 5 when even this is absent from a
    /// catalogue entry's own logic).
    pub default_sample_sizes: Box<dyn Fn(&ResolvedWorkload) -> Vec<u64> + Send + Sync>,
    /// Computes ground-truth outputs for the Cartesian product of input
    /// samples, writing `outputs[c][i]` at the row-major linear index.
    pub compute_reference: Box<dyn Fn(&ResolvedWorkload, &RaggedArray) -> RaggedArray + Send + Sync>,
}

/// Finds the catalogue entry matching a backend-declared descriptor, if any
/// (`Engine::describe`'s first step).
pub fn find_match(descriptor: &BenchmarkDescriptor) -> Option<&'static WorkloadDescriptor> {
    catalogue::all().iter().find(|w| (w.matches)(descriptor))
}
