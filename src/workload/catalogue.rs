//! Concrete catalogue entries, one per recognised workload.

use std::sync::OnceLock;

use super::{ParamSchemaEntry, ParamValue, ResolvedWorkload, WorkloadDescriptor, WorkloadId, WorkloadParameter};
use crate::bridge::BenchmarkDescriptor;
use crate::dataset::{Distribution, RaggedArray};
use crate::error::HarnessError;
use crate::numeric::Element;

/// Raw `workload_id` values a backend uses to name one of these workloads.
/// The harness does not standardise this numbering; it is this crate's own
/// convention for matching a backend descriptor to a catalogue entry.
mod raw_id {
    pub const GENERIC: u32 = 0;
    pub const ELEMENTWISE_ADD: u32 = 1;
    pub const ELEMENTWISE_MUL: u32 = 2;
    pub const DOT_PRODUCT: u32 = 3;
    pub const MATRIX_MULTIPLY: u32 = 4;
    pub const LOGISTIC_REGRESSION: u32 = 5;
    pub const LOGISTIC_REGRESSION_POLY_D3: u32 = 6;
    pub const LOGISTIC_REGRESSION_POLY_D5: u32 = 7;
    pub const LOGISTIC_REGRESSION_POLY_D7: u32 = 8;
    pub const SIMPLE_SET_INTERSECTION: u32 = 9;
}

/// Returns every registered workload, in a stable order.
pub fn all() -> &'static [WorkloadDescriptor] {
    static CATALOGUE: OnceLock<Vec<WorkloadDescriptor>> = OnceLock::new();
    CATALOGUE.get_or_init(|| {
        vec![
            elementwise_add(),
            elementwise_mul(),
            dot_product(),
            matrix_multiply(),
            logistic_regression(
                WorkloadId::LogisticRegression,
                raw_id::LOGISTIC_REGRESSION,
                "LogisticRegression",
                sigmoid_exact,
            ),
            logistic_regression(
                WorkloadId::LogisticRegressionPolyD3,
                raw_id::LOGISTIC_REGRESSION_POLY_D3,
                "LogisticRegression_PolyD3",
                sigmoid_poly_d3,
            ),
            logistic_regression(
                WorkloadId::LogisticRegressionPolyD5,
                raw_id::LOGISTIC_REGRESSION_POLY_D5,
                "LogisticRegression_PolyD5",
                sigmoid_poly_d5,
            ),
            logistic_regression(
                WorkloadId::LogisticRegressionPolyD7,
                raw_id::LOGISTIC_REGRESSION_POLY_D7,
                "LogisticRegression_PolyD7",
                sigmoid_poly_d7,
            ),
            simple_set_intersection(),
            generic(),
        ]
    })
}

fn positive_count(value: ParamValue) -> bool {
    value.as_u64().is_some_and(|n| n > 0)
}

fn non_negative_degree(value: ParamValue) -> bool {
    value.as_u64().is_some()
}

fn resolve_count(
    overrides: &[WorkloadParameter],
    name: &'static str,
    default: u64,
    constraint: fn(ParamValue) -> bool,
) -> Result<WorkloadParameter, HarnessError> {
    let value = overrides
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value)
        .unwrap_or(ParamValue::UInt64(default));
    if !constraint(value) {
        return Err(HarnessError::ConfigError {
            location: format!("workload parameter `{name}`"),
            reason: format!("value {value:?} does not satisfy the parameter's constraint"),
        });
    }
    Ok(WorkloadParameter { name, value })
}

fn elem_add(a: Element, b: Element) -> Element {
    match (a, b) {
        (Element::Int32(x), Element::Int32(y)) => Element::Int32(x + y),
        (Element::Int64(x), Element::Int64(y)) => Element::Int64(x + y),
        (Element::Float32(x), Element::Float32(y)) => Element::Float32(x + y),
        (Element::Float64(x), Element::Float64(y)) => Element::Float64(x + y),
        _ => unreachable!("operands must share a data type"),
    }
}

fn elem_mul(a: Element, b: Element) -> Element {
    match (a, b) {
        (Element::Int32(x), Element::Int32(y)) => Element::Int32(x * y),
        (Element::Int64(x), Element::Int64(y)) => Element::Int64(x * y),
        (Element::Float32(x), Element::Float32(y)) => Element::Float32(x * y),
        (Element::Float64(x), Element::Float64(y)) => Element::Float64(x * y),
        _ => unreachable!("operands must share a data type"),
    }
}

fn zero(data_type: crate::bridge::DataType) -> Element {
    Element::from_f64(0.0, data_type)
}

/// Walks the Cartesian product of `inputs`' per-parameter sample counts and
/// produces one output component whose samples are in row-major linear
/// order.
fn cartesian_reference(
    inputs: &RaggedArray,
    combine: impl Fn(&[&[Element]]) -> Vec<Element>,
) -> RaggedArray {
    let counts: Vec<u64> = inputs.iter().map(|p| p.len() as u64).collect();
    let total: u64 = counts.iter().copied().product();
    let mut samples = Vec::with_capacity(total as usize);
    let mut indices = vec![0u64; inputs.len()];
    for linear in 0..total {
        let mut remaining = linear;
        for p in (0..counts.len()).rev() {
            let c = counts[p];
            indices[p] = remaining % c;
            remaining /= c;
        }
        let refs: Vec<&[Element]> = indices
            .iter()
            .enumerate()
            .map(|(p, &i)| inputs[p][i as usize].as_slice())
            .collect();
        samples.push(combine(&refs));
    }
    vec![samples]
}

fn elementwise_add() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[ParamSchemaEntry {
        name: "n",
        constraint: positive_count,
    }];
    WorkloadDescriptor {
        id: WorkloadId::ElementwiseAdd,
        name: "ElementwiseAdd",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::ELEMENTWISE_ADD),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::ElementwiseAdd,
                name: "ElementwiseAdd",
                data_type: d.data_type,
                params: vec![resolve_count(overrides, "n", 4, positive_count)?],
            })
        }),
        param_distributions: Box::new(|_| vec![Distribution::Uniform { low: -1000.0, high: 1000.0 }; 2]),
        operand_lengths: Box::new(|w| {
            let n = w.count("n").unwrap_or(4) as usize;
            vec![n, n]
        }),
        output_lengths: Box::new(|w| vec![w.count("n").unwrap_or(4) as usize]),
        default_sample_sizes: Box::new(|_| vec![4, 4]),
        compute_reference: Box::new(|_, inputs| {
            cartesian_reference(inputs, |refs| {
                refs[0].iter().zip(refs[1].iter()).map(|(a, b)| elem_add(*a, *b)).collect()
            })
        }),
    }
}

fn elementwise_mul() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[ParamSchemaEntry {
        name: "n",
        constraint: positive_count,
    }];
    WorkloadDescriptor {
        id: WorkloadId::ElementwiseMul,
        name: "ElementwiseMul",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::ELEMENTWISE_MUL),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::ElementwiseMul,
                name: "ElementwiseMul",
                data_type: d.data_type,
                params: vec![resolve_count(overrides, "n", 4, positive_count)?],
            })
        }),
        param_distributions: Box::new(|_| vec![Distribution::Uniform { low: -100.0, high: 100.0 }; 2]),
        operand_lengths: Box::new(|w| {
            let n = w.count("n").unwrap_or(4) as usize;
            vec![n, n]
        }),
        output_lengths: Box::new(|w| vec![w.count("n").unwrap_or(4) as usize]),
        default_sample_sizes: Box::new(|_| vec![4, 4]),
        compute_reference: Box::new(|_, inputs| {
            cartesian_reference(inputs, |refs| {
                refs[0].iter().zip(refs[1].iter()).map(|(a, b)| elem_mul(*a, *b)).collect()
            })
        }),
    }
}

fn dot_product() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[ParamSchemaEntry {
        name: "n",
        constraint: positive_count,
    }];
    WorkloadDescriptor {
        id: WorkloadId::DotProduct,
        name: "DotProduct",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::DOT_PRODUCT),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::DotProduct,
                name: "DotProduct",
                data_type: d.data_type,
                params: vec![resolve_count(overrides, "n", 4, positive_count)?],
            })
        }),
        param_distributions: Box::new(|_| vec![Distribution::Uniform { low: -50.0, high: 50.0 }; 2]),
        operand_lengths: Box::new(|w| {
            let n = w.count("n").unwrap_or(4) as usize;
            vec![n, n]
        }),
        output_lengths: Box::new(|_| vec![1]),
        default_sample_sizes: Box::new(|_| vec![4, 4]),
        compute_reference: Box::new(|w, inputs| {
            let data_type = w.data_type;
            cartesian_reference(inputs, move |refs| {
                let sum = refs[0]
                    .iter()
                    .zip(refs[1].iter())
                    .fold(zero(data_type), |acc, (a, b)| elem_add(acc, elem_mul(*a, *b)));
                vec![sum]
            })
        }),
    }
}

fn matrix_multiply() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[
        ParamSchemaEntry { name: "rows_a", constraint: positive_count },
        ParamSchemaEntry { name: "cols_a", constraint: positive_count },
        ParamSchemaEntry { name: "cols_b", constraint: positive_count },
    ];
    WorkloadDescriptor {
        id: WorkloadId::MatrixMultiply,
        name: "MatrixMultiply",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::MATRIX_MULTIPLY),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::MatrixMultiply,
                name: "MatrixMultiply",
                data_type: d.data_type,
                params: vec![
                    resolve_count(overrides, "rows_a", 4, positive_count)?,
                    resolve_count(overrides, "cols_a", 3, positive_count)?,
                    resolve_count(overrides, "cols_b", 2, positive_count)?,
                ],
            })
        }),
        param_distributions: Box::new(|_| vec![Distribution::Normal { mean: 0.0, std_dev: 1.0 }; 2]),
        operand_lengths: Box::new(|w| {
            let rows_a = w.count("rows_a").unwrap_or(4) as usize;
            let cols_a = w.count("cols_a").unwrap_or(3) as usize;
            let cols_b = w.count("cols_b").unwrap_or(2) as usize;
            vec![rows_a * cols_a, cols_a * cols_b]
        }),
        output_lengths: Box::new(|w| {
            let rows_a = w.count("rows_a").unwrap_or(4) as usize;
            let cols_b = w.count("cols_b").unwrap_or(2) as usize;
            vec![rows_a * cols_b]
        }),
        default_sample_sizes: Box::new(|_| vec![2, 2]),
        compute_reference: Box::new(|w, inputs| {
            let rows_a = w.count("rows_a").unwrap_or(4) as usize;
            let cols_a = w.count("cols_a").unwrap_or(3) as usize;
            let cols_b = w.count("cols_b").unwrap_or(2) as usize;
            let data_type = w.data_type;
            cartesian_reference(inputs, move |refs| {
                let a = refs[0];
                let b = refs[1];
                let mut c = vec![zero(data_type); rows_a * cols_b];
                for i in 0..rows_a {
                    for j in 0..cols_b {
                        let mut acc = zero(data_type);
                        for k in 0..cols_a {
                            acc = elem_add(acc, elem_mul(a[i * cols_a + k], b[k * cols_b + j]));
                        }
                        c[i * cols_b + j] = acc;
                    }
                }
                c
            })
        }),
    }
}

fn sigmoid_exact(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Odd Taylor truncation of the logistic sigmoid around 0, to degree 3/5/7,
/// the usual HE-friendly polynomial approximation (exact sigmoid is not
/// polynomial and so cannot be evaluated homomorphically without bootstrap).
fn sigmoid_poly(x: f64, degree: u32) -> f64 {
    // sigmoid(x) = 1/2 + x/4 - x^3/48 + x^5/480 - x^7/8064 + ...
    let mut result = 0.5 + x / 4.0;
    if degree >= 3 {
        result -= x.powi(3) / 48.0;
    }
    if degree >= 5 {
        result += x.powi(5) / 480.0;
    }
    if degree >= 7 {
        result -= x.powi(7) / 8064.0;
    }
    result
}

fn sigmoid_poly_d3(x: f64) -> f64 {
    sigmoid_poly(x, 3)
}

fn sigmoid_poly_d5(x: f64) -> f64 {
    sigmoid_poly(x, 5)
}

fn sigmoid_poly_d7(x: f64) -> f64 {
    sigmoid_poly(x, 7)
}

fn logistic_regression(
    id: WorkloadId,
    raw_id: u32,
    name: &'static str,
    activation: fn(f64) -> f64,
) -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[ParamSchemaEntry {
        name: "n",
        constraint: positive_count,
    }];
    WorkloadDescriptor {
        id,
        name,
        param_schema: SCHEMA,
        matches: Box::new(move |d| d.workload_id == raw_id),
        complete_description: Box::new(move |d, overrides| {
            Ok(ResolvedWorkload {
                id,
                name,
                data_type: d.data_type,
                params: vec![resolve_count(overrides, "n", 4, positive_count)?],
            })
        }),
        param_distributions: Box::new(|_| {
            vec![
                Distribution::Normal { mean: 0.0, std_dev: 1.0 },
                Distribution::Normal { mean: 0.0, std_dev: 1.0 },
                Distribution::Normal { mean: 0.0, std_dev: 1.0 },
            ]
        }),
        operand_lengths: Box::new(|w| {
            let n = w.count("n").unwrap_or(4) as usize;
            vec![n, 1, n]
        }),
        output_lengths: Box::new(|_| vec![1]),
        // Weights and bias are constant across an Offline batch; only the
        // feature vector varies per sample, so both are pinned to 1 by
        // default, mirroring a real backend's own `data_count` declaration.
        default_sample_sizes: Box::new(|_| vec![1, 1, 4]),
        compute_reference: Box::new(move |w, inputs| {
            let data_type = w.data_type;
            cartesian_reference(inputs, move |refs| {
                let weights = refs[0];
                let bias = refs[1][0].as_f64();
                let features = refs[2];
                let dot: f64 = weights
                    .iter()
                    .zip(features.iter())
                    .map(|(w, x)| w.as_f64() * x.as_f64())
                    .sum();
                vec![Element::from_f64(activation(dot + bias), data_type)]
            })
        }),
    }
}

fn simple_set_intersection() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[
        ParamSchemaEntry { name: "x_count", constraint: positive_count },
        ParamSchemaEntry { name: "y_count", constraint: positive_count },
        ParamSchemaEntry { name: "k", constraint: positive_count },
    ];
    WorkloadDescriptor {
        id: WorkloadId::SimpleSetIntersection,
        name: "SimpleSetIntersection",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::SIMPLE_SET_INTERSECTION),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::SimpleSetIntersection,
                name: "SimpleSetIntersection",
                data_type: d.data_type,
                params: vec![
                    resolve_count(overrides, "x_count", 4, positive_count)?,
                    resolve_count(overrides, "y_count", 4, positive_count)?,
                    resolve_count(overrides, "k", 2, positive_count)?,
                ],
            })
        }),
        param_distributions: Box::new(|_| vec![Distribution::Uniform { low: 0.0, high: 16.0 }; 2]),
        operand_lengths: Box::new(|w| {
            let x_count = w.count("x_count").unwrap_or(4) as usize;
            let y_count = w.count("y_count").unwrap_or(4) as usize;
            let k = w.count("k").unwrap_or(2) as usize;
            vec![x_count * k, y_count * k]
        }),
        output_lengths: Box::new(|w| {
            let x_count = w.count("x_count").unwrap_or(4);
            let y_count = w.count("y_count").unwrap_or(4);
            let k = w.count("k").unwrap_or(2) as usize;
            vec![x_count.min(y_count) as usize * k]
        }),
        default_sample_sizes: Box::new(|_| vec![1, 1]),
        compute_reference: Box::new(|w, inputs| {
            let k = w.count("k").unwrap_or(2) as usize;
            cartesian_reference(inputs, move |refs| {
                let items_x: Vec<&[Element]> = refs[0].chunks(k).collect();
                let items_y: Vec<&[Element]> = refs[1].chunks(k).collect();
                let mut consumed = vec![false; items_y.len()];
                let mut intersection = Vec::new();
                for item_x in &items_x {
                    if let Some(match_idx) = items_y
                        .iter()
                        .enumerate()
                        .position(|(idx, item_y)| !consumed[idx] && item_y == item_x)
                    {
                        consumed[match_idx] = true;
                        intersection.extend_from_slice(item_x);
                    }
                }
                intersection
            })
        }),
    }
}

fn generic() -> WorkloadDescriptor {
    static SCHEMA: &[ParamSchemaEntry] = &[ParamSchemaEntry {
        name: "n_in",
        constraint: non_negative_degree,
    }];
    WorkloadDescriptor {
        id: WorkloadId::Generic,
        name: "Generic",
        param_schema: SCHEMA,
        matches: Box::new(|d| d.workload_id == raw_id::GENERIC),
        complete_description: Box::new(|d, overrides| {
            Ok(ResolvedWorkload {
                id: WorkloadId::Generic,
                name: "Generic",
                data_type: d.data_type,
                params: overrides.to_vec(),
            })
        }),
        param_distributions: Box::new(|_| Vec::new()),
        operand_lengths: Box::new(|_| Vec::new()),
        output_lengths: Box::new(|_| Vec::new()),
        default_sample_sizes: Box::new(|_| Vec::new()),
        // A Generic workload's reference is always supplied by a loaded
        // dataset's own `output` groups, never computed.
        compute_reference: Box::new(|_, _| Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Category, DataType};

    fn descriptor(workload_id: u32, data_type: DataType) -> BenchmarkDescriptor {
        BenchmarkDescriptor {
            workload_id,
            data_type,
            category: Category::Offline,
            warmup_iterations: 0,
            min_test_time_ms: 0,
            offline_sample_count: Vec::new(),
            cipher_param_mask: 0,
            scheme: 0,
            security: 0,
            other: 0,
        }
    }

    #[test]
    fn elementwise_add_matches_and_resolves_default_n() {
        let entry = elementwise_add();
        let d = descriptor(raw_id::ELEMENTWISE_ADD, DataType::Int64);
        assert!((entry.matches)(&d));
        let resolved = (entry.complete_description)(&d, &[]).unwrap();
        assert_eq!(resolved.count("n"), Some(4));
    }

    #[test]
    fn elementwise_mul_offline_indexing_is_row_major() {
        let entry = elementwise_mul();
        let inputs: RaggedArray = vec![
            (0..2)
                .map(|i| vec![Element::Float32(i as f32), Element::Float32(i as f32)])
                .collect(),
            (0..3)
                .map(|i| vec![Element::Float32(i as f32), Element::Float32(i as f32)])
                .collect(),
        ];
        let resolved = ResolvedWorkload {
            id: WorkloadId::ElementwiseMul,
            name: "ElementwiseMul",
            data_type: DataType::Float32,
            params: vec![WorkloadParameter { name: "n", value: ParamValue::UInt64(2) }],
        };
        let outputs = (entry.compute_reference)(&resolved, &inputs);
        assert_eq!(outputs[0].len(), 6);
        // (1, 2) -> 1*3 + 2 = 5.
        assert_eq!(outputs[0][5], vec![Element::Float32(2.0), Element::Float32(2.0)]);
    }

    #[test]
    fn dot_product_is_exact_for_integers() {
        let entry = dot_product();
        let resolved = ResolvedWorkload {
            id: WorkloadId::DotProduct,
            name: "DotProduct",
            data_type: DataType::Int64,
            params: vec![WorkloadParameter { name: "n", value: ParamValue::UInt64(3) }],
        };
        let inputs: RaggedArray = vec![
            vec![vec![Element::Int64(1), Element::Int64(2), Element::Int64(3)]],
            vec![vec![Element::Int64(4), Element::Int64(5), Element::Int64(6)]],
        ];
        let outputs = (entry.compute_reference)(&resolved, &inputs);
        assert_eq!(outputs[0][0], vec![Element::Int64(1 * 4 + 2 * 5 + 3 * 6)]);
    }

    #[test]
    fn matrix_multiply_computes_standard_product() {
        let entry = matrix_multiply();
        let resolved = ResolvedWorkload {
            id: WorkloadId::MatrixMultiply,
            name: "MatrixMultiply",
            data_type: DataType::Float64,
            params: vec![
                WorkloadParameter { name: "rows_a", value: ParamValue::UInt64(2) },
                WorkloadParameter { name: "cols_a", value: ParamValue::UInt64(2) },
                WorkloadParameter { name: "cols_b", value: ParamValue::UInt64(2) },
            ],
        };
        // A = [[1,2],[3,4]], B = [[5,6],[7,8]] -> C = [[19,22],[43,50]]
        let inputs: RaggedArray = vec![
            vec![vec![1.0, 2.0, 3.0, 4.0].into_iter().map(Element::Float64).collect()],
            vec![vec![5.0, 6.0, 7.0, 8.0].into_iter().map(Element::Float64).collect()],
        ];
        let outputs = (entry.compute_reference)(&resolved, &inputs);
        assert_eq!(
            outputs[0][0],
            vec![19.0, 22.0, 43.0, 50.0].into_iter().map(Element::Float64).collect::<Vec<_>>()
        );
    }

    #[test]
    fn simple_set_intersection_matches_common_items() {
        let entry = simple_set_intersection();
        let resolved = ResolvedWorkload {
            id: WorkloadId::SimpleSetIntersection,
            name: "SimpleSetIntersection",
            data_type: DataType::Int32,
            params: vec![WorkloadParameter { name: "k", value: ParamValue::UInt64(1) }],
        };
        let inputs: RaggedArray = vec![
            vec![vec![1, 2, 3].into_iter().map(Element::Int32).collect()],
            vec![vec![2, 3, 4].into_iter().map(Element::Int32).collect()],
        ];
        let outputs = (entry.compute_reference)(&resolved, &inputs);
        assert_eq!(outputs[0][0], vec![Element::Int32(2), Element::Int32(3)]);
    }
}
