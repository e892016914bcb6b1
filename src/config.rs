//! Reads and writes the YAML run configuration that selects which
//! registered benchmarks to run and overrides their workload parameters and
//! sample sizes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::HarnessError;
use crate::workload::{ParamValue, WorkloadParameter};

/// One entry of the YAML `benchmarks` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    /// Index into the Engine's descriptor table.
    pub descriptor_index: usize,
    /// Workload-parameter overrides, as `name: value` pairs.
    #[serde(default)]
    pub params: Vec<YamlParam>,
    /// Per-operation-parameter sample-count overrides.
    #[serde(default)]
    pub sample_sizes: Vec<u64>,
    /// Optional CSV dataset to load instead of generating one.
    #[serde(default)]
    pub dataset: Option<String>,
    /// Latency-only override of `min_test_time_ms`.
    #[serde(default)]
    pub min_test_time_ms_override: Option<u64>,
    /// Per-benchmark seed override; falls back to the run-level seed.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Whether an entry in `sample_sizes` is authoritative even when it is
    /// `0` (normally a `0` entry is treated as unset and falls through to
    /// the backend/workload/fallback chain).
    #[serde(default)]
    pub force_config: bool,
}

/// One `name: value` pair in a YAML benchmark entry's `params` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamlParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value, as written in YAML (an integer or a float).
    pub value: YamlParamValue,
}

/// A workload-parameter value as it appears in YAML: untagged, so
/// `value: 4` and `value: 2.5` both parse without an explicit type tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YamlParamValue {
    /// An integral value.
    Int(i64),
    /// A fractional value.
    Float(f64),
}

impl From<YamlParamValue> for ParamValue {
    fn from(value: YamlParamValue) -> Self {
        match value {
            YamlParamValue::Int(v) if v >= 0 => ParamValue::UInt64(v as u64),
            YamlParamValue::Int(v) => ParamValue::Int64(v),
            YamlParamValue::Float(v) => ParamValue::Float64(v),
        }
    }
}

/// Top-level YAML run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Process-wide random seed; `None` means "use wall-clock time".
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Default `min_test_time_ms` for Latency benchmarks that don't override it.
    #[serde(default)]
    pub default_min_test_time: Option<u64>,
    /// Default per-parameter sample counts used when neither the backend nor
    /// a benchmark entry supplies one.
    #[serde(default)]
    pub default_sample_sizes: Vec<u64>,
    /// Whether a malformed CSV dataset row is a hard failure (`true`, the
    /// default) or a logged skip.
    #[serde(default = "default_strict_datasets")]
    pub strict_datasets: bool,
    /// Byte budget capping one benchmark's in-memory `Dataset`. `None` means
    /// unbounded.
    #[serde(default)]
    pub max_loaded_size: Option<u64>,
    /// The benchmarks to run, in order.
    pub benchmarks: Vec<BenchmarkEntry>,
}

fn default_strict_datasets() -> bool {
    true
}

/// A fully resolved request for one benchmark run, produced by
/// [`RunConfig::into_requests`].
#[derive(Debug, Clone)]
pub struct BenchmarkRequest {
    /// Index into the Engine's descriptor table.
    pub descriptor_index: usize,
    /// Workload-parameter overrides.
    pub workload_params: Vec<WorkloadParameter>,
    /// Per-operation-parameter sample-count overrides.
    pub per_parameter_sample_counts: Vec<u64>,
    /// Optional CSV dataset path to load instead of generating one.
    pub dataset_filename: Option<String>,
    /// Latency-only override of `min_test_time_ms`.
    pub min_test_time_ms_override: Option<u64>,
    /// Per-benchmark seed override.
    pub random_seed: Option<u64>,
    /// Whether a `0` entry in `per_parameter_sample_counts` is authoritative
    /// rather than falling through to the backend/workload/fallback chain.
    pub force_config: bool,
    /// Byte budget capping this benchmark's `Dataset`, inherited from the
    /// run configuration's `max_loaded_size`.
    pub max_loaded_size: Option<u64>,
}

impl RunConfig {
    /// Parses a YAML run configuration from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|err| HarnessError::ConfigError {
            location: path.display().to_string(),
            reason: err.to_string(),
        })
    }

    /// Writes this configuration to `path` as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        let text = serde_yaml::to_string(self).map_err(|err| HarnessError::ConfigError {
            location: path.display().to_string(),
            reason: err.to_string(),
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Builds the default configuration implied by `engine`'s registered
    /// benchmarks and each matched workload's own defaults.
    pub fn dump_default(engine: &Engine) -> Result<Self, HarnessError> {
        let mut benchmarks = Vec::with_capacity(engine.count());
        for index in 0..engine.count() {
            let token = engine.describe(index, &[])?;
            let params = token
                .workload
                .params
                .iter()
                .map(|p| YamlParam {
                    name: p.name.to_string(),
                    value: match p.value {
                        ParamValue::Int64(v) => YamlParamValue::Int(v),
                        ParamValue::UInt64(v) => YamlParamValue::Int(v as i64),
                        ParamValue::Float64(v) => YamlParamValue::Float(v),
                    },
                })
                .collect();
            benchmarks.push(BenchmarkEntry {
                descriptor_index: index,
                params,
                sample_sizes: token.sample_sizes,
                dataset: None,
                min_test_time_ms_override: None,
                random_seed: None,
                force_config: false,
            });
        }
        Ok(Self {
            random_seed: None,
            default_min_test_time: None,
            default_sample_sizes: Vec::new(),
            strict_datasets: true,
            max_loaded_size: None,
            benchmarks,
        })
    }

    /// Resolves every entry into a [`BenchmarkRequest`], in order.
    pub fn into_requests(self) -> Vec<BenchmarkRequest> {
        let max_loaded_size = self.max_loaded_size;
        self.benchmarks
            .into_iter()
            .map(|entry| BenchmarkRequest {
                descriptor_index: entry.descriptor_index,
                workload_params: entry
                    .params
                    .into_iter()
                    .map(|p| WorkloadParameter {
                        name: Box::leak(p.name.into_boxed_str()),
                        value: p.value.into(),
                    })
                    .collect(),
                per_parameter_sample_counts: entry.sample_sizes,
                dataset_filename: entry.dataset,
                min_test_time_ms_override: entry.min_test_time_ms_override,
                random_seed: entry.random_seed,
                force_config: entry.force_config,
                max_loaded_size,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let config = RunConfig {
            random_seed: Some(42),
            default_min_test_time: Some(500),
            default_sample_sizes: vec![4, 4],
            strict_datasets: true,
            max_loaded_size: Some(1 << 20),
            benchmarks: vec![BenchmarkEntry {
                descriptor_index: 0,
                params: vec![YamlParam {
                    name: "n".to_string(),
                    value: YamlParamValue::Int(8),
                }],
                sample_sizes: vec![8, 8],
                dataset: None,
                min_test_time_ms_override: None,
                random_seed: None,
                force_config: true,
            }],
        };
        let text = serde_yaml::to_string(&config).unwrap();
        let parsed: RunConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed.random_seed, Some(42));
        assert_eq!(parsed.benchmarks.len(), 1);
        assert!(parsed.benchmarks[0].force_config);
    }

    #[test]
    fn dump_default_matches_engine_catalogue() {
        use crate::bridge::mock::MockBridge;
        use crate::bridge::BackendProxy;

        let engine = Engine::new(BackendProxy::new(Box::new(MockBridge::new()))).unwrap();
        let config = RunConfig::dump_default(&engine).unwrap();
        assert_eq!(config.benchmarks.len(), engine.count());
    }
}
