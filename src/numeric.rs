//! A small closed enum of the numeric types a workload can declare, in place
//! of per-type generated code: dispatch on the enum once at the boundary,
//! then operate on typed slices internally.
//!
//! [`Element`] is that enum. Everything that needs to be generic over
//! int32/int64/float32/float64 — dataset generation, wire encoding,
//! arithmetic references, validation — dispatches on it exactly once, at the
//! point the value enters or leaves the harness.

use crate::bridge::DataType;

/// One scalar value of a workload's declared element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element {
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// IEEE-754 single precision.
    Float32(f32),
    /// IEEE-754 double precision.
    Float64(f64),
}

impl Element {
    /// The [`DataType`] tag this value belongs to.
    pub fn data_type(self) -> DataType {
        match self {
            Element::Int32(_) => DataType::Int32,
            Element::Int64(_) => DataType::Int64,
            Element::Float32(_) => DataType::Float32,
            Element::Float64(_) => DataType::Float64,
        }
    }

    /// Widens to `f64` for reference arithmetic. Exact for all integer
    /// magnitudes this harness deals with and for `f32`.
    pub fn as_f64(self) -> f64 {
        match self {
            Element::Int32(v) => f64::from(v),
            Element::Int64(v) => v as f64,
            Element::Float32(v) => f64::from(v),
            Element::Float64(v) => v,
        }
    }

    /// Builds an `Element` of `data_type` from an `f64`, rounding to the
    /// nearest integer for integer types.
    pub fn from_f64(value: f64, data_type: DataType) -> Self {
        match data_type {
            DataType::Int32 => Element::Int32(value.round() as i32),
            DataType::Int64 => Element::Int64(value.round() as i64),
            DataType::Float32 => Element::Float32(value as f32),
            DataType::Float64 => Element::Float64(value),
        }
    }

    /// Little-endian wire encoding, `data_type().element_size()` bytes long.
    pub fn to_le_bytes(self) -> Vec<u8> {
        match self {
            Element::Int32(v) => v.to_le_bytes().to_vec(),
            Element::Int64(v) => v.to_le_bytes().to_vec(),
            Element::Float32(v) => v.to_le_bytes().to_vec(),
            Element::Float64(v) => v.to_le_bytes().to_vec(),
        }
    }

    /// Inverse of [`Element::to_le_bytes`]. `bytes` must be exactly
    /// `data_type.element_size()` long.
    pub fn from_le_bytes(bytes: &[u8], data_type: DataType) -> Self {
        match data_type {
            DataType::Int32 => Element::Int32(i32::from_le_bytes(bytes.try_into().expect(
                "caller guarantees `bytes` is DataType::Int32::element_size() long",
            ))),
            DataType::Int64 => Element::Int64(i64::from_le_bytes(bytes.try_into().expect(
                "caller guarantees `bytes` is DataType::Int64::element_size() long",
            ))),
            DataType::Float32 => Element::Float32(f32::from_le_bytes(bytes.try_into().expect(
                "caller guarantees `bytes` is DataType::Float32::element_size() long",
            ))),
            DataType::Float64 => Element::Float64(f64::from_le_bytes(bytes.try_into().expect(
                "caller guarantees `bytes` is DataType::Float64::element_size() long",
            ))),
        }
    }

    /// Exact equality for integer types, [`almost_equal`] for floats, at the
    /// default 0.05 tolerance. Mixed types never match.
    pub fn matches_reference(self, reference: Element, tolerance: f64) -> bool {
        match (self, reference) {
            (Element::Int32(a), Element::Int32(b)) => a == b,
            (Element::Int64(a), Element::Int64(b)) => a == b,
            (Element::Float32(a), Element::Float32(b)) => {
                almost_equal(f64::from(a), f64::from(b), tolerance)
            }
            (Element::Float64(a), Element::Float64(b)) => almost_equal(a, b, tolerance),
            _ => false,
        }
    }
}

/// `|a-b| / max(|a|,|b|) <= pct`, with the degenerate `a == b == 0` case
/// (including both signs of zero) treated as equal regardless of `pct`.
///
/// Symmetric in `a` and `b` for all finite inputs and `pct >= 0`.
pub fn almost_equal(a: f64, b: f64, pct: f64) -> bool {
    if a == b {
        return true;
    }
    let denominator = a.abs().max(b.abs());
    if denominator == 0.0 {
        return true;
    }
    (a - b).abs() / denominator <= pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn almost_equal_is_symmetric() {
        let cases = [
            (1.0, 1.02, 0.05),
            (1.0, 1.2, 0.05),
            (-1.0, -1.02, 0.05),
            (0.0, 0.0, 0.0),
            (100.0, 95.0, 0.1),
        ];
        for (a, b, pct) in cases {
            assert_eq!(almost_equal(a, b, pct), almost_equal(b, a, pct));
        }
    }

    #[test]
    fn almost_equal_respects_tolerance() {
        assert!(almost_equal(100.0, 104.0, 0.05));
        assert!(!almost_equal(100.0, 110.0, 0.05));
    }

    #[test]
    fn element_round_trips_through_bytes() {
        for element in [
            Element::Int32(-7),
            Element::Int64(42),
            Element::Float32(3.5),
            Element::Float64(-2.25),
        ] {
            let bytes = element.to_le_bytes();
            let back = Element::from_le_bytes(&bytes, element.data_type());
            assert_eq!(back, element);
        }
    }
}
