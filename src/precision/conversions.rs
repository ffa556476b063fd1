//! Precision conversion helpers.

use ndarray::Array1;

use super::Precision;

/// Convert f32 to fp16 bits (IEEE half precision, round to nearest even)
pub fn f32_to_fp16(value: f32) -> u16 {
    half::f16::from_f32(value).to_bits()
}

/// Convert fp16 bits to f32
pub fn fp16_to_f32(value: u16) -> f32 {
    half::f16::from_bits(value).to_f32()
}

/// Convert f32 to bf16 bits
pub fn f32_to_bf16(value: f32) -> u16 {
    half::bf16::from_f32(value).to_bits()
}

/// Convert bf16 bits to f32
pub fn bf16_to_f32(value: u16) -> f32 {
    half::bf16::from_bits(value).to_f32()
}

/// Round a value to the nearest one representable in `precision`
///
/// Cast down then back up. Identity for fp32; NaN and ±Inf pass through
/// unchanged in the 16-bit formats.
pub fn quantize(value: f32, precision: Precision) -> f32 {
    match precision {
        Precision::Fp32 => value,
        Precision::Fp16 => fp16_to_f32(f32_to_fp16(value)),
        Precision::Bf16 => bf16_to_f32(f32_to_bf16(value)),
    }
}

/// Round every element of an array to the precision grid, in place
pub fn quantize_array(values: &mut Array1<f32>, precision: Precision) {
    if precision.is_reduced() {
        values.mapv_inplace(|v| quantize(v, precision));
    }
}
