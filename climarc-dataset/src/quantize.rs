//! Linear quantization of temperatures into fixed-width codes.
//!
//! A `w`-bit code spreads `[min, max]` over `2^w - 1` equal steps. Arithmetic
//! runs in `f64` so that 32-bit codes keep their resolution.

use std::cmp::Ordering;

/// Largest code representable in `width` bits (`width` in 1-32).
#[inline]
pub fn max_code(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Map `value` to the nearest `width`-bit code.
///
/// Values outside `[min, max]` are clamped. When `min == max` every value
/// maps to code 0.
pub fn quantize(value: f32, min: f32, max: f32, width: u8) -> u32 {
    if max.partial_cmp(&min) != Some(Ordering::Greater) {
        return 0;
    }
    let value = (value as f64).clamp(min as f64, max as f64);
    let scaled = (value - min as f64) / (max as f64 - min as f64) * max_code(width) as f64;
    scaled.round() as u32
}

/// Reconstruct the value a `width`-bit code stands for.
pub fn dequantize(code: u32, min: f32, max: f32, width: u8) -> f32 {
    let fraction = code as f64 / max_code(width) as f64;
    (fraction * (max as f64 - min as f64) + min as f64) as f32
}

/// Size of one quantization step, the worst-case reconstruction error.
pub fn max_error(min: f32, max: f32, width: u8) -> f32 {
    ((max as f64 - min as f64) / max_code(width) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_code() {
        assert_eq!(max_code(1), 1);
        assert_eq!(max_code(8), 255);
        assert_eq!(max_code(31), 0x7FFF_FFFF);
        assert_eq!(max_code(32), u32::MAX);
    }

    #[test]
    fn test_dequantize_endpoints() {
        assert_eq!(dequantize(0, -10.0, 30.0, 8), -10.0);
        assert_eq!(dequantize(255, -10.0, 30.0, 8), 30.0);
        assert!((dequantize(128, -10.0, 30.0, 8) - 10.078_431).abs() < 1e-4);
        assert_eq!(dequantize(u32::MAX, -1.0, 1.0, 32), 1.0);
    }

    #[test]
    fn test_quantize_rounds_and_clamps() {
        assert_eq!(quantize(-10.0, -10.0, 30.0, 8), 0);
        assert_eq!(quantize(30.0, -10.0, 30.0, 8), 255);
        assert_eq!(quantize(10.0784, -10.0, 30.0, 8), 128);
        assert_eq!(quantize(-50.0, -10.0, 30.0, 8), 0);
        assert_eq!(quantize(99.0, -10.0, 30.0, 8), 255);
        assert_eq!(quantize(f32::NAN, -10.0, 30.0, 8), 0);
    }

    #[test]
    fn test_degenerate_bounds() {
        assert_eq!(quantize(5.0, 5.0, 5.0, 12), 0);
        assert_eq!(dequantize(0, 5.0, 5.0, 12), 5.0);
        assert_eq!(max_error(5.0, 5.0, 12), 0.0);
    }

    #[test]
    fn test_error_bound() {
        let (min, max) = (-42.5f32, 38.25f32);
        for width in [1u8, 2, 3, 5, 8, 12, 16] {
            let bound = max_error(min, max, width) + 1e-4;
            for i in 0..=1000 {
                let x = min + (max - min) * i as f32 / 1000.0;
                let code = quantize(x, min, max, width);
                assert!(code <= max_code(width));
                let back = dequantize(code, min, max, width);
                assert!(
                    (back - x).abs() <= bound,
                    "width {width}: {x} -> {code} -> {back}"
                );
            }
        }
    }
}
