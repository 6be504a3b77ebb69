//! IEEE-754 single precision encoding
//!
//! Field values are decoded from their raw bit layout rather than through a
//! transmute so that NaN payloads collapse to one canonical pattern and
//! overflowing magnitudes saturate to infinity on the way back out.

const SIGN_MASK: u32 = 0x8000_0000;
const EXPONENT_MASK: u32 = 0x7F80_0000;
const MANTISSA_MASK: u32 = 0x007F_FFFF;
const MANTISSA_SCALE: f64 = 8_388_608.0; // 2^23
const EXPONENT_BIAS: i32 = 127;

/// The single quiet-NaN pattern every NaN is written as
pub const CANONICAL_NAN: u32 = 0x7FC0_0000;

/// Decode a little-endian `u32` bit pattern into a float
pub fn decode_f32(bits: u32) -> f32 {
    let negative = bits & SIGN_MASK != 0;
    let exponent = ((bits & EXPONENT_MASK) >> 23) as i32;
    let mantissa = (bits & MANTISSA_MASK) as f64;
    let sign = if negative { -1.0 } else { 1.0 };

    let magnitude = match exponent {
        0xFF if mantissa == 0.0 => f64::INFINITY,
        0xFF => return f32::NAN,
        // Subnormal: no implicit leading one
        0 => mantissa / MANTISSA_SCALE * 2f64.powi(1 - EXPONENT_BIAS),
        _ => (1.0 + mantissa / MANTISSA_SCALE) * 2f64.powi(exponent - EXPONENT_BIAS),
    };

    (sign * magnitude) as f32
}

/// Encode a float into its bit pattern
///
/// Zero keeps its sign, so `-0.0` encodes to `0x8000_0000`.
pub fn encode_f32(value: f32) -> u32 {
    if value.is_nan() {
        return CANONICAL_NAN;
    }

    let sign = if value.is_sign_negative() { SIGN_MASK } else { 0 };
    if value == 0.0 {
        return sign;
    }
    if value.is_infinite() {
        return sign | EXPONENT_MASK;
    }

    let abs = (value as f64).abs();
    let mut exponent = abs.log2().floor() as i32;
    // log2 can land one off near powers of two
    while abs / 2f64.powi(exponent) >= 2.0 {
        exponent += 1;
    }
    while abs / 2f64.powi(exponent) < 1.0 {
        exponent -= 1;
    }

    let biased = exponent + EXPONENT_BIAS;
    if biased >= 0xFF {
        return sign | EXPONENT_MASK;
    }

    if biased <= 0 {
        let mantissa = (abs / 2f64.powi(1 - EXPONENT_BIAS) * MANTISSA_SCALE).round() as u32;
        // A mantissa that rounds up to 2^23 carries into the smallest normal exponent
        return sign | mantissa;
    }

    let mantissa = ((abs / 2f64.powi(exponent) - 1.0) * MANTISSA_SCALE).round() as u32;
    let bits = ((biased as u32) << 23) + mantissa;
    if bits >= EXPONENT_MASK {
        return sign | EXPONENT_MASK;
    }
    sign | bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_matches_native() {
        for bits in [
            0x3F80_0000u32, // 1.0
            0xC020_0000,    // -2.5
            0x4049_0FDB,    // pi
            0x0000_0001,    // smallest subnormal
            0x007F_FFFF,    // largest subnormal
            0x0080_0000,    // smallest normal
            0x7F7F_FFFF,    // f32::MAX
        ] {
            assert_eq!(decode_f32(bits).to_bits(), bits, "bits {:#010x}", bits);
        }
    }

    #[test]
    fn test_decode_specials() {
        assert_eq!(decode_f32(0x7F80_0000), f32::INFINITY);
        assert_eq!(decode_f32(0xFF80_0000), f32::NEG_INFINITY);
        assert!(decode_f32(0x7F80_0001).is_nan());
        assert_eq!(decode_f32(0), 0.0);
    }

    #[test]
    fn test_encode_matches_native() {
        for value in [
            1.0f32,
            -2.5,
            0.1,
            std::f32::consts::PI,
            123_456.79,
            f32::MAX,
            f32::MIN_POSITIVE,
            1.0e-40,
            -f32::from_bits(1),
            0.999_999_94,
        ] {
            assert_eq!(encode_f32(value), value.to_bits(), "value {}", value);
        }
    }

    #[test]
    fn test_encode_specials() {
        assert_eq!(encode_f32(0.0), 0);
        assert_eq!(encode_f32(-0.0), 0x8000_0000);
        assert_eq!(encode_f32(f32::INFINITY), 0x7F80_0000);
        assert_eq!(encode_f32(f32::NEG_INFINITY), 0xFF80_0000);
        assert_eq!(encode_f32(f32::NAN), CANONICAL_NAN);
        assert_eq!(encode_f32(f32::from_bits(0xFFC0_1234)), CANONICAL_NAN);
    }
}
