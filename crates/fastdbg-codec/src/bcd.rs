//! 6-byte packed BCD floats.
//!
//! Byte 0 holds the sign (bit 7) and a base-100 exponent biased by
//! `0x40`. Bytes 1..6 hold ten decimal digits, two per byte, with the
//! decimal point after the first byte:
//!
//! ```text
//!   40 12 34 00 00 00  =  12.34
//!   41 12 34 00 00 00  =  1234
//!   40 01 23 00 00 00  =  1.23
//!   3F 01 23 00 00 00  =  0.0123
//!   C0 12 34 00 00 00  = -12.34
//! ```
//!
//! Encoding keeps at most ten significant digits; an odd decimal exponent
//! costs one more, so round trips are exact to nine or ten digits.

/// Encoded width of a float.
pub const FLOAT_LEN: usize = 6;

const EXPONENT_BIAS: i32 = 0x40;
const SIGN_BIT: u8 = 0x80;
const MANTISSA_DIGITS: usize = 10;
const LARGEST: [u8; FLOAT_LEN] = [0x7F, 0x99, 0x99, 0x99, 0x99, 0x99];

#[inline(always)]
fn from_bcd(decimal: u8) -> u64 {
    u64::from((decimal >> 4) * 10 + (decimal & 0x0f))
}

#[inline(always)]
fn to_bcd(high: u8, low: u8) -> u8 {
    (high << 4) | low
}

/// Encode a value into the target's float layout.
///
/// Values whose exponent does not fit saturate to the largest magnitude
/// (or flush to zero when too small); NaN encodes as zero.
pub fn encode_float(value: f64) -> [u8; FLOAT_LEN] {
    if value == 0.0 || value.is_nan() {
        return [0; FLOAT_LEN];
    }
    let negative = value.is_sign_negative();
    if value.is_infinite() {
        return saturated(negative);
    }

    // Ten significant digits, e.g. "1.234000000e1".
    let formatted = format!("{:.9e}", value.abs());
    let Some((mantissa, exp)) = formatted.split_once('e') else {
        return [0; FLOAT_LEN];
    };
    let mut digits: Vec<u8> = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    let mut exponent: i32 = exp.parse::<i32>().unwrap_or(0) - 1;

    // Digits are packed in pairs, so the exponent must be even.
    if exponent.rem_euclid(2) != 0 {
        digits.insert(0, 0);
        exponent += 1;
    }
    digits.resize(MANTISSA_DIGITS, 0);

    let half = exponent / 2;
    if half > 0x7F - EXPONENT_BIAS {
        tracing::debug!(value, "float exponent overflow, saturating");
        return saturated(negative);
    }
    if half < -EXPONENT_BIAS {
        tracing::debug!(value, "float exponent underflow, flushing to zero");
        return [0; FLOAT_LEN];
    }

    let mut out = [0u8; FLOAT_LEN];
    out[0] = (EXPONENT_BIAS + half) as u8;
    if negative {
        out[0] |= SIGN_BIT;
    }
    for (slot, pair) in out[1..].iter_mut().zip(digits.chunks(2)) {
        *slot = to_bcd(pair[0], pair[1]);
    }
    out
}

/// Decode the target's float layout.
pub fn decode_float(bytes: &[u8; FLOAT_LEN]) -> f64 {
    let mantissa = bytes[1..].iter().fold(0u64, |acc, &b| acc * 100 + from_bcd(b));
    if mantissa == 0 {
        return 0.0;
    }
    // The mantissa is an integer here, so shift the exponent by the
    // eight digits that sit after the decimal point.
    let exponent = 2 * (i32::from(bytes[0] & !SIGN_BIT) - EXPONENT_BIAS) - 8;
    let sign = if bytes[0] & SIGN_BIT != 0 { "-" } else { "" };

    // Going through decimal text keeps 12.34 as the closest f64 to 12.34.
    format!("{sign}{mantissa}e{exponent}")
        .parse()
        .unwrap_or(0.0)
}

fn saturated(negative: bool) -> [u8; FLOAT_LEN] {
    let mut out = LARGEST;
    if negative {
        out[0] |= SIGN_BIT;
    }
    out
}
