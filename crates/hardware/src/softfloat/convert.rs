//! Conversions between 32-bit words and single-precision values.
//!
//! Float-to-word shifts the significand (with its shadow bit) into a 64-bit
//! frame whose integer part sits at bits 63:32, so guard/round/sticky fall
//! out of the low half for rounding; out-of-range values clip to the type
//! limits and raise invalid. Word-to-float normalizes the absolute value by
//! leading-zero count and rounds the 8-bit tail.

use super::rounding::{is_inexact, round_increment, Fflags, RoundingMode};
use super::{exponent, is_nan, mantissa, sign};

/// FCVT.W.S / FCVT.WU.S: single-precision to signed or unsigned word.
pub fn fcvt_w_s(a: u32, rm: RoundingMode, unsigned: bool) -> (u32, Fflags) {
    let mut flags = Fflags::NONE;
    let negative = sign(a) != 0;
    let exp = exponent(a);
    let man = mantissa(a);
    let nan = is_nan(a);

    // The significand with its shadow bit, left-aligned within 32 bits.
    let man_val = (0x0080_0000 | man) << 8;

    // exponent 158 (e = 31): integer part needs all 32 bits (shift 0).
    // exponent above that (shift < 0): magnitude exceeds any word.
    let shift = (127 + 31) - exp as i32;
    let shifted: u64 = if shift < 0 {
        0
    } else if shift >= 64 {
        u64::from(man_val != 0)
    } else {
        (u64::from(man_val) << 32) >> shift
    };

    let integer_part: u32 = if shift == 0 {
        if unsigned {
            if negative { 0 } else { (shifted >> 32) as u32 }
        } else if negative {
            0x8000_0000
        } else {
            0x7FFF_FFFF
        }
    } else if shift < 0 {
        if unsigned {
            if !nan && negative { 0 } else { 0xFFFF_FFFF }
        } else if !nan && negative {
            0x8000_0000
        } else {
            0x7FFF_FFFF
        }
    } else {
        (shifted >> 32) as u32
    };

    let roundup = round_increment(shifted, negative, rm);
    let result = if shift < 1 {
        integer_part
    } else {
        let magnitude = integer_part.wrapping_add(roundup);
        if negative && unsigned {
            0
        } else if negative {
            magnitude.wrapping_neg()
        } else {
            magnitude
        }
    };

    let overflow = shift < 0
        || (!unsigned && shift == 0 && (!negative || man != 0))
        || (unsigned && negative && (shift <= 31 || roundup != 0));
    if overflow {
        flags |= Fflags::NV;
    } else if is_inexact(shifted) {
        flags |= Fflags::NX;
    }
    (result, flags)
}

/// FCVT.S.W / FCVT.S.WU: signed or unsigned word to single precision.
pub fn fcvt_s_w(a: u32, rm: RoundingMode, unsigned: bool) -> (u32, Fflags) {
    let mut flags = Fflags::NONE;
    let negative = !unsigned && (a & 0x8000_0000) != 0;
    let abs = if negative { a.wrapping_neg() } else { a };
    let lz = abs.leading_zeros();

    if abs == 0 {
        return (0, flags);
    }

    // Normalize so the leading one sits at bit 31; the 23 mantissa bits
    // follow at 30:8 and bits 7:0 are the rounding tail.
    let normalized = abs << lz;
    let frame = u64::from(normalized) << 24;
    let man = (normalized >> 8) & 0x007F_FFFF;
    let exp = (31 - lz) + 127;

    let roundup = round_increment(frame, negative, rm);
    let expinc = u32::from(roundup == 1 && man == 0x007F_FFFF);
    let result_man = (man + roundup) & 0x007F_FFFF;
    let result_exp = exp + expinc;

    if is_inexact(frame) {
        flags |= Fflags::NX;
    }
    (
        (u32::from(negative) << 31) | (result_exp << 23) | result_man,
        flags,
    )
}
