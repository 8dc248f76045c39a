//! Fused multiply-add.
//!
//! Computes `a * b + c` with a single rounding. The product of the two
//! 24-bit significands is formed exactly in a 128-bit integer; the addend is
//! aligned into the same fixed-point frame (two's-complement sign at bit 76,
//! product scale 2^49) with a sticky bit for everything shifted past 26
//! fractional bits. After the add/subtract the result is normalized by
//! leading-zero count, reduced to 24 significand bits with guard and sticky
//! extracted from the shifted-out tail, and rounded.
//!
//! FADD/FSUB/FMUL are this same operation with 1.0 or +0.0 substituted for
//! the absent operand, and the NMADD/MSUB/NMSUB variants are sign flips on
//! the inputs; the execute stage performs those substitutions.

use super::rounding::{Fflags, RoundingMode};
use super::{exponent, is_inf, is_nan, is_zero, mantissa, sign, CANONICAL_QNAN, SIGN_BIT};

/// Position of the two's-complement sign bit in the fixed-point frame.
const FRAME_SIGN_BIT: i32 = 76;

/// Shifts `x` right by `shamt`, shifting left for negative amounts.
/// Shifts of 128 or more in either direction produce zero.
#[inline]
fn shr_wide(x: u128, shamt: i32) -> u128 {
    if shamt >= 128 || shamt <= -128 {
        0
    } else if shamt >= 0 {
        x >> shamt
    } else {
        x << -shamt
    }
}

/// Magnitude bits an overflow rounds to: the infinity encoding, or the
/// largest finite magnitude when the mode rounds toward zero on this sign.
pub(super) fn overflow_magnitude(negative: bool, rm: RoundingMode) -> u32 {
    const INF: u32 = 0xFF << 23;
    const MAX_FINITE: u32 = 0x7F7F_FFFF;
    match rm {
        RoundingMode::Rne | RoundingMode::Rmm => INF,
        RoundingMode::Rtz => MAX_FINITE,
        RoundingMode::Rdn => {
            if negative {
                INF
            } else {
                MAX_FINITE
            }
        }
        RoundingMode::Rup => {
            if negative {
                MAX_FINITE
            } else {
                INF
            }
        }
    }
}

/// Neighbor of a finite value toward positive infinity, on the bit level.
#[inline]
fn next_up(x: u32) -> u32 {
    if x == SIGN_BIT {
        // -0 steps to the smallest positive subnormal.
        1
    } else if x & SIGN_BIT == 0 {
        x + 1
    } else {
        x - 1
    }
}

/// Neighbor of a finite value toward negative infinity, on the bit level.
#[inline]
fn next_down(x: u32) -> u32 {
    if x == 0 {
        SIGN_BIT | 1
    } else if x & SIGN_BIT == 0 {
        x - 1
    } else {
        x + 1
    }
}

/// Fused multiply-add: correctly rounded `a * b + c` with accrued flags.
pub fn fmadd(a: u32, b: u32, c: u32, rm: RoundingMode) -> (u32, Fflags) {
    let mut flags = Fflags::NONE;

    let a_sign = sign(a);
    let b_sign = sign(b);
    let c_sign = sign(c);
    let a_exp = exponent(a);
    let b_exp = exponent(b);
    let c_exp = exponent(c);
    let a_man = mantissa(a);
    let b_man = mantissa(b);
    let c_man = mantissa(c);
    let is_subtract = (a_sign ^ b_sign ^ c_sign) != 0;

    let a_zero = is_zero(a);
    let b_zero = is_zero(b);
    let c_zero = is_zero(c);
    let a_inf = is_inf(a);
    let b_inf = is_inf(b);
    let c_inf = is_inf(c);

    // 0 * inf, inf - inf, and any NaN input all produce the canonical quiet
    // NaN and signal invalid.
    let result_is_nan = is_nan(a)
        || is_nan(b)
        || is_nan(c)
        || (a_zero && b_inf)
        || (a_inf && b_zero)
        || (is_subtract && (a_inf || b_inf) && c_inf);
    let result_is_inf = a_inf || b_inf || c_inf;
    let mul_sign = a_sign ^ b_sign;

    if result_is_nan {
        flags |= Fflags::NV;
        return (CANONICAL_QNAN, flags);
    }
    if result_is_inf {
        let result = if c_inf {
            (c_sign << 31) | (0xFF << 23)
        } else {
            (mul_sign << 31) | (0xFF << 23)
        };
        return (result, flags);
    }

    // Subnormal operands use exponent value 1 without the implicit bit;
    // zeros contribute an empty significand.
    let exp_val = |e: u32| if e == 0 { 1 } else { e as i32 };
    let man_val = |e: u32, m: u32| if e == 0 { m } else { 0x0080_0000 | m };
    let a_ev = exp_val(a_exp);
    let b_ev = exp_val(b_exp);
    let c_ev = exp_val(c_exp);
    let a_mv = man_val(a_exp, a_man);
    let b_mv = man_val(b_exp, b_man);
    let c_mv = man_val(c_exp, c_man);

    let mul_exp = a_ev + b_ev - 127;
    let addend_shamt = c_ev - mul_exp + 23;

    // Product more than 2^26 below the addend's scale (or exactly zero): the
    // sum rounds to the addend, nudged one ulp for the directed modes.
    if (addend_shamt > 49 || a_zero || b_zero) && !c_zero {
        if a_zero || b_zero {
            return (c, flags);
        }
        flags |= Fflags::NX;
        let result = match rm {
            RoundingMode::Rne | RoundingMode::Rmm => c,
            // The dropped product opposes the addend when the effective signs
            // differ, pulling the magnitude down one step.
            RoundingMode::Rtz => {
                if is_subtract {
                    c - 1
                } else {
                    c
                }
            }
            RoundingMode::Rdn => {
                if mul_sign == 0 {
                    c
                } else {
                    next_down(c)
                }
            }
            RoundingMode::Rup => {
                if mul_sign == 0 {
                    next_up(c)
                } else {
                    c
                }
            }
        };
        return (result, flags);
    }

    let addend_sticky = if addend_shamt >= 0 {
        0u128
    } else if addend_shamt < -26 {
        u128::from(c_mv != 0)
    } else {
        u128::from(c_mv.wrapping_shl((26 + addend_shamt) as u32) != 0)
    };

    let mul_lhs = u128::from(a_mv) << 2;
    let mul_rhs = u128::from(b_mv) << 1;
    let mut addend = shr_wide(u128::from(c_mv), -51);
    addend = shr_wide(addend, 49 - addend_shamt - 1); // one spare bit for sticky
    addend |= addend_sticky;

    let product = mul_lhs * mul_rhs;
    let sum = if is_subtract {
        product.wrapping_sub(addend)
    } else {
        product.wrapping_add(addend)
    };

    let sum_negative = (sum >> FRAME_SIGN_BIT) & 1 != 0;
    let sum_abs = if sum_negative { sum.wrapping_neg() } else { sum };
    let result_sign = (mul_sign != 0) ^ sum_negative;

    if sum == 0 {
        // Exact cancellation. The zero sign follows the addition of
        // like-signed zeros; otherwise it is positive.
        let result = if !is_subtract && c_sign != 0 {
            SIGN_BIT
        } else {
            0
        };
        return (result, flags);
    }

    let leading_zeros = sum_abs.leading_zeros() as i32 - (128 - FRAME_SIGN_BIT);
    let result_exp_val = mul_exp - leading_zeros + 26;
    let result_is_subnormal = result_exp_val <= 0;
    let shamt = if result_is_subnormal {
        26 - mul_exp
    } else {
        51 - leading_zeros
    };

    let shifted = (shr_wide(sum_abs, shamt) & 0x00FF_FFFF) as u32; // shadow + mantissa + guard
    let lsb = (shifted >> 1) & 1 != 0;
    let guard = shifted & 1 != 0;
    let sticky = if shamt <= 0 {
        false
    } else if shamt >= 128 {
        sum_abs != 0
    } else {
        sum_abs & ((1u128 << shamt) - 1) != 0
    };

    let roundup = match rm {
        RoundingMode::Rne => guard && (lsb || sticky),
        RoundingMode::Rtz => false,
        RoundingMode::Rdn => (guard || sticky) && result_sign,
        RoundingMode::Rup => (guard || sticky) && !result_sign,
        RoundingMode::Rmm => guard,
    };
    let inexact = guard || sticky;
    if inexact {
        flags |= Fflags::NX;
    }

    let pre_mantissa = (shifted >> 1) & 0x007F_FFFF;
    let expinc = i32::from(roundup && pre_mantissa == 0x007F_FFFF);
    let result_mantissa = (pre_mantissa + u32::from(roundup)) & 0x007F_FFFF;
    let sign_bit = u32::from(result_sign) << 31;

    let result = if !result_is_subnormal && result_exp_val + expinc >= 255 {
        // Exponent overflow: infinity in the nearest modes, the largest
        // finite magnitude when the mode rounds away from that infinity.
        flags |= Fflags::OF | Fflags::NX;
        sign_bit | overflow_magnitude(result_sign, rm)
    } else {
        if result_is_subnormal && inexact {
            flags |= Fflags::UF;
        }
        let result_exponent = if result_is_subnormal {
            // A round-up out of the largest subnormal lands on the smallest
            // normal encoding via the mantissa carry.
            u32::from(roundup && pre_mantissa == 0x007F_FFFF)
        } else {
            (result_exp_val + expinc) as u32
        };
        sign_bit | (result_exponent << 23) | result_mantissa
    };
    (result, flags)
}
