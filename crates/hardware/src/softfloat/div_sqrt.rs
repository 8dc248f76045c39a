//! Divide and square root.
//!
//! Both operations share an SRT radix-4 digit recurrence that produces 24
//! significand bits, two per iteration, with quotient digits in
//! {-2, -1, 0, 1, 2} chosen by a threshold table indexed by the top bits of
//! the partial remainder. Divide normalizes the dividend below the divisor
//! first; square root normalizes the radicand by exponent parity and seeds
//! the quotient accordingly. The nonzero final remainder feeds the sticky
//! bit so rounding and the NX flag are exact.

use super::rounding::{Fflags, RoundingMode};
use super::{
    exponent, is_inf, is_nan, is_zero, mantissa, sign, CANONICAL_QNAN, NEG_INF, POS_INF, SIGN_BIT,
};

/// Quotient digit selection for one radix-4 step.
///
/// `top` is the truncated divisor (or partial result for sqrt) window and
/// `rem` the sign-extended top six bits of the partial remainder.
#[inline]
fn select_digit(top: u32, rem: i32) -> i32 {
    let th12 = if top < 1 {
        6
    } else if top < 2 {
        7
    } else if top < 4 {
        8
    } else if top < 5 {
        9
    } else if top < 6 {
        10
    } else {
        11
    };
    let th01 = if top < 2 {
        2
    } else if top < 6 {
        3
    } else {
        4
    };
    if rem < -th12 {
        -2
    } else if rem < -th01 {
        -1
    } else if rem < th01 {
        0
    } else if rem < th12 {
        1
    } else {
        2
    }
}

/// Shared SRT-4 recurrence core for divide and square root.
///
/// Inputs are the already-validated operands (no NaN/inf/zero special cases
/// remain). Returns the 26-bit quotient (implicit bit at 24, one guard
/// position) and the final remainder for the sticky decision.
fn srt4_loop(
    is_sqrt: bool,
    a_exp_val: i32,
    a_man_val: u32,
    b_man_val: u32,
    dividend_normalize: bool,
) -> (u32, i32) {
    let counter: i32 = if is_sqrt { 22 } else { 24 };
    let mut remainder: i32 = if is_sqrt {
        if a_exp_val & 1 != 0 {
            (a_man_val << 1).wrapping_sub(0x01E4_0000) as i32
        } else {
            (a_man_val << 2).wrapping_sub(0x0240_0000) as i32
        }
    } else if dividend_normalize {
        (a_man_val << 1) as i32
    } else {
        a_man_val as i32
    };
    let mut quotient: u32 = if is_sqrt {
        if a_exp_val & 1 != 0 {
            0x0160_0000
        } else {
            0x0180_0000
        }
    } else {
        0
    };

    let mut i = counter;
    while i >= 0 {
        let top = if is_sqrt {
            (((quotient >> 25) & 0x1) << 3) | ((quotient >> 21) & 0x7)
        } else {
            (b_man_val >> 20) & 0x7
        };
        let mut rem_top = ((remainder >> 21) & 0x3F) as i32;
        if rem_top & 0x20 != 0 {
            rem_top |= !0x3F;
        }
        let q = select_digit(top, rem_top);
        remainder = match q {
            2 => {
                if is_sqrt {
                    (remainder << 2)
                        .wrapping_sub((quotient << 2) as i32)
                        .wrapping_sub(4 << i)
                } else {
                    (remainder << 2).wrapping_sub((b_man_val << 3) as i32)
                }
            }
            1 => {
                if is_sqrt {
                    (remainder << 2)
                        .wrapping_sub((quotient << 1) as i32)
                        .wrapping_sub(1 << i)
                } else {
                    (remainder << 2).wrapping_sub((b_man_val << 2) as i32)
                }
            }
            -1 => {
                if is_sqrt {
                    (remainder << 2)
                        .wrapping_add((quotient << 1) as i32)
                        .wrapping_sub(1 << i)
                } else {
                    (remainder << 2).wrapping_add((b_man_val << 2) as i32)
                }
            }
            -2 => {
                if is_sqrt {
                    (remainder << 2)
                        .wrapping_add((quotient << 2) as i32)
                        .wrapping_sub(4 << i)
                } else {
                    (remainder << 2).wrapping_add((b_man_val << 3) as i32)
                }
            }
            _ => remainder << 2,
        };
        quotient = quotient.wrapping_add((q as u32).wrapping_shl(i as u32));
        i -= 2;
    }
    (quotient, remainder)
}

/// Divide or square root with rounding and flags; shared back end.
fn fdiv_fsqrt(a: u32, b: u32, rm: RoundingMode, is_sqrt: bool) -> (u32, Fflags) {
    let mut flags = Fflags::NONE;

    // A subnormal operand is renormalized: the implicit bit moves to
    // position 23 and the exponent value goes negative accordingly.
    let decompose = |x: u32| {
        let e = exponent(x);
        let m = mantissa(x);
        if e == 0 {
            (9 - m.leading_zeros() as i32, m.wrapping_shl(m.leading_zeros() - 8))
        } else {
            (e as i32, 0x0080_0000 | m)
        }
    };

    let a_sign = sign(a);
    let (a_exp_val, a_man_val) = decompose(a);
    let a_zero = is_zero(a);
    let a_inf = is_inf(a);
    let a_nan = is_nan(a);
    let a_neg = a_sign != 0 && a != SIGN_BIT;

    let b_sign = sign(b);
    let (b_exp_val, b_man_val) = decompose(b);
    let b_zero = is_zero(b);
    let b_inf = is_inf(b);
    let b_nan = is_nan(b);

    // Invalid operations come first: NaN operands, 0/0, inf/inf, and the
    // square root of a negative number.
    let result_is_nan = if is_sqrt {
        a_nan || a_neg
    } else {
        a_nan || b_nan || (a_zero && b_zero) || (a_inf && b_inf)
    };
    if result_is_nan {
        flags |= Fflags::NV;
        return (CANONICAL_QNAN, flags);
    }

    let result_sign = !is_sqrt && (a_sign ^ b_sign) != 0;
    if is_sqrt {
        if a_inf {
            return (POS_INF, flags);
        }
        if a_zero {
            // sqrt(±0) = ±0.
            return (if a_sign != 0 { SIGN_BIT } else { 0 }, flags);
        }
    } else {
        if b_zero {
            // Divide by zero with a finite nonzero dividend.
            if !a_inf {
                flags |= Fflags::DZ;
            }
            return (if result_sign { NEG_INF } else { POS_INF }, flags);
        }
        if a_inf {
            return (if result_sign { NEG_INF } else { POS_INF }, flags);
        }
        if a_zero || b_inf {
            return (if result_sign { SIGN_BIT } else { 0 }, flags);
        }
    }

    let dividend_normalize = !is_sqrt && a_man_val < b_man_val;
    let virtual_exponent = a_exp_val - b_exp_val + 127 - i32::from(dividend_normalize);
    let subnormal = !is_sqrt && virtual_exponent <= 0;

    let (quotient, remainder) = srt4_loop(is_sqrt, a_exp_val, a_man_val, b_man_val, dividend_normalize);

    // Assemble the pre-rounding significand with the result LSB at bit 25,
    // guard at 24, and the tail below. Subnormal results keep the implicit
    // bit and denormalize by the exponent deficit; bits pushed off the end
    // fold into sticky.
    let q24 = u64::from(quotient & 0x00FF_FFFF);
    let (before_round, under_sticky) = if subnormal {
        let full = (0x0100_0000u64 | q24) << 24;
        let shift = (1 - virtual_exponent) as u32;
        if shift >= 64 {
            (0, full != 0)
        } else {
            (full >> shift, full & ((1u64 << shift) - 1) != 0)
        }
    } else {
        (q24 << 24, false)
    };

    let lsb = (before_round >> 25) & 1 != 0;
    let guard = (before_round >> 24) & 1 != 0;
    let sticky = (before_round & 0x00FF_FFFF) != 0 || remainder != 0 || under_sticky;

    let roundup = match rm {
        RoundingMode::Rne => {
            // A negative final remainder means the developed quotient
            // overshot; the guard alone is then not a true half.
            guard
                && ((lsb && !sticky)
                    || (before_round & 0x00FF_FFFF) != 0
                    || remainder > 0
                    || under_sticky)
        }
        RoundingMode::Rtz => false,
        RoundingMode::Rdn => (guard || sticky) && result_sign,
        RoundingMode::Rup => (guard || sticky) && !result_sign,
        RoundingMode::Rmm => guard,
    };
    let inexact = guard || sticky;

    let pre_mantissa = ((before_round >> 25) as u32) & 0x007F_FFFF;
    let expinc = i32::from(roundup && pre_mantissa == 0x007F_FFFF);
    let result_mantissa = (pre_mantissa + u32::from(roundup)) & 0x007F_FFFF;
    let result_exponent = if is_sqrt {
        (a_exp_val >> 1) + (a_exp_val & 1) + 63 + expinc
    } else if subnormal {
        i32::from(roundup && pre_mantissa == 0x007F_FFFF)
    } else {
        virtual_exponent + expinc
    };

    let sign_bit = u32::from(result_sign) << 31;
    if !is_sqrt && (virtual_exponent > 255 || result_exponent >= 255) {
        // Exponent overflow: infinity, or the largest finite magnitude in
        // the modes that round toward zero on this sign.
        flags |= Fflags::OF | Fflags::NX;
        return (sign_bit | super::fma::overflow_magnitude(result_sign, rm), flags);
    }
    if inexact {
        flags |= Fflags::NX;
        if subnormal {
            flags |= Fflags::UF;
        }
    }
    (
        sign_bit | (((result_exponent as u32) & 0xFF) << 23) | result_mantissa,
        flags,
    )
}

/// Single-precision divide: correctly rounded `a / b` with accrued flags.
pub fn fdiv(a: u32, b: u32, rm: RoundingMode) -> (u32, Fflags) {
    fdiv_fsqrt(a, b, rm, false)
}

/// Single-precision square root: correctly rounded `sqrt(a)` with accrued flags.
pub fn fsqrt(a: u32, rm: RoundingMode) -> (u32, Fflags) {
    fdiv_fsqrt(a, 0, rm, true)
}
