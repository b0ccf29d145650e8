//! Decimal arithmetic for formula operators.
//!
//! All arithmetic uses `rust_decimal::Decimal` with checked operations.
//! Division rounds half-up to 10 fractional digits; exponentiation goes
//! through `f64` and back, keeping every digit of the double that fits in a
//! decimal.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::EvalError;

/// Fractional digits kept by division.
pub const DIVISION_SCALE: u32 = 10;

pub fn add(left: Decimal, right: Decimal) -> Result<Decimal, EvalError> {
    left.checked_add(right)
        .ok_or_else(|| EvalError::overflow("addition overflow"))
}

pub fn sub(left: Decimal, right: Decimal) -> Result<Decimal, EvalError> {
    left.checked_sub(right)
        .ok_or_else(|| EvalError::overflow("subtraction overflow"))
}

pub fn mul(left: Decimal, right: Decimal) -> Result<Decimal, EvalError> {
    left.checked_mul(right)
        .ok_or_else(|| EvalError::overflow("multiplication overflow"))
}

/// Divide, rounding half away from zero to [`DIVISION_SCALE`] digits and
/// stripping trailing zeros.
pub fn div(left: Decimal, right: Decimal, expression: &str) -> Result<Decimal, EvalError> {
    if right.is_zero() {
        return Err(EvalError::DivisionByZero {
            expression: expression.to_string(),
        });
    }
    let quotient = left
        .checked_div(right)
        .ok_or_else(|| EvalError::overflow("division overflow"))?;
    Ok(quotient
        .round_dp_with_strategy(DIVISION_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize())
}

pub fn pow(base: Decimal, exponent: Decimal) -> Result<Decimal, EvalError> {
    let (Some(b), Some(e)) = (base.to_f64(), exponent.to_f64()) else {
        return Err(EvalError::overflow("exponentiation operand out of range"));
    };
    let result = b.powf(e);
    if !result.is_finite() {
        return Err(EvalError::overflow(format!(
            "{}^{} is not a finite number",
            base.normalize(),
            exponent.normalize()
        )));
    }
    Decimal::from_f64_retain(result)
        .map(|d| d.normalize())
        .ok_or_else(|| EvalError::overflow("exponentiation overflow"))
}

pub fn neg(value: Decimal) -> Decimal {
    -value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn division_rounds_half_up_at_ten_digits() {
        assert_eq!(div(dec("4"), dec("3.5"), "4/3.5").unwrap(), dec("1.1428571429"));
        assert_eq!(div(dec("2"), dec("3"), "2/3").unwrap(), dec("0.6666666667"));
        assert_eq!(div(dec("-2"), dec("3"), "-2/3").unwrap(), dec("-0.6666666667"));
    }

    #[test]
    fn division_strips_trailing_zeros() {
        let q = div(dec("6"), dec("2"), "6/2").unwrap();
        assert_eq!(q.to_string(), "3");
    }

    #[test]
    fn division_by_zero() {
        let err = div(dec("1"), Decimal::ZERO, "1/0").unwrap_err();
        assert_eq!(err.to_string(), "Division by zero in '1/0'.");
    }

    #[test]
    fn power_uses_double_precision() {
        assert_eq!(pow(dec("2"), dec("10")).unwrap(), dec("1024"));
        assert_eq!(pow(dec("3.5"), dec("2")).unwrap(), dec("12.25"));
        assert_eq!(pow(dec("4"), dec("0.5")).unwrap(), dec("2"));
    }

    #[test]
    fn power_keeps_the_binary_expansion() {
        let p = pow(dec("0.1"), dec("1")).unwrap();
        assert!(p.to_string().starts_with("0.10000000000000000555"), "got {}", p);
    }

    #[test]
    fn power_rejects_non_finite() {
        assert!(pow(dec("-1"), dec("0.5")).is_err());
    }

    #[test]
    fn multiplication_overflow() {
        assert!(mul(Decimal::MAX, dec("2")).is_err());
    }
}
