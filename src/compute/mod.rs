//! Pure derived-value computations.
//!
//! Everything here is a deterministic function of an immutable input value:
//! deal monetary figures ([`deal`]) and milling yield breakdowns ([`milling`]).

pub mod deal;
pub mod milling;

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::FieldError;

pub use deal::{compute_deal, DealDraft, DealFigures, DealInputs, PayableRule};
pub use milling::{
    MillingYieldCalculator, OverstatedPolicy, YieldBreakdown, YieldInputs, YieldWarning,
};

pub(crate) const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round a monetary value to 2 dp, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplication that saturates instead of panicking on overflow.
pub(crate) fn mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or(if a.is_sign_negative() != b.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

/// Parse a form field into a decimal.
///
/// Blank input is `None` (callers treat it as zero). Thousands separators are
/// accepted (`2,50,000`); anything else non-numeric is a field error.
pub fn parse_decimal_field(field: &str, raw: &str) -> Result<Option<Decimal>, FieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .map(Some)
        .map_err(|_| FieldError::new(field, format!("'{}' is not a number", trimmed)))
}
