//! Deal monetary figures.
//!
//! The same formula set serves every commodity and both sides of the book:
//!
//! ```text
//! amount         = quantity × rate
//! gstAmount      = amount × gstPercent / 100
//! totalWithGst   = amount + gstAmount
//! discountAmount = totalWithGst × discountPercent / 100   (sale side only)
//! brokerPayable  = quantity × brokerageRate
//! payableAmount  = totalWithGst − discountAmount
//! ```
//!
//! Each monetary output is rounded to 2 dp once, where it is computed. Every
//! recompute starts again from [`DealInputs`], so editing a field twice never
//! compounds rounding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{mul, parse_decimal_field, round_money, HUNDRED};
use crate::error::{FieldError, ValidationErrors};
use crate::model::DoAllocation;

/// Upper bound on any single quantity or rate accepted from input.
pub const MAX_INPUT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0); // 1e12

/// Raw inputs of a deal. Blank form fields arrive as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealInputs {
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub rate: Decimal,
    #[serde(default)]
    pub gst_percent: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub brokerage_rate: Decimal,
}

/// Derived figures of a deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealFigures {
    pub amount: Decimal,
    pub gst_amount: Decimal,
    pub total_with_gst: Decimal,
    pub discount_amount: Decimal,
    pub broker_payable: Decimal,
    pub payable_amount: Decimal,
}

/// How the payable amount is reached from the GST-inclusive total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayableRule {
    /// Sale side: the discount is taken off the GST-inclusive total.
    NetOfDiscount,
    /// Purchase side: no discount is modelled, payable is the GST-inclusive total.
    GrossWithGst,
}

pub fn compute_deal(inputs: &DealInputs, rule: PayableRule) -> DealFigures {
    if inputs.quantity.is_zero() || inputs.rate.is_zero() {
        return DealFigures::default();
    }

    let amount = round_money(mul(inputs.quantity, inputs.rate));
    let gst_amount = round_money(mul(amount, inputs.gst_percent) / HUNDRED);
    let total_with_gst = amount + gst_amount;
    let discount_amount = match rule {
        PayableRule::NetOfDiscount => {
            round_money(mul(total_with_gst, inputs.discount_percent) / HUNDRED)
        }
        PayableRule::GrossWithGst => Decimal::ZERO,
    };
    let broker_payable = round_money(mul(inputs.quantity, inputs.brokerage_rate));

    DealFigures {
        amount,
        gst_amount,
        total_with_gst,
        discount_amount,
        broker_payable,
        payable_amount: total_with_gst - discount_amount,
    }
}

/// Range rules on deal inputs, checked before submission.
pub fn validate_inputs(inputs: &DealInputs, errors: &mut ValidationErrors) {
    if inputs.quantity <= Decimal::ZERO {
        errors.push("quantity", "must be greater than 0");
    } else if inputs.quantity > MAX_INPUT {
        errors.push("quantity", "is too large");
    }
    if inputs.rate < Decimal::ZERO {
        errors.push("rate", "must not be negative");
    } else if inputs.rate > MAX_INPUT {
        errors.push("rate", "is too large");
    }
    for (field, value) in [
        ("gstPercent", inputs.gst_percent),
        ("discountPercent", inputs.discount_percent),
    ] {
        if value < Decimal::ZERO || value > HUNDRED {
            errors.push(field, "must be between 0 and 100");
        }
    }
    if inputs.brokerage_rate < Decimal::ZERO {
        errors.push("brokerageRate", "must not be negative");
    } else if inputs.brokerage_rate > MAX_INPUT {
        errors.push("brokerageRate", "is too large");
    }
}

pub(crate) const QUANTITY_LOCKED: &str = "is derived from DO allocations and cannot be edited";

/// A deal being edited on a form.
///
/// Every setter replaces one raw input and recomputes all figures from scratch.
/// When the quantity is sourced from DO allocations it is read-only and always
/// equals the sum of the allocated quantities.
#[derive(Debug, Clone)]
pub struct DealDraft {
    rule: PayableRule,
    inputs: DealInputs,
    allocations: Option<Vec<DoAllocation>>,
    figures: DealFigures,
}

impl DealDraft {
    pub fn new(rule: PayableRule) -> Self {
        Self::from_inputs(DealInputs::default(), rule)
    }

    pub fn from_inputs(inputs: DealInputs, rule: PayableRule) -> Self {
        Self {
            rule,
            inputs,
            allocations: None,
            figures: compute_deal(&inputs, rule),
        }
    }

    pub fn inputs(&self) -> &DealInputs {
        &self.inputs
    }

    pub fn figures(&self) -> &DealFigures {
        &self.figures
    }

    pub fn rule(&self) -> PayableRule {
        self.rule
    }

    pub fn allocations(&self) -> &[DoAllocation] {
        self.allocations.as_deref().unwrap_or(&[])
    }

    pub fn is_quantity_locked(&self) -> bool {
        self.allocations.is_some()
    }

    pub fn set_quantity(&mut self, raw: &str) -> Result<(), FieldError> {
        if self.is_quantity_locked() {
            return Err(FieldError::new("quantity", QUANTITY_LOCKED));
        }
        self.inputs.quantity = parse_decimal_field("quantity", raw)?.unwrap_or_default();
        self.recompute();
        Ok(())
    }

    pub fn set_rate(&mut self, raw: &str) -> Result<(), FieldError> {
        self.inputs.rate = parse_decimal_field("rate", raw)?.unwrap_or_default();
        self.recompute();
        Ok(())
    }

    pub fn set_gst_percent(&mut self, raw: &str) -> Result<(), FieldError> {
        self.inputs.gst_percent = parse_decimal_field("gstPercent", raw)?.unwrap_or_default();
        self.recompute();
        Ok(())
    }

    pub fn set_discount_percent(&mut self, raw: &str) -> Result<(), FieldError> {
        self.inputs.discount_percent =
            parse_decimal_field("discountPercent", raw)?.unwrap_or_default();
        self.recompute();
        Ok(())
    }

    pub fn set_brokerage_rate(&mut self, raw: &str) -> Result<(), FieldError> {
        self.inputs.brokerage_rate =
            parse_decimal_field("brokerageRate", raw)?.unwrap_or_default();
        self.recompute();
        Ok(())
    }

    /// Source the quantity from DO allocations; quantity becomes their sum.
    pub fn set_allocations(&mut self, allocations: Vec<DoAllocation>) {
        self.allocations = Some(allocations);
        self.recompute();
    }

    /// Return to a manually entered quantity, keeping the last derived value.
    pub fn clear_allocations(&mut self) {
        self.allocations = None;
        self.recompute();
    }

    pub fn into_parts(self) -> (DealInputs, Vec<DoAllocation>) {
        (self.inputs, self.allocations.unwrap_or_default())
    }

    fn recompute(&mut self) {
        if let Some(allocations) = &self.allocations {
            self.inputs.quantity = allocations.iter().map(|a| a.quantity).sum();
        }
        self.figures = compute_deal(&self.inputs, self.rule);
    }
}
