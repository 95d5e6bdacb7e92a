//! Milling yield breakdown.
//!
//! Each yield is expressed as a percentage of the hopper quantity at 2 dp.
//! Wastage is the share of the hopper no yield accounts for. Whether a run is
//! overstated is decided on the raw quantities; a consistent run is split into
//! hundredths of a percent by largest remainder, so the five percentages plus
//! wastage add up to exactly 100 and each one is within 0.01 of its exact value.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{mul, round_money, HUNDRED};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result, ValidationErrors};

/// What to do when the yields add up to more than the hopper quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverstatedPolicy {
    /// Keep the run, clamp wastage to 0 and attach a warning.
    #[default]
    Warn,
    /// Refuse the run.
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldInputs {
    #[serde(default)]
    pub hopper_quantity: Decimal,
    #[serde(default)]
    pub rice: Decimal,
    #[serde(default)]
    pub brokens: Decimal,
    #[serde(default)]
    pub bran: Decimal,
    /// Husk is weighed in tons; see `ledger.husk_ton_factor`.
    #[serde(default)]
    pub husk_tons: Decimal,
    #[serde(default)]
    pub fine_brokens: Decimal,
}

impl YieldInputs {
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("rice", self.rice),
            ("brokens", self.brokens),
            ("bran", self.bran),
            ("huskTons", self.husk_tons),
            ("fineBrokens", self.fine_brokens),
        ] {
            if value < Decimal::ZERO {
                errors.push(field, "must not be negative");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum YieldWarning {
    #[serde(rename = "overstated", rename_all = "camelCase")]
    Overstated {
        total_percent: Decimal,
        excess: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldBreakdown {
    pub rice_percent: Decimal,
    pub brokens_percent: Decimal,
    pub bran_percent: Decimal,
    pub husk_percent: Decimal,
    pub fine_brokens_percent: Decimal,
    pub wastage_percent: Decimal,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<YieldWarning>,
}

impl YieldBreakdown {
    /// Sum of the five yield percentages, excluding wastage.
    pub fn yield_total(&self) -> Decimal {
        self.rice_percent
            .checked_add(self.brokens_percent)
            .and_then(|sum| sum.checked_add(self.bran_percent))
            .and_then(|sum| sum.checked_add(self.husk_percent))
            .and_then(|sum| sum.checked_add(self.fine_brokens_percent))
            .unwrap_or(Decimal::MAX)
    }

    pub fn is_overstated(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, YieldWarning::Overstated { .. }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MillingYieldCalculator {
    husk_ton_factor: Decimal,
    policy: OverstatedPolicy,
}

impl Default for MillingYieldCalculator {
    fn default() -> Self {
        Self::new(Decimal::TEN, OverstatedPolicy::Warn)
    }
}

impl MillingYieldCalculator {
    pub fn new(husk_ton_factor: Decimal, policy: OverstatedPolicy) -> Self {
        Self {
            husk_ton_factor,
            policy,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.ledger.husk_ton_factor, config.milling.overstated_yields)
    }

    pub fn policy(&self) -> OverstatedPolicy {
        self.policy
    }

    /// Percent breakdown of a run.
    ///
    /// Returns `Ok(None)` when the hopper quantity is not positive: there is
    /// nothing to divide by, so no percentages exist.
    pub fn compute(&self, inputs: &YieldInputs) -> Result<Option<YieldBreakdown>> {
        inputs.validate()?;
        if inputs.hopper_quantity <= Decimal::ZERO {
            return Ok(None);
        }

        let hopper = inputs.hopper_quantity;
        let husk_quantity = mul(inputs.husk_tons, self.husk_ton_factor);
        let yields = [
            inputs.rice,
            inputs.brokens,
            inputs.bran,
            husk_quantity,
            inputs.fine_brokens,
        ];
        let accounted = yields
            .iter()
            .try_fold(Decimal::ZERO, |sum, q| sum.checked_add(*q))
            .unwrap_or(Decimal::MAX);

        if accounted <= hopper {
            // Wastage goes first so it absorbs ties in the leftover hundredths.
            let [wastage, rice, brokens, bran, husk, fine_brokens] = apportion(
                [hopper - accounted, yields[0], yields[1], yields[2], yields[3], yields[4]],
                hopper,
            );
            return Ok(Some(YieldBreakdown {
                rice_percent: rice,
                brokens_percent: brokens,
                bran_percent: bran,
                husk_percent: husk,
                fine_brokens_percent: fine_brokens,
                wastage_percent: wastage,
                warnings: Vec::new(),
            }));
        }

        let percent_of = |quantity: Decimal| -> Decimal {
            match quantity.checked_div(hopper) {
                Some(ratio) => round_money(mul(ratio, HUNDRED)),
                None => Decimal::MAX,
            }
        };
        let mut breakdown = YieldBreakdown {
            rice_percent: percent_of(inputs.rice),
            brokens_percent: percent_of(inputs.brokens),
            bran_percent: percent_of(inputs.bran),
            husk_percent: percent_of(husk_quantity),
            fine_brokens_percent: percent_of(inputs.fine_brokens),
            wastage_percent: Decimal::ZERO,
            warnings: Vec::new(),
        };

        let total = breakdown.yield_total();
        let excess = total.checked_sub(HUNDRED).unwrap_or(Decimal::MAX).max(Decimal::ZERO);
        match self.policy {
            OverstatedPolicy::Reject => {
                return Err(LedgerError::YieldsOverstated {
                    total_percent: total,
                })
            }
            OverstatedPolicy::Warn => {
                log::warn!(
                    "milling yields of {} exceed hopper quantity {} ({}%), wastage clamped to 0",
                    accounted,
                    hopper,
                    total
                );
                breakdown.warnings.push(YieldWarning::Overstated {
                    total_percent: total,
                    excess,
                });
            }
        }

        Ok(Some(breakdown))
    }
}

/// Split 100% of `hopper` across `parts`, which must add up to `hopper`, in
/// hundredths of a percent. Each part gets the floor of its exact share; the
/// hundredths left over go to the largest remainders, earlier parts first on
/// ties.
fn apportion(parts: [Decimal; 6], hopper: Decimal) -> [Decimal; 6] {
    let scale = Decimal::from(10_000);
    let mut hundredths = [Decimal::ZERO; 6];
    let mut remainders = [Decimal::ZERO; 6];
    for (index, part) in parts.iter().enumerate() {
        let scaled = mul(*part, scale);
        let mut whole = scaled.checked_div(hopper).unwrap_or(Decimal::ZERO).floor();
        let mut remainder = scaled - mul(whole, hopper);
        // The quotient is rounded at 28 digits; settle it on the exact side.
        if remainder < Decimal::ZERO {
            whole -= Decimal::ONE;
            remainder += hopper;
        } else if remainder >= hopper {
            whole += Decimal::ONE;
            remainder -= hopper;
        }
        hundredths[index] = whole;
        remainders[index] = remainder;
    }

    let assigned: Decimal = hundredths.iter().sum();
    let leftover = (scale - assigned).to_usize().unwrap_or(0);
    let mut order: Vec<usize> = (0..parts.len()).collect();
    order.sort_by(|a, b| remainders[*b].cmp(&remainders[*a]));
    for index in order.into_iter().take(leftover) {
        hundredths[index] += Decimal::ONE;
    }

    hundredths.map(|h| h / HUNDRED)
}
