//! Milling runs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compute::{MillingYieldCalculator, YieldBreakdown, YieldInputs};
use crate::error::{Result, ValidationErrors};
use crate::query::{ColumnValue, Listable};

/// One hopper of paddy run through the mill and what came out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MillingRunInput")]
pub struct MillingRun {
    pub id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub paddy_type: String,
    #[serde(flatten)]
    inputs: YieldInputs,
    percentages: Option<YieldBreakdown>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MillingRunInput {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    paddy_type: String,
    #[serde(flatten)]
    inputs: YieldInputs,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<MillingRunInput> for MillingRun {
    fn from(input: MillingRunInput) -> Self {
        let mut run = MillingRun::new(input.date, input.paddy_type, input.inputs);
        run.id = input.id;
        run.created_at = input.created_at;
        run
    }
}

impl MillingRun {
    pub fn new(date: Option<NaiveDate>, paddy_type: impl Into<String>, inputs: YieldInputs) -> Self {
        Self {
            id: None,
            date,
            paddy_type: paddy_type.into().trim().to_string(),
            inputs,
            percentages: None,
            created_at: None,
        }
    }

    pub fn inputs(&self) -> &YieldInputs {
        &self.inputs
    }

    /// Derived percentages; `None` until [`MillingRun::compute`] has run.
    pub fn percentages(&self) -> Option<&YieldBreakdown> {
        self.percentages.as_ref()
    }

    /// Reattach percentages computed when the run was stored.
    pub(crate) fn restore_percentages(&mut self, percentages: Option<YieldBreakdown>) {
        self.percentages = percentages;
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = match self.inputs.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.paddy_type.is_empty() {
            errors.push("paddyType", "is required");
        }
        if self.date.is_none() {
            errors.push("date", "is required");
        }
        if self.inputs.hopper_quantity <= Decimal::ZERO {
            errors.push("hopperQuantity", "must be greater than 0");
        }
        errors.into_result()
    }

    /// Validate the run and derive its percentages.
    pub fn compute(&mut self, calculator: &MillingYieldCalculator) -> Result<()> {
        self.validate()?;
        self.percentages = calculator.compute(&self.inputs)?;
        Ok(())
    }
}

impl Listable for MillingRun {
    const RESOURCE: &'static str = "milling run";
    const TABLE: &'static str = "milling_runs";
    const COLUMNS: &'static [&'static str] = &["date", "paddyType", "hopperQuantity", "createdAt"];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        match column {
            "date" => self.date.map(ColumnValue::Date),
            "paddyType" => Some(ColumnValue::Text(self.paddy_type.clone())),
            "hopperQuantity" => Some(ColumnValue::Number(self.inputs.hopper_quantity)),
            "createdAt" => self.created_at.map(ColumnValue::Timestamp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::OverstatedPolicy;
    use crate::error::LedgerError;

    fn inputs() -> YieldInputs {
        YieldInputs {
            hopper_quantity: Decimal::from(500),
            rice: Decimal::from(330),
            brokens: Decimal::from(25),
            bran: Decimal::from(40),
            husk_tons: Decimal::from(10),
            fine_brokens: Decimal::from(5),
        }
    }

    fn date() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 11, 4)
    }

    #[test]
    fn test_compute_fills_percentages() {
        let mut run = MillingRun::new(date(), "Sona Masuri", inputs());
        assert!(run.percentages().is_none());
        run.compute(&MillingYieldCalculator::default()).unwrap();
        let pct = run.percentages().expect("computed");
        assert_eq!(pct.rice_percent, Decimal::from(66));
        assert_eq!(pct.husk_percent, Decimal::from(20));
        assert_eq!(pct.wastage_percent, Decimal::ZERO);
    }

    #[test]
    fn test_hopper_required() {
        let mut bad = inputs();
        bad.hopper_quantity = Decimal::ZERO;
        let mut run = MillingRun::new(date(), "Sona Masuri", bad);
        let err = run.compute(&MillingYieldCalculator::default()).unwrap_err();
        match err {
            LedgerError::Validation(errors) => assert!(errors.has("hopperQuantity")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_overstated_run_rejected_under_reject_policy() {
        let mut heavy = inputs();
        heavy.rice = Decimal::from(450);
        let mut run = MillingRun::new(date(), "Sona Masuri", heavy);
        let calc = MillingYieldCalculator::new(Decimal::TEN, OverstatedPolicy::Reject);
        assert!(matches!(
            run.compute(&calc),
            Err(LedgerError::YieldsOverstated { .. })
        ));
    }

    #[test]
    fn test_client_percentages_ignored() {
        let json = r#"{
            "date": "2024-11-04",
            "paddyType": "IR-64",
            "hopperQuantity": "100",
            "rice": "60",
            "percentages": {"ricePercent": "99"}
        }"#;
        let run: MillingRun = serde_json::from_str(json).expect("parse");
        assert!(run.percentages().is_none());
        assert_eq!(run.inputs().rice, Decimal::from(60));
    }
}
