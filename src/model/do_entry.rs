//! Delivery-order allotments.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationErrors;
use crate::query::{ColumnValue, Listable};

/// Identity of a DO: committee center plus DO number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoKey {
    pub committee_center: String,
    pub do_number: String,
}

impl DoKey {
    pub fn new(committee_center: impl Into<String>, do_number: impl Into<String>) -> Self {
        Self {
            committee_center: committee_center.into().trim().to_string(),
            do_number: do_number.into().trim().to_string(),
        }
    }
}

impl fmt::Display for DoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.committee_center, self.do_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrainKind {
    Coarse,
    Fine,
    Common,
}

/// One committee's delivery-order allotment.
///
/// `total` is private: it is recomputed from the three grain quantities on every
/// change and is never accepted from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DoEntryInput")]
pub struct DoEntry {
    pub id: Option<Uuid>,
    pub committee_center: String,
    pub do_number: String,
    pub date: Option<NaiveDate>,
    grain_coarse: Decimal,
    grain_fine: Decimal,
    grain_common: Decimal,
    total: Decimal,
    pub version: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Wire shape accepted for a DO entry; any `total` sent by a client is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoEntryInput {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    committee_center: String,
    #[serde(default)]
    do_number: String,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    grain_coarse: Option<Decimal>,
    #[serde(default)]
    grain_fine: Option<Decimal>,
    #[serde(default)]
    grain_common: Option<Decimal>,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<DoEntryInput> for DoEntry {
    fn from(input: DoEntryInput) -> Self {
        let mut entry = DoEntry::new(
            input.committee_center,
            input.do_number,
            input.date,
            input.grain_coarse.unwrap_or_default(),
            input.grain_fine.unwrap_or_default(),
            input.grain_common.unwrap_or_default(),
        );
        entry.id = input.id;
        entry.version = input.version;
        entry.created_at = input.created_at;
        entry.updated_at = input.updated_at;
        entry
    }
}

impl DoEntry {
    pub fn new(
        committee_center: impl Into<String>,
        do_number: impl Into<String>,
        date: Option<NaiveDate>,
        grain_coarse: Decimal,
        grain_fine: Decimal,
        grain_common: Decimal,
    ) -> Self {
        let mut entry = Self {
            id: None,
            committee_center: committee_center.into().trim().to_string(),
            do_number: do_number.into().trim().to_string(),
            date,
            grain_coarse,
            grain_fine,
            grain_common,
            total: Decimal::ZERO,
            version: 0,
            created_at: None,
            updated_at: None,
        };
        entry.recompute_total();
        entry
    }

    pub fn key(&self) -> DoKey {
        DoKey::new(self.committee_center.clone(), self.do_number.clone())
    }

    pub fn grain(&self, kind: GrainKind) -> Decimal {
        match kind {
            GrainKind::Coarse => self.grain_coarse,
            GrainKind::Fine => self.grain_fine,
            GrainKind::Common => self.grain_common,
        }
    }

    /// Set one grain quantity; `None` (a blank field) counts as zero.
    pub fn set_grain(&mut self, kind: GrainKind, quantity: Option<Decimal>) {
        let quantity = quantity.unwrap_or_default();
        match kind {
            GrainKind::Coarse => self.grain_coarse = quantity,
            GrainKind::Fine => self.grain_fine = quantity,
            GrainKind::Common => self.grain_common = quantity,
        }
        self.recompute_total();
    }

    pub fn grain_coarse(&self) -> Decimal {
        self.grain_coarse
    }

    pub fn grain_fine(&self) -> Decimal {
        self.grain_fine
    }

    pub fn grain_common(&self) -> Decimal {
        self.grain_common
    }

    /// Entitlement of this DO: the sum of the three grain quantities.
    pub fn total(&self) -> Decimal {
        self.total
    }

    fn recompute_total(&mut self) {
        self.total = self.grain_coarse + self.grain_fine + self.grain_common;
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.committee_center.trim().is_empty() {
            errors.push("committeeCenter", "is required");
        }
        if self.do_number.trim().is_empty() {
            errors.push("doNumber", "is required");
        }
        for (field, value) in [
            ("grainCoarse", self.grain_coarse),
            ("grainFine", self.grain_fine),
            ("grainCommon", self.grain_common),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                errors.push(field, "must not be negative");
            }
        }
        errors.into_result()
    }
}

impl Listable for DoEntry {
    const RESOURCE: &'static str = "DO entry";
    const TABLE: &'static str = "do_entries";
    const COLUMNS: &'static [&'static str] = &[
        "committeeCenter",
        "doNumber",
        "date",
        "grainCoarse",
        "grainFine",
        "grainCommon",
        "total",
        "createdAt",
    ];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        match column {
            "committeeCenter" => Some(ColumnValue::Text(self.committee_center.clone())),
            "doNumber" => Some(ColumnValue::Text(self.do_number.clone())),
            "date" => self.date.map(ColumnValue::Date),
            "grainCoarse" => Some(ColumnValue::Number(self.grain_coarse)),
            "grainFine" => Some(ColumnValue::Number(self.grain_fine)),
            "grainCommon" => Some(ColumnValue::Number(self.grain_common)),
            "total" => Some(ColumnValue::Number(self.total)),
            "createdAt" => self.created_at.map(ColumnValue::Timestamp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn test_total_is_sum_of_grains() {
        let entry = DoEntry::new("Rampur", "D-101", None, dec(100), dec(150), dec(50));
        assert_eq!(entry.total(), dec(300));
    }

    #[test]
    fn test_total_recomputed_on_every_change() {
        let mut entry = DoEntry::new("Rampur", "D-101", None, dec(100), dec(150), dec(50));
        entry.set_grain(GrainKind::Fine, Some(dec(10)));
        assert_eq!(entry.total(), dec(160));
        entry.set_grain(GrainKind::Coarse, None);
        assert_eq!(entry.total(), dec(60));
        assert_eq!(entry.grain(GrainKind::Coarse), Decimal::ZERO);
    }

    #[test]
    fn test_client_supplied_total_is_ignored() {
        let json = r#"{
            "committeeCenter": "Rampur",
            "doNumber": "D-7",
            "grainCoarse": "10",
            "grainFine": "5.5",
            "total": "9999"
        }"#;
        let entry: DoEntry = serde_json::from_str(json).expect("parse");
        assert_eq!(entry.total(), Decimal::new(155, 1));
        assert_eq!(entry.grain_common(), Decimal::ZERO);
    }

    #[test]
    fn test_validate_requires_key_fields() {
        let entry = DoEntry::new(" ", "", None, dec(-1), dec(0), dec(0));
        let errors = entry.validate().unwrap_err();
        assert!(errors.has("committeeCenter"));
        assert!(errors.has("doNumber"));
        assert!(errors.has("grainCoarse"));
    }

    #[test]
    fn test_key_is_trimmed() {
        let entry = DoEntry::new("  Rampur ", " D-1", None, dec(1), dec(0), dec(0));
        assert_eq!(entry.key(), DoKey::new("Rampur", "D-1"));
        assert_eq!(entry.key().to_string(), "Rampur/D-1");
    }
}
