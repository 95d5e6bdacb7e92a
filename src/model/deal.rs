//! Purchase and sale deals.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compute::deal::{validate_inputs, QUANTITY_LOCKED};
use crate::compute::{compute_deal, DealFigures, DealInputs, PayableRule};
use crate::error::{FieldError, ValidationErrors};
use crate::model::DoKey;
use crate::query::{ColumnValue, DealResource, Listable};

/// Traded commodity. Unknown names are kept as [`Commodity::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Commodity {
    Paddy,
    Rice,
    Sack,
    Frk,
    Other(String),
}

impl Commodity {
    /// Lowercase identifier used in resource paths and storage.
    pub fn slug(&self) -> String {
        match self {
            Commodity::Paddy => "paddy".to_string(),
            Commodity::Rice => "rice".to_string(),
            Commodity::Sack => "sack".to_string(),
            Commodity::Frk => "frk".to_string(),
            Commodity::Other(name) => name
                .trim()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

impl From<String> for Commodity {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "paddy" => Commodity::Paddy,
            "rice" => Commodity::Rice,
            "sack" | "sacks" => Commodity::Sack,
            "frk" => Commodity::Frk,
            _ => Commodity::Other(value.trim().to_string()),
        }
    }
}

impl From<&str> for Commodity {
    fn from(value: &str) -> Self {
        Commodity::from(value.to_string())
    }
}

impl From<Commodity> for String {
    fn from(value: Commodity) -> Self {
        match value {
            Commodity::Other(name) => name,
            known => known.slug(),
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Purchase,
    Sale,
}

impl Side {
    pub fn payable_rule(self) -> PayableRule {
        match self {
            Side::Purchase => PayableRule::GrossWithGst,
            Side::Sale => PayableRule::NetOfDiscount,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Purchase => "purchase",
            Side::Sale => "sale",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "purchase" | "purchases" => Some(Side::Purchase),
            "sale" | "sales" => Some(Side::Sale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Active,
    Completed,
}

impl DealStatus {
    /// Status only ever moves forward, active to completed.
    pub fn can_become(self, next: DealStatus) -> bool {
        !(self == DealStatus::Completed && next == DealStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealStatus::Active => "active",
            DealStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(DealStatus::Active),
            "completed" => Some(DealStatus::Completed),
            _ => None,
        }
    }
}

/// A slice of a DO's entitlement consumed by a paddy purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoAllocation {
    pub committee_center: String,
    pub do_number: String,
    pub quantity: Decimal,
    /// DO version the caller last saw; a mismatch at commit is a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u32>,
}

impl DoAllocation {
    pub fn new(
        committee_center: impl Into<String>,
        do_number: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            committee_center: committee_center.into().trim().to_string(),
            do_number: do_number.into().trim().to_string(),
            quantity,
            expected_version: None,
        }
    }

    pub fn with_expected_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn key(&self) -> DoKey {
        DoKey::new(self.committee_center.clone(), self.do_number.clone())
    }
}

/// A purchase or sale of one commodity.
///
/// Figures are derived from the inputs on construction and on every input
/// change; they are serialized for clients but never read back from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DealWire")]
pub struct Deal {
    pub id: Option<Uuid>,
    pub commodity: Commodity,
    pub side: Side,
    pub deal_number: String,
    pub party_name: String,
    pub broker_name: Option<String>,
    pub deal_date: Option<NaiveDate>,
    #[serde(flatten)]
    inputs: DealInputs,
    #[serde(flatten)]
    figures: DealFigures,
    pub status: DealStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    do_allocations: Vec<DoAllocation>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealWire {
    #[serde(default)]
    id: Option<Uuid>,
    commodity: Commodity,
    side: Side,
    #[serde(default)]
    deal_number: String,
    #[serde(default)]
    party_name: String,
    #[serde(default)]
    broker_name: Option<String>,
    #[serde(default)]
    deal_date: Option<NaiveDate>,
    #[serde(default)]
    quantity: Option<Decimal>,
    #[serde(default)]
    rate: Option<Decimal>,
    #[serde(default)]
    gst_percent: Option<Decimal>,
    #[serde(default)]
    discount_percent: Option<Decimal>,
    #[serde(default)]
    brokerage_rate: Option<Decimal>,
    #[serde(default)]
    status: DealStatus,
    #[serde(default)]
    do_allocations: Vec<DoAllocation>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<DealWire> for Deal {
    type Error = ValidationErrors;

    fn try_from(wire: DealWire) -> Result<Self, Self::Error> {
        let inputs = DealInputs {
            quantity: wire.quantity.unwrap_or_default(),
            rate: wire.rate.unwrap_or_default(),
            gst_percent: wire.gst_percent.unwrap_or_default(),
            discount_percent: wire.discount_percent.unwrap_or_default(),
            brokerage_rate: wire.brokerage_rate.unwrap_or_default(),
        };
        let mut deal = Deal::new(
            wire.commodity,
            wire.side,
            wire.deal_number,
            wire.party_name,
            inputs,
        );
        deal.id = wire.id;
        deal.broker_name = wire.broker_name;
        deal.deal_date = wire.deal_date;
        deal.status = wire.status;
        deal.created_at = wire.created_at;
        deal.updated_at = wire.updated_at;
        if !wire.do_allocations.is_empty() {
            deal.set_allocations(wire.do_allocations);
            if matches!(wire.quantity, Some(quantity) if quantity != deal.quantity()) {
                return Err(FieldError::new("quantity", QUANTITY_LOCKED).into());
            }
        }
        Ok(deal)
    }
}

impl Deal {
    pub fn new(
        commodity: Commodity,
        side: Side,
        deal_number: impl Into<String>,
        party_name: impl Into<String>,
        inputs: DealInputs,
    ) -> Self {
        Self {
            id: None,
            figures: compute_deal(&inputs, side.payable_rule()),
            commodity,
            side,
            deal_number: deal_number.into().trim().to_string(),
            party_name: party_name.into().trim().to_string(),
            broker_name: None,
            deal_date: None,
            inputs,
            status: DealStatus::Active,
            do_allocations: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn resource(&self) -> DealResource {
        DealResource::new(self.commodity.clone(), self.side)
    }

    pub fn inputs(&self) -> &DealInputs {
        &self.inputs
    }

    pub fn figures(&self) -> &DealFigures {
        &self.figures
    }

    pub fn quantity(&self) -> Decimal {
        self.inputs.quantity
    }

    pub fn do_allocations(&self) -> &[DoAllocation] {
        &self.do_allocations
    }

    pub fn is_do_sourced(&self) -> bool {
        !self.do_allocations.is_empty()
    }

    /// Replace the raw inputs. On a DO-sourced deal the quantity must equal
    /// the allocated total.
    pub fn set_inputs(&mut self, inputs: DealInputs) -> Result<(), FieldError> {
        if self.is_do_sourced() && inputs.quantity != self.allocated_quantity() {
            return Err(FieldError::new("quantity", QUANTITY_LOCKED));
        }
        self.inputs = inputs;
        self.recompute();
        Ok(())
    }

    /// Source the quantity from DO allocations. An empty list returns the deal
    /// to a manually entered quantity.
    pub fn set_allocations(&mut self, allocations: Vec<DoAllocation>) {
        self.do_allocations = allocations;
        self.recompute();
    }

    fn allocated_quantity(&self) -> Decimal {
        self.do_allocations.iter().map(|a| a.quantity).sum()
    }

    fn recompute(&mut self) {
        if self.is_do_sourced() {
            self.inputs.quantity = self.allocated_quantity();
        }
        self.figures = compute_deal(&self.inputs, self.side.payable_rule());
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.deal_number.trim().is_empty() {
            errors.push("dealNumber", "is required");
        }
        if self.party_name.trim().is_empty() {
            errors.push("partyName", "is required");
        }
        if let Commodity::Other(name) = &self.commodity {
            if name.trim().is_empty() {
                errors.push("commodity", "is required");
            }
        }
        validate_inputs(&self.inputs, &mut errors);

        if self.is_do_sourced() {
            if self.commodity != Commodity::Paddy || self.side != Side::Purchase {
                errors.push(
                    "doAllocations",
                    "are only accepted on paddy purchases",
                );
            }
            let mut seen = HashSet::new();
            for (index, allocation) in self.do_allocations.iter().enumerate() {
                let field = format!("doAllocations[{}]", index);
                if allocation.committee_center.is_empty() || allocation.do_number.is_empty() {
                    errors.push(field.clone(), "committee center and DO number are required");
                }
                if allocation.quantity <= Decimal::ZERO {
                    errors.push(field.clone(), "quantity must be greater than 0");
                }
                if !seen.insert(allocation.key()) {
                    errors.push(field, format!("DO {} is allocated twice", allocation.key()));
                }
            }
        }
        errors.into_result()
    }
}

impl Listable for Deal {
    const RESOURCE: &'static str = "deal";
    const TABLE: &'static str = "deals";
    const COLUMNS: &'static [&'static str] = &[
        "dealNumber",
        "partyName",
        "brokerName",
        "dealDate",
        "quantity",
        "rate",
        "amount",
        "totalWithGst",
        "payableAmount",
        "status",
        "createdAt",
    ];

    fn column_value(&self, column: &str) -> Option<ColumnValue> {
        match column {
            "dealNumber" => Some(ColumnValue::Text(self.deal_number.clone())),
            "partyName" => Some(ColumnValue::Text(self.party_name.clone())),
            "brokerName" => self.broker_name.clone().map(ColumnValue::Text),
            "dealDate" => self.deal_date.map(ColumnValue::Date),
            "quantity" => Some(ColumnValue::Number(self.inputs.quantity)),
            "rate" => Some(ColumnValue::Number(self.inputs.rate)),
            "amount" => Some(ColumnValue::Number(self.figures.amount)),
            "totalWithGst" => Some(ColumnValue::Number(self.figures.total_with_gst)),
            "payableAmount" => Some(ColumnValue::Number(self.figures.payable_amount)),
            "status" => Some(ColumnValue::Text(self.status.as_str().to_string())),
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

    fn paddy_purchase() -> Deal {
        Deal::new(
            Commodity::Paddy,
            Side::Purchase,
            "PP-1",
            "Shiv Traders",
            DealInputs {
                rate: dec(2000),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_commodity_names() {
        assert_eq!(Commodity::from("Paddy"), Commodity::Paddy);
        assert_eq!(Commodity::from(" FRK "), Commodity::Frk);
        assert_eq!(
            Commodity::from("Broken Rice"),
            Commodity::Other("Broken Rice".to_string())
        );
        assert_eq!(Commodity::from("Broken Rice").slug(), "broken-rice");
        let json = serde_json::to_string(&Commodity::Sack).unwrap();
        assert_eq!(json, "\"sack\"");
    }

    #[test]
    fn test_figures_follow_side() {
        let inputs = DealInputs {
            quantity: dec(50),
            rate: dec(500),
            gst_percent: dec(18),
            discount_percent: dec(2),
            brokerage_rate: Decimal::ZERO,
        };
        let sale = Deal::new(Commodity::Rice, Side::Sale, "RS-1", "Agro Mart", inputs);
        let purchase = Deal::new(Commodity::Rice, Side::Purchase, "RP-1", "Agro Mart", inputs);
        assert_eq!(sale.figures().payable_amount, dec(28_910));
        assert_eq!(purchase.figures().payable_amount, dec(29_500));
    }

    #[test]
    fn test_allocations_drive_quantity() {
        let mut deal = paddy_purchase();
        deal.set_allocations(vec![
            DoAllocation::new("Rampur", "D1", dec(120)),
            DoAllocation::new("Rampur", "D2", dec(80)),
        ]);
        assert_eq!(deal.quantity(), dec(200));
        assert_eq!(deal.figures().amount, dec(400_000));

        let mut inputs = *deal.inputs();
        inputs.rate = dec(2100);
        deal.set_inputs(inputs).expect("same quantity");
        assert_eq!(deal.figures().amount, dec(420_000));
        assert!(deal.validate().is_ok());
    }

    #[test]
    fn test_manual_quantity_refused_when_do_sourced() {
        let mut deal = paddy_purchase();
        deal.set_allocations(vec![DoAllocation::new("Rampur", "D1", dec(120))]);

        let mut inputs = *deal.inputs();
        inputs.quantity = dec(5);
        let err = deal.set_inputs(inputs).unwrap_err();
        assert_eq!(err.field, "quantity");
        assert_eq!(deal.quantity(), dec(120));
        assert_eq!(deal.figures().amount, dec(240_000));
    }

    #[test]
    fn test_wire_quantity_must_match_allocations() {
        let json = r#"{
            "commodity": "paddy",
            "side": "purchase",
            "dealNumber": "PP-9",
            "partyName": "Shiv Traders",
            "quantity": "999",
            "rate": "2000",
            "doAllocations": [
                {"committeeCenter": "Rampur", "doNumber": "D1", "quantity": "100"}
            ]
        }"#;
        let err = serde_json::from_str::<Deal>(json).unwrap_err();
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn test_client_figures_are_ignored() {
        let json = r#"{
            "commodity": "paddy",
            "side": "purchase",
            "dealNumber": "PP-9",
            "partyName": "Shiv Traders",
            "quantity": "100",
            "rate": "2000",
            "amount": "1",
            "payableAmount": "1",
            "doAllocations": [
                {"committeeCenter": "Rampur", "doNumber": "D1", "quantity": "100"}
            ]
        }"#;
        let deal: Deal = serde_json::from_str(json).expect("parse");
        assert_eq!(deal.quantity(), dec(100));
        assert_eq!(deal.figures().amount, dec(200_000));
        assert_eq!(deal.status, DealStatus::Active);

        let value = serde_json::to_value(&deal).unwrap();
        assert_eq!(value["dealNumber"], "PP-9");
        assert!(value.get("payableAmount").is_some());
        assert!(value.get("doAllocations").is_some());
    }

    #[test]
    fn test_allocations_only_on_paddy_purchases() {
        let mut deal = Deal::new(
            Commodity::Rice,
            Side::Purchase,
            "RP-2",
            "Agro Mart",
            DealInputs::default(),
        );
        deal.set_allocations(vec![DoAllocation::new("Rampur", "D1", dec(10))]);
        let errors = deal.validate().unwrap_err();
        assert!(errors.has("doAllocations"));
    }

    #[test]
    fn test_duplicate_and_empty_allocations_rejected() {
        let mut deal = paddy_purchase();
        deal.set_allocations(vec![
            DoAllocation::new("Rampur", "D1", dec(10)),
            DoAllocation::new("Rampur", "D1", dec(0)),
        ]);
        let errors = deal.validate().unwrap_err();
        assert!(errors.has("doAllocations[1]"));
        assert!(!errors.has("doAllocations[0]"));
    }

    #[test]
    fn test_validate_requires_names_and_quantity() {
        let deal = Deal::new(
            Commodity::Other(" ".to_string()),
            Side::Sale,
            "",
            "",
            DealInputs::default(),
        );
        let errors = deal.validate().unwrap_err();
        for field in ["dealNumber", "partyName", "commodity", "quantity"] {
            assert!(errors.has(field), "missing {}", field);
        }
    }

    #[test]
    fn test_status_moves_forward_only() {
        assert!(DealStatus::Active.can_become(DealStatus::Completed));
        assert!(DealStatus::Completed.can_become(DealStatus::Completed));
        assert!(!DealStatus::Completed.can_become(DealStatus::Active));
    }
}
