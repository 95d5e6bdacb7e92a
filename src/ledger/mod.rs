//! DO entitlement versus consumption.
//!
//! A [`DoLedger`] is a snapshot built from the current DO entries and deals.
//! Balances are never cached between operations: every check builds a fresh
//! ledger from the state it is about to change.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

use crate::error::{LedgerError, Result};
use crate::model::{Deal, DoAllocation, DoEntry, DoKey};

/// Balance of one DO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoBalance {
    #[serde(flatten)]
    pub key: DoKey,
    pub entitlement: Decimal,
    pub consumed: Decimal,
    pub remaining: Decimal,
    pub version: u32,
}

impl DoBalance {
    pub fn is_open(&self) -> bool {
        self.remaining > Decimal::ZERO
    }
}

/// Which DOs the remaining-lifting report covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiftingFilter {
    pub committee: Option<String>,
    /// Only DOs with quantity left to lift.
    pub open_only: bool,
}

impl LiftingFilter {
    pub fn committee(mut self, committee: impl Into<String>) -> Self {
        self.committee = Some(committee.into());
        self
    }

    pub fn open_only(mut self) -> Self {
        self.open_only = true;
        self
    }

    fn accepts(&self, balance: &DoBalance) -> bool {
        let committee_matches = self.committee.as_ref().map_or(true, |c| {
            c.trim().eq_ignore_ascii_case(&balance.key.committee_center)
        });
        committee_matches && (!self.open_only || balance.is_open())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entitlement {
    total: Decimal,
    version: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DoLedger {
    entitlements: BTreeMap<DoKey, Entitlement>,
    consumed: HashMap<DoKey, Decimal>,
}

impl DoLedger {
    pub fn build<'a>(
        entries: impl IntoIterator<Item = &'a DoEntry>,
        deals: impl IntoIterator<Item = &'a Deal>,
    ) -> Self {
        Self::build_excluding(entries, deals, None)
    }

    /// Build a ledger that ignores one deal's allocations, as when that deal
    /// is being replaced.
    pub fn build_excluding<'a>(
        entries: impl IntoIterator<Item = &'a DoEntry>,
        deals: impl IntoIterator<Item = &'a Deal>,
        excluded_deal: Option<Uuid>,
    ) -> Self {
        let mut ledger = DoLedger::default();
        for entry in entries {
            ledger.entitlements.insert(
                entry.key(),
                Entitlement {
                    total: entry.total(),
                    version: entry.version,
                },
            );
        }
        for deal in deals {
            if excluded_deal.is_some() && deal.id == excluded_deal {
                continue;
            }
            for allocation in deal.do_allocations() {
                ledger.add_consumption(allocation.key(), allocation.quantity);
            }
        }
        ledger
    }

    /// Record consumption directly, for stores that aggregate in SQL.
    pub fn add_consumption(&mut self, key: DoKey, quantity: Decimal) {
        *self.consumed.entry(key).or_default() += quantity;
    }

    pub fn insert_entitlement(&mut self, key: DoKey, total: Decimal, version: u32) {
        self.entitlements.insert(key, Entitlement { total, version });
    }

    pub fn consumed(&self, key: &DoKey) -> Decimal {
        self.consumed.get(key).copied().unwrap_or_default()
    }

    pub fn balance(&self, key: &DoKey) -> Option<DoBalance> {
        self.entitlements.get(key).map(|e| {
            let consumed = self.consumed(key);
            DoBalance {
                key: key.clone(),
                entitlement: e.total,
                consumed,
                remaining: e.total - consumed,
                version: e.version,
            }
        })
    }

    /// Entitlement minus everything allocated against the DO.
    pub fn remaining_balance(&self, key: &DoKey) -> Result<Decimal> {
        self.balance(key)
            .map(|b| b.remaining)
            .ok_or_else(|| LedgerError::UnknownDo(key.clone()))
    }

    /// Check a deal's allocations against the current balances.
    ///
    /// Every DO must exist and match the caller's expected version, and the
    /// quantity requested per DO must fit in what remains.
    pub fn check_allocations(&self, allocations: &[DoAllocation]) -> Result<()> {
        let mut requested: BTreeMap<DoKey, Decimal> = BTreeMap::new();
        for allocation in allocations {
            let key = allocation.key();
            let entitlement = match self.entitlements.get(&key) {
                Some(entitlement) => entitlement,
                None => {
                    reject("unknown_do");
                    return Err(LedgerError::UnknownDo(key));
                }
            };
            if let Some(expected) = allocation.expected_version {
                if expected != entitlement.version {
                    reject("version_conflict");
                    return Err(LedgerError::VersionConflict {
                        key,
                        expected,
                        actual: entitlement.version,
                    });
                }
            }
            *requested.entry(key).or_default() += allocation.quantity;
        }

        for (key, quantity) in requested {
            let remaining = self.remaining_balance(&key)?;
            if quantity > remaining {
                reject("over_allocated");
                log::warn!(
                    "rejected allocation of {} against DO {}: only {} remaining",
                    quantity,
                    key,
                    remaining
                );
                return Err(LedgerError::OverAllocated {
                    key,
                    requested: quantity,
                    remaining,
                });
            }
        }
        Ok(())
    }

    /// A corrected DO may not drop below what deals already consume.
    pub fn check_correction(&self, entry: &DoEntry) -> Result<()> {
        let key = entry.key();
        let consumed = self.consumed(&key);
        if entry.total() < consumed {
            return Err(LedgerError::EntitlementBelowConsumed {
                key,
                total: entry.total(),
                consumed,
            });
        }
        Ok(())
    }

    /// Per-DO balances ordered by committee center then DO number.
    pub fn remaining_lifting(&self, filter: &LiftingFilter) -> Vec<DoBalance> {
        self.entitlements
            .keys()
            .filter_map(|key| self.balance(key))
            .filter(|balance| filter.accepts(balance))
            .collect()
    }
}

fn reject(_reason: &'static str) {
    #[cfg(feature = "metrics")]
    METRICS.record_allocation_rejected(_reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::DealInputs;
    use crate::model::{Commodity, Side};

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn entry(center: &str, do_number: &str, total: i64) -> DoEntry {
        DoEntry::new(center, do_number, None, dec(total), Decimal::ZERO, Decimal::ZERO)
    }

    fn deal(allocations: Vec<DoAllocation>) -> Deal {
        let mut deal = Deal::new(
            Commodity::Paddy,
            Side::Purchase,
            "PP",
            "Shiv Traders",
            DealInputs {
                rate: dec(2000),
                ..Default::default()
            },
        );
        deal.id = Some(Uuid::new_v4());
        deal.set_allocations(allocations);
        deal
    }

    #[test]
    fn test_balance_follows_allocations() {
        let entries = vec![entry("Rampur", "D1", 300)];
        let key = DoKey::new("Rampur", "D1");
        let x = deal(vec![DoAllocation::new("Rampur", "D1", dec(120))]);
        let y = deal(vec![DoAllocation::new("Rampur", "D1", dec(100))]);

        let ledger = DoLedger::build(&entries, [&x, &y]);
        assert_eq!(ledger.remaining_balance(&key).unwrap(), dec(80));

        let without_x = DoLedger::build_excluding(&entries, [&x, &y], x.id);
        assert_eq!(without_x.remaining_balance(&key).unwrap(), dec(200));
    }

    #[test]
    fn test_over_allocation_rejected() {
        let entries = vec![entry("Rampur", "D1", 300)];
        let x = deal(vec![DoAllocation::new("Rampur", "D1", dec(250))]);
        let ledger = DoLedger::build(&entries, [&x]);

        let err = ledger
            .check_allocations(&[DoAllocation::new("Rampur", "D1", dec(60))])
            .unwrap_err();
        match err {
            LedgerError::OverAllocated {
                requested,
                remaining,
                ..
            } => {
                assert_eq!(requested, dec(60));
                assert_eq!(remaining, dec(50));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(ledger
            .check_allocations(&[DoAllocation::new("Rampur", "D1", dec(50))])
            .is_ok());
    }

    #[test]
    fn test_unknown_do_rejected() {
        let ledger = DoLedger::build(&[entry("Rampur", "D1", 300)], []);
        let err = ledger
            .check_allocations(&[DoAllocation::new("Rampur", "D9", dec(1))])
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownDo(key) if key.do_number == "D9"));
    }

    #[test]
    fn test_stale_version_rejected() {
        let mut stored = entry("Rampur", "D1", 300);
        stored.version = 3;
        let ledger = DoLedger::build(&[stored], []);
        let err = ledger
            .check_allocations(&[DoAllocation::new("Rampur", "D1", dec(1)).with_expected_version(2)])
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::VersionConflict {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert!(ledger
            .check_allocations(&[DoAllocation::new("Rampur", "D1", dec(1)).with_expected_version(3)])
            .is_ok());
    }

    #[test]
    fn test_correction_below_consumed() {
        let entries = vec![entry("Rampur", "D1", 300)];
        let x = deal(vec![DoAllocation::new("Rampur", "D1", dec(120))]);
        let ledger = DoLedger::build(&entries, [&x]);
        assert!(ledger.check_correction(&entry("Rampur", "D1", 120)).is_ok());
        assert!(matches!(
            ledger.check_correction(&entry("Rampur", "D1", 119)),
            Err(LedgerError::EntitlementBelowConsumed { .. })
        ));
    }

    #[test]
    fn test_remaining_lifting_report() {
        let entries = vec![
            entry("Sitapur", "D2", 100),
            entry("Rampur", "D9", 50),
            entry("Rampur", "D1", 300),
        ];
        let x = deal(vec![DoAllocation::new("Rampur", "D9", dec(50))]);
        let ledger = DoLedger::build(&entries, [&x]);

        let all = ledger.remaining_lifting(&LiftingFilter::default());
        let keys: Vec<String> = all.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(keys, vec!["Rampur/D1", "Rampur/D9", "Sitapur/D2"]);

        let open = ledger.remaining_lifting(&LiftingFilter::default().open_only());
        assert_eq!(open.len(), 2);

        let rampur = ledger.remaining_lifting(&LiftingFilter::default().committee("rampur"));
        assert_eq!(rampur.len(), 2);
        assert_eq!(rampur[1].remaining, Decimal::ZERO);
    }
}
