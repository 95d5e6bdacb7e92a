//! Persistence of ledger records.
//!
//! [`LedgerStore`] is the seam between the ledger rules and storage. Every
//! method is one unit of work: it fully succeeds or leaves the store
//! unchanged. The DO check-then-allocate sequence runs inside that unit, so
//! two deals can never both consume the same remaining quantity.

pub mod memory;
pub mod params;
pub mod postgres;
pub mod schema;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::ledger::{DoBalance, LiftingFilter};
use crate::model::{Deal, DealStatus, DoEntry, DoKey, MillingRun};
use crate::query::{DealResource, ListQuery, ListResponse};

pub use memory::MemoryStore;
pub use postgres::PgLedgerStore;

pub trait LedgerStore: Send + Sync {
    /// `POST /do-entries`
    fn insert_do_entry(&self, entry: DoEntry) -> Result<DoEntry>;

    /// `POST /do-entries/bulk`: every entry or none.
    fn insert_do_entries(&self, entries: Vec<DoEntry>) -> Result<Vec<DoEntry>>;

    /// Replace a DO's grain quantities and date. `expected_version` must match
    /// the stored version.
    fn correct_do_entry(&self, entry: DoEntry, expected_version: u32) -> Result<DoEntry>;

    fn get_do_entry(&self, key: &DoKey) -> Result<DoEntry>;

    fn list_do_entries(&self, query: &ListQuery) -> Result<ListResponse<DoEntry>>;

    fn create_deal(&self, deal: Deal) -> Result<Deal>;

    /// Replace a deal; its previous allocations are released first.
    fn update_deal(&self, id: Uuid, deal: Deal) -> Result<Deal>;

    /// Delete a deal and release its allocations.
    fn delete_deal(&self, id: Uuid) -> Result<()>;

    fn get_deal(&self, id: Uuid) -> Result<Deal>;

    fn list_deals(&self, resource: &DealResource, query: &ListQuery) -> Result<ListResponse<Deal>>;

    fn remaining_balance(&self, key: &DoKey) -> Result<DoBalance>;

    fn remaining_lifting(&self, filter: &LiftingFilter) -> Result<Vec<DoBalance>>;

    /// Validate the run, derive its percentages and store it.
    fn insert_milling_run(&self, run: MillingRun) -> Result<MillingRun>;

    fn list_milling_runs(&self, query: &ListQuery) -> Result<ListResponse<MillingRun>>;
}

/// Validate a new DO entry and stamp it with an id and timestamps.
pub(crate) fn prepare_new_entry(mut entry: DoEntry) -> Result<DoEntry> {
    entry.validate()?;
    let now = Utc::now();
    entry.id = Some(Uuid::new_v4());
    entry.version = 0;
    entry.created_at = Some(now);
    entry.updated_at = Some(now);
    Ok(entry)
}

/// Merge a correction into the stored entry, checking the version token.
pub(crate) fn prepare_correction(
    stored: &DoEntry,
    mut corrected: DoEntry,
    expected_version: u32,
) -> Result<DoEntry> {
    corrected.validate()?;
    if stored.version != expected_version {
        return Err(LedgerError::VersionConflict {
            key: stored.key(),
            expected: expected_version,
            actual: stored.version,
        });
    }
    corrected.id = stored.id;
    corrected.created_at = stored.created_at;
    corrected.updated_at = Some(Utc::now());
    corrected.version = stored.version.wrapping_add(1);
    Ok(corrected)
}

/// Validate a new deal and stamp it with an id and timestamps.
pub(crate) fn prepare_new_deal(mut deal: Deal) -> Result<Deal> {
    deal.validate()?;
    let now = Utc::now();
    deal.id = Some(Uuid::new_v4());
    deal.created_at = Some(now);
    deal.updated_at = Some(now);
    Ok(deal)
}

/// Validate a replacement deal against the stored one.
pub(crate) fn prepare_deal_update(stored: &Deal, mut deal: Deal) -> Result<Deal> {
    deal.validate()?;
    let mut errors = crate::error::ValidationErrors::new();
    if deal.commodity != stored.commodity || deal.side != stored.side {
        errors.push("commodity", "a deal cannot move to another book");
    }
    if !stored.status.can_become(deal.status) {
        errors.push(
            "status",
            format!(
                "cannot change from {} to {}",
                stored.status.as_str(),
                deal.status.as_str()
            ),
        );
    }
    errors.into_result()?;

    deal.id = stored.id;
    deal.created_at = stored.created_at;
    deal.updated_at = Some(Utc::now());
    Ok(deal)
}

pub(crate) fn deal_not_found(id: Uuid) -> LedgerError {
    LedgerError::not_found("deal", id)
}

pub(crate) fn do_not_found(key: &DoKey) -> LedgerError {
    LedgerError::NotFound {
        resource: "DO entry",
        id: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::DealInputs;
    use crate::model::{Commodity, Side};
    use rust_decimal::Decimal;

    fn sale() -> Deal {
        Deal::new(
            Commodity::Rice,
            Side::Sale,
            "RS-1",
            "Agro Mart",
            DealInputs {
                quantity: Decimal::from(10),
                rate: Decimal::from(3000),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_deal_gets_identity() {
        let deal = prepare_new_deal(sale()).unwrap();
        assert!(deal.id.is_some());
        assert!(deal.created_at.is_some());
        assert_eq!(deal.status, DealStatus::Active);
    }

    #[test]
    fn test_completed_deal_cannot_reopen() {
        let mut stored = prepare_new_deal(sale()).unwrap();
        stored.status = DealStatus::Completed;
        let err = prepare_deal_update(&stored, sale()).unwrap_err();
        match err {
            LedgerError::Validation(errors) => assert!(errors.has("status")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_correction_bumps_version() {
        let stored = prepare_new_entry(DoEntry::new(
            "Rampur",
            "D1",
            None,
            Decimal::from(10),
            Decimal::ZERO,
            Decimal::ZERO,
        ))
        .unwrap();
        let corrected = DoEntry::new("Rampur", "D1", None, Decimal::from(12), Decimal::ZERO, Decimal::ZERO);
        let updated = prepare_correction(&stored, corrected.clone(), 0).unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.id, stored.id);
        assert!(matches!(
            prepare_correction(&updated, corrected, 0),
            Err(LedgerError::VersionConflict { .. })
        ));
    }
}
