//! In-process store.
//!
//! All state sits behind one mutex; each trait method holds the lock for its
//! whole read-check-write sequence.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    deal_not_found, do_not_found, prepare_correction, prepare_deal_update, prepare_new_deal,
    prepare_new_entry, LedgerStore,
};
use crate::compute::MillingYieldCalculator;
use crate::error::{LedgerError, Result};
use crate::ledger::{DoBalance, DoLedger, LiftingFilter};
use crate::model::{Deal, DoEntry, DoKey, MillingRun};
use crate::query::{DealResource, ListQuery, ListResponse};

#[derive(Debug, Default)]
struct State {
    entries: Vec<DoEntry>,
    deals: Vec<Deal>,
    runs: Vec<MillingRun>,
}

impl State {
    fn ledger(&self, excluded_deal: Option<Uuid>) -> DoLedger {
        DoLedger::build_excluding(&self.entries, &self.deals, excluded_deal)
    }

    fn entry_index(&self, key: &DoKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.committee_center == key.committee_center && e.do_number == key.do_number)
    }

    fn deal_index(&self, id: Uuid) -> Option<usize> {
        self.deals.iter().position(|d| d.id == Some(id))
    }

    /// Every allocation change bumps the version of the DOs it touches.
    fn touch(&mut self, keys: BTreeSet<DoKey>) {
        let now = Utc::now();
        for key in keys {
            if let Some(index) = self.entry_index(&key) {
                let entry = &mut self.entries[index];
                entry.version = entry.version.wrapping_add(1);
                entry.updated_at = Some(now);
            }
        }
    }
}

fn allocation_keys(deal: &Deal) -> BTreeSet<DoKey> {
    deal.do_allocations().iter().map(|a| a.key()).collect()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    calculator: MillingYieldCalculator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calculator(calculator: MillingYieldCalculator) -> Self {
        Self {
            state: Mutex::new(State::default()),
            calculator,
        }
    }
}

impl LedgerStore for MemoryStore {
    fn insert_do_entry(&self, entry: DoEntry) -> Result<DoEntry> {
        let entry = prepare_new_entry(entry)?;
        let mut state = self.state.lock();
        if state.entry_index(&entry.key()).is_some() {
            return Err(LedgerError::Duplicate(entry.key()));
        }
        state.entries.push(entry.clone());
        log::info!("created DO entry {}", entry.key());
        Ok(entry)
    }

    fn insert_do_entries(&self, entries: Vec<DoEntry>) -> Result<Vec<DoEntry>> {
        let prepared = entries
            .into_iter()
            .map(prepare_new_entry)
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.lock();
        let mut seen = HashSet::new();
        for entry in &prepared {
            let key = entry.key();
            if state.entry_index(&key).is_some() || !seen.insert(key.clone()) {
                return Err(LedgerError::Duplicate(key));
            }
        }
        state.entries.extend(prepared.iter().cloned());
        Ok(prepared)
    }

    fn correct_do_entry(&self, entry: DoEntry, expected_version: u32) -> Result<DoEntry> {
        let key = entry.key();
        let mut state = self.state.lock();
        let index = state.entry_index(&key).ok_or_else(|| do_not_found(&key))?;
        let corrected = prepare_correction(&state.entries[index], entry, expected_version)?;
        state.ledger(None).check_correction(&corrected)?;
        state.entries[index] = corrected.clone();
        log::info!("corrected DO entry {} (version {})", key, corrected.version);
        Ok(corrected)
    }

    fn get_do_entry(&self, key: &DoKey) -> Result<DoEntry> {
        let state = self.state.lock();
        state
            .entry_index(key)
            .map(|index| state.entries[index].clone())
            .ok_or_else(|| do_not_found(key))
    }

    fn list_do_entries(&self, query: &ListQuery) -> Result<ListResponse<DoEntry>> {
        let entries = self.state.lock().entries.clone();
        Ok(query.apply(entries)?)
    }

    fn create_deal(&self, deal: Deal) -> Result<Deal> {
        let deal = prepare_new_deal(deal)?;
        let mut state = self.state.lock();
        state.ledger(None).check_allocations(deal.do_allocations())?;
        state.touch(allocation_keys(&deal));
        state.deals.push(deal.clone());
        log::info!(
            "created {} deal {} for {}",
            deal.resource(),
            deal.deal_number,
            deal.party_name
        );
        Ok(deal)
    }

    fn update_deal(&self, id: Uuid, deal: Deal) -> Result<Deal> {
        let mut state = self.state.lock();
        let index = state.deal_index(id).ok_or_else(|| deal_not_found(id))?;
        let updated = prepare_deal_update(&state.deals[index], deal)?;
        state
            .ledger(Some(id))
            .check_allocations(updated.do_allocations())?;

        let mut touched = allocation_keys(&state.deals[index]);
        touched.extend(allocation_keys(&updated));
        state.touch(touched);
        state.deals[index] = updated.clone();
        Ok(updated)
    }

    fn delete_deal(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        let index = state.deal_index(id).ok_or_else(|| deal_not_found(id))?;
        let removed = state.deals.remove(index);
        state.touch(allocation_keys(&removed));
        log::info!("deleted deal {}", id);
        Ok(())
    }

    fn get_deal(&self, id: Uuid) -> Result<Deal> {
        let state = self.state.lock();
        state
            .deal_index(id)
            .map(|index| state.deals[index].clone())
            .ok_or_else(|| deal_not_found(id))
    }

    fn list_deals(&self, resource: &DealResource, query: &ListQuery) -> Result<ListResponse<Deal>> {
        let slug = resource.commodity.slug();
        let deals: Vec<Deal> = self
            .state
            .lock()
            .deals
            .iter()
            .filter(|d| d.side == resource.side && d.commodity.slug() == slug)
            .cloned()
            .collect();
        Ok(query.apply(deals)?)
    }

    fn remaining_balance(&self, key: &DoKey) -> Result<DoBalance> {
        self.state
            .lock()
            .ledger(None)
            .balance(key)
            .ok_or_else(|| LedgerError::UnknownDo(key.clone()))
    }

    fn remaining_lifting(&self, filter: &LiftingFilter) -> Result<Vec<DoBalance>> {
        Ok(self.state.lock().ledger(None).remaining_lifting(filter))
    }

    fn insert_milling_run(&self, mut run: MillingRun) -> Result<MillingRun> {
        run.compute(&self.calculator)?;
        run.id = Some(Uuid::new_v4());
        run.created_at = Some(Utc::now());
        self.state.lock().runs.push(run.clone());
        Ok(run)
    }

    fn list_milling_runs(&self, query: &ListQuery) -> Result<ListResponse<MillingRun>> {
        let runs = self.state.lock().runs.clone();
        Ok(query.apply(runs)?)
    }
}
