//! Read paths with an opt-in placeholder fallback.
//!
//! A list fetched for display may, when the caller asks for it by name,
//! substitute a fixed placeholder dataset if the store is unreachable. The
//! substitute comes back as [`Fetched::Placeholder`] and cannot be turned
//! into live data, so it never reaches a write.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

use crate::error::LedgerError;
use crate::model::{Commodity, Deal, Side};
use crate::query::{DealResource, ListQuery};
use crate::store::LedgerStore;

#[derive(Debug)]
pub enum FetchError {
    /// The store failed and the policy does not allow a fallback
    Store(LedgerError),
    /// Placeholder data was offered where live data is required
    PlaceholderData(&'static str),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Store(e) => write!(f, "Fetch failed: {}", e),
            FetchError::PlaceholderData(name) => {
                write!(f, "Placeholder dataset '{}' cannot be used as live data", name)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Store(e) => Some(e),
            FetchError::PlaceholderData(_) => None,
        }
    }
}

impl From<LedgerError> for FetchError {
    fn from(error: LedgerError) -> Self {
        FetchError::Store(error)
    }
}

/// What a read path does when the store fails.
pub enum FallbackPolicy<T> {
    /// Return the error.
    Propagate,
    /// Substitute `dataset()`, tagged with `name`.
    Placeholder {
        name: &'static str,
        dataset: fn() -> T,
    },
}

impl<T> FallbackPolicy<T> {
    pub fn placeholder(name: &'static str, dataset: fn() -> T) -> Self {
        FallbackPolicy::Placeholder { name, dataset }
    }
}

impl<T> fmt::Debug for FallbackPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Propagate => f.write_str("Propagate"),
            FallbackPolicy::Placeholder { name, .. } => write!(f, "Placeholder({})", name),
        }
    }
}

/// Data from a read path, marked with where it came from.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Fetched<T> {
    Live(T),
    Placeholder { name: &'static str, data: T },
}

impl<T> Fetched<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Fetched::Placeholder { .. })
    }

    /// Borrow the data for display, whichever source it came from.
    pub fn view(&self) -> &T {
        match self {
            Fetched::Live(data) => data,
            Fetched::Placeholder { data, .. } => data,
        }
    }

    /// The data, if it is live.
    pub fn into_live(self) -> Result<T, FetchError> {
        match self {
            Fetched::Live(data) => Ok(data),
            Fetched::Placeholder { name, .. } => Err(FetchError::PlaceholderData(name)),
        }
    }
}

/// Run `fetch` under `policy`.
///
/// Only infrastructure failures fall back. A validation error in the request
/// itself is returned even under a placeholder policy.
pub fn fetch_with<T>(
    policy: &FallbackPolicy<T>,
    fetch: impl FnOnce() -> crate::error::Result<T>,
) -> Result<Fetched<T>, FetchError> {
    match fetch() {
        Ok(data) => Ok(Fetched::Live(data)),
        Err(error) => match policy {
            FallbackPolicy::Placeholder { name, dataset } if is_infrastructure(&error) => {
                log::warn!("serving placeholder dataset '{}' after fetch failure: {}", name, error);
                #[cfg(feature = "metrics")]
                METRICS.record_placeholder_fallback(*name);
                Ok(Fetched::Placeholder {
                    name: *name,
                    data: dataset(),
                })
            }
            _ => Err(FetchError::Store(error)),
        },
    }
}

fn is_infrastructure(error: &LedgerError) -> bool {
    matches!(
        error,
        LedgerError::Database(_) | LedgerError::Store(_) | LedgerError::Conflict(_)
    )
}

/// A purchase offered in a selection list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOption {
    /// `None` for placeholder rows.
    pub id: Option<Uuid>,
    pub deal_number: String,
    pub party_name: String,
    pub quantity: Decimal,
}

impl From<&Deal> for PurchaseOption {
    fn from(deal: &Deal) -> Self {
        Self {
            id: deal.id,
            deal_number: deal.deal_number.clone(),
            party_name: deal.party_name.clone(),
            quantity: deal.quantity(),
        }
    }
}

pub const SAMPLE_PURCHASES: &str = "sample-purchases";

fn sample_purchases() -> Vec<PurchaseOption> {
    [("SAMPLE-1", "Sample Party A", 100), ("SAMPLE-2", "Sample Party B", 250)]
        .into_iter()
        .map(|(deal_number, party_name, quantity)| PurchaseOption {
            id: None,
            deal_number: deal_number.to_string(),
            party_name: party_name.to_string(),
            quantity: Decimal::from(quantity),
        })
        .collect()
}

/// Placeholder policy for purchase selection lists.
pub fn sample_purchases_policy() -> FallbackPolicy<Vec<PurchaseOption>> {
    FallbackPolicy::placeholder(SAMPLE_PURCHASES, sample_purchases)
}

/// Purchases of `commodity` for a selection list.
pub fn purchase_options(
    store: &dyn LedgerStore,
    commodity: Commodity,
    query: &ListQuery,
    policy: &FallbackPolicy<Vec<PurchaseOption>>,
) -> Result<Fetched<Vec<PurchaseOption>>, FetchError> {
    let resource = DealResource::new(commodity, Side::Purchase);
    fetch_with(policy, || {
        let page = store.list_deals(&resource, query)?;
        Ok(page.records.iter().map(PurchaseOption::from).collect())
    })
}
