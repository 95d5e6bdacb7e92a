//! List queries over ledger records.
//!
//! A [`ListQuery`] is the explicit value object behind every list view:
//! page, page size, per-column filters and sort. The same query is answered
//! in memory ([`ListQuery::apply`]) or translated to SQL ([`sql`]).

pub mod list;
pub mod page;
pub mod resource;
pub mod sql;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub use list::{ListLimits, ListQuery, SortOrder};
pub use page::{ListResponse, MutationResponse};
pub use resource::{DealResource, DO_ENTRIES_BULK_PATH, DO_ENTRIES_PATH, MILLING_RUNS_PATH};

/// A record type that can be listed, filtered and sorted.
pub trait Listable {
    /// Human-readable name used in messages.
    const RESOURCE: &'static str;
    /// Backing table.
    const TABLE: &'static str;
    /// camelCase fields accepted in `filter[..]` and `sortBy`.
    const COLUMNS: &'static [&'static str];

    fn column_value(&self, column: &str) -> Option<ColumnValue>;
}

/// A column's value, typed for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    fn rank(&self) -> u8 {
        match self {
            ColumnValue::Text(_) => 0,
            ColumnValue::Number(_) => 1,
            ColumnValue::Date(_) => 2,
            ColumnValue::Timestamp(_) => 3,
        }
    }
}

impl Ord for ColumnValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ColumnValue::Text(a), ColumnValue::Text(b)) => {
                a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
            }
            (ColumnValue::Number(a), ColumnValue::Number(b)) => a.cmp(b),
            (ColumnValue::Date(a), ColumnValue::Date(b)) => a.cmp(b),
            (ColumnValue::Timestamp(a), ColumnValue::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ColumnValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Text(text) => f.write_str(text),
            ColumnValue::Number(number) => write!(f, "{}", number.normalize()),
            ColumnValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ColumnValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_ordering_ignores_case() {
        let a = ColumnValue::Text("apple".to_string());
        let b = ColumnValue::Text("Banana".to_string());
        assert!(a < b);
    }

    #[test]
    fn test_number_display_is_normalized() {
        let value = ColumnValue::Number(Decimal::new(150_00, 2));
        assert_eq!(value.to_string(), "150");
    }
}
