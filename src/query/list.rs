use std::cmp::Ordering;
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ColumnValue, ListResponse, Listable};
use crate::config::LedgerSettings;
use crate::error::ValidationErrors;

static FILTER_KEY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^filter\[([A-Za-z][A-Za-z0-9_]*)\]$").ok());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Page size bounds applied when parsing a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl From<&LedgerSettings> for ListLimits {
    fn from(settings: &LedgerSettings) -> Self {
        Self {
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
        }
    }
}

/// Page, filters and sort of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub page_size: u64,
    /// camelCase column to substring; matched case-insensitively.
    pub filters: BTreeMap<String, String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(ListLimits::default().default_page_size)
    }
}

impl ListQuery {
    pub fn new(page_size: u64) -> Self {
        Self {
            page: 1,
            page_size,
            filters: BTreeMap::new(),
            sort_by: None,
            sort_order: SortOrder::Asc,
        }
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(column.into());
        self.sort_order = order;
        self
    }

    /// Parse `page`, `pageSize`, `filter[<field>]`, `sortBy` and `sortOrder`
    /// from query-string pairs. Unknown keys are ignored; blank filters are
    /// dropped.
    pub fn from_pairs<I, K, V>(pairs: I, limits: &ListLimits) -> Result<Self, ValidationErrors>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::new(limits.default_page_size);
        let mut errors = ValidationErrors::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                "page" => match value.parse::<u64>() {
                    Ok(page) => query.page = page.max(1),
                    Err(_) => errors.push("page", "must be a positive whole number"),
                },
                "pageSize" => match value.parse::<u64>() {
                    Ok(0) => query.page_size = limits.default_page_size,
                    Ok(size) => query.page_size = size.min(limits.max_page_size),
                    Err(_) => errors.push("pageSize", "must be a positive whole number"),
                },
                "sortBy" if !value.is_empty() => query.sort_by = Some(value.to_string()),
                "sortOrder" => match SortOrder::parse(value) {
                    Some(order) => query.sort_order = order,
                    None => errors.push("sortOrder", "must be asc or desc"),
                },
                _ => {
                    if let Some(captures) = FILTER_KEY.as_ref().and_then(|re| re.captures(key)) {
                        if !value.is_empty() {
                            query.filters.insert(captures[1].to_string(), value.to_string());
                        }
                    }
                }
            }
        }

        errors.into_result().map(|_| query)
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ];
        for (column, value) in &self.filters {
            pairs.push((format!("filter[{}]", column), value.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sortBy".to_string(), sort_by.clone()));
            pairs.push(("sortOrder".to_string(), self.sort_order.as_str().to_string()));
        }
        pairs
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Reject filter and sort fields the record type does not expose.
    pub fn validate_for<T: Listable>(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for column in self.filters.keys() {
            if !T::COLUMNS.contains(&column.as_str()) {
                errors.push(
                    format!("filter[{}]", column),
                    format!("{} has no field {}", T::RESOURCE, column),
                );
            }
        }
        if let Some(sort_by) = &self.sort_by {
            if !T::COLUMNS.contains(&sort_by.as_str()) {
                errors.push("sortBy", format!("{} has no field {}", T::RESOURCE, sort_by));
            }
        }
        errors.into_result()
    }

    pub fn matches<T: Listable>(&self, record: &T) -> bool {
        self.filters.iter().all(|(column, needle)| {
            record
                .column_value(column)
                .map(|value| {
                    value
                        .to_string()
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                })
                .unwrap_or(false)
        })
    }

    /// Filter, sort and page an in-memory record set.
    pub fn apply<T: Listable>(&self, records: Vec<T>) -> Result<ListResponse<T>, ValidationErrors> {
        self.validate_for::<T>()?;

        let mut matched: Vec<T> = records.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(sort_by) = &self.sort_by {
            matched.sort_by(|a, b| {
                let ordering = compare_missing_last(
                    a.column_value(sort_by),
                    b.column_value(sort_by),
                );
                match self.sort_order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let total_count = matched.len() as u64;
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let records = matched.into_iter().skip(offset).take(page_size).collect();
        Ok(ListResponse::new(records, total_count, self))
    }
}

fn compare_missing_last(a: Option<ColumnValue>, b: Option<ColumnValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
