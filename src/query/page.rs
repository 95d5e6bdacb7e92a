//! Response envelopes.

use serde::{Deserialize, Serialize};

use super::ListQuery;
use crate::error::LedgerError;

/// One page of a list, with the paging state the client needs to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub records: Vec<T>,
    pub total_count: u64,
    pub page_size: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> ListResponse<T> {
    pub fn new(records: Vec<T>, total_count: u64, query: &ListQuery) -> Self {
        let page_size = query.page_size.max(1);
        let total_pages = total_count.div_ceil(page_size);
        Self {
            records,
            total_count,
            page_size,
            current_page: query.page,
            total_pages,
            has_prev: query.page > 1,
            has_next: query.page < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResponse<U> {
        ListResponse {
            records: self.records.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_size: self.page_size,
            current_page: self.current_page,
            total_pages: self.total_pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> MutationResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl<T> From<crate::error::Result<T>> for MutationResponse<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => MutationResponse::ok("ok", data),
            Err(err) => MutationResponse::from(&err),
        }
    }
}

impl<T> From<&LedgerError> for MutationResponse<T> {
    fn from(err: &LedgerError) -> Self {
        MutationResponse::failed(err.to_string())
    }
}
