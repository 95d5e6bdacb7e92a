//! Resource paths exposed by the persistence layer.

use std::fmt;

use crate::model::{Commodity, Side};

pub const DO_ENTRIES_PATH: &str = "/do-entries";
pub const DO_ENTRIES_BULK_PATH: &str = "/do-entries/bulk";
pub const MILLING_RUNS_PATH: &str = "/milling-runs";

/// One commodity's purchase book or sale book, e.g. `/paddy-purchases`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DealResource {
    pub commodity: Commodity,
    pub side: Side,
}

impl DealResource {
    pub fn new(commodity: Commodity, side: Side) -> Self {
        Self { commodity, side }
    }

    pub fn path(&self) -> String {
        let book = match self.side {
            Side::Purchase => "purchases",
            Side::Sale => "sales",
        };
        format!("/{}-{}", self.commodity.slug(), book)
    }

    /// Parse `/{commodity}-{purchases|sales}`.
    pub fn parse_path(path: &str) -> Option<Self> {
        let name = path.trim().trim_start_matches('/').trim_end_matches('/');
        let (commodity, book) = name.rsplit_once('-')?;
        if commodity.is_empty() {
            return None;
        }
        let side = match book {
            "purchases" => Side::Purchase,
            "sales" => Side::Sale,
            _ => return None,
        };
        Some(Self::new(Commodity::from(commodity), side))
    }
}

impl fmt::Display for DealResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
