//! # Mill Ledger
//!
//! Trade ledger and derived-value engine for a grain trading and milling back
//! office: DO allotments and their remaining lifting, purchase and sale deals
//! with GST, discount and brokerage figures, and milling yield breakdowns.
//!
//! Storage goes through [`store::LedgerStore`], backed either by the
//! in-process [`store::MemoryStore`] or PostgreSQL via `may_postgres`
//! ([`store::PgLedgerStore`]).

pub mod commit;
pub mod compute;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod query;
pub mod store;
pub mod transaction;

pub use commit::{BulkCommitCoordinator, BulkCommitReport, PendingSubmission};
pub use compute::{
    compute_deal, DealDraft, DealFigures, DealInputs, MillingYieldCalculator, OverstatedPolicy,
    YieldBreakdown, YieldInputs,
};
pub use config::LedgerConfig;
pub use error::{FieldError, LedgerError, Result, ValidationErrors};
pub use ingest::{ingest_file, ingest_rows, Ingestion};
pub use ledger::{DoBalance, DoLedger, LiftingFilter};
pub use model::{Commodity, Deal, DealStatus, DoAllocation, DoEntry, DoKey, MillingRun, Side};
pub use query::{ListQuery, ListResponse, MutationResponse, SortOrder};
pub use store::{LedgerStore, MemoryStore, PgLedgerStore};
