//! Ledger records: DO entries, deals and milling runs.

pub mod deal;
pub mod do_entry;
pub mod milling;

pub use deal::{Commodity, Deal, DealStatus, DoAllocation, Side};
pub use do_entry::{DoEntry, DoKey, GrainKind};
pub use milling::MillingRun;
