//! Ledger tables.
//!
//! Column names are the snake_case forms of the record fields, so list
//! queries built from [`crate::query::ListQuery`] address them directly.

use crate::executor::{ExecError, SqlExecutor};

const DO_ENTRIES: &str = r#"
    CREATE TABLE IF NOT EXISTS do_entries (
        id UUID PRIMARY KEY,
        committee_center TEXT NOT NULL,
        do_number TEXT NOT NULL,
        date DATE,
        grain_coarse NUMERIC NOT NULL DEFAULT 0,
        grain_fine NUMERIC NOT NULL DEFAULT 0,
        grain_common NUMERIC NOT NULL DEFAULT 0,
        total NUMERIC NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT do_entries_key UNIQUE (committee_center, do_number),
        CONSTRAINT do_entries_total CHECK (total = grain_coarse + grain_fine + grain_common)
    )
"#;

const DEALS: &str = r#"
    CREATE TABLE IF NOT EXISTS deals (
        id UUID PRIMARY KEY,
        commodity TEXT NOT NULL,
        commodity_name TEXT NOT NULL,
        side TEXT NOT NULL CHECK (side IN ('purchase', 'sale')),
        deal_number TEXT NOT NULL,
        party_name TEXT NOT NULL,
        broker_name TEXT,
        deal_date DATE,
        quantity NUMERIC NOT NULL,
        rate NUMERIC NOT NULL,
        gst_percent NUMERIC NOT NULL DEFAULT 0,
        discount_percent NUMERIC NOT NULL DEFAULT 0,
        brokerage_rate NUMERIC NOT NULL DEFAULT 0,
        amount NUMERIC NOT NULL,
        gst_amount NUMERIC NOT NULL,
        total_with_gst NUMERIC NOT NULL,
        discount_amount NUMERIC NOT NULL,
        broker_payable NUMERIC NOT NULL,
        payable_amount NUMERIC NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('active', 'completed')),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
"#;

const DEAL_ALLOCATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS deal_allocations (
        deal_id UUID NOT NULL REFERENCES deals (id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        committee_center TEXT NOT NULL,
        do_number TEXT NOT NULL,
        quantity NUMERIC NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (deal_id, position),
        UNIQUE (deal_id, committee_center, do_number),
        FOREIGN KEY (committee_center, do_number)
            REFERENCES do_entries (committee_center, do_number) ON UPDATE CASCADE
    )
"#;

const MILLING_RUNS: &str = r#"
    CREATE TABLE IF NOT EXISTS milling_runs (
        id UUID PRIMARY KEY,
        date DATE NOT NULL,
        paddy_type TEXT NOT NULL,
        hopper_quantity NUMERIC NOT NULL,
        rice NUMERIC NOT NULL DEFAULT 0,
        brokens NUMERIC NOT NULL DEFAULT 0,
        bran NUMERIC NOT NULL DEFAULT 0,
        husk_tons NUMERIC NOT NULL DEFAULT 0,
        fine_brokens NUMERIC NOT NULL DEFAULT 0,
        rice_percent NUMERIC,
        brokens_percent NUMERIC,
        bran_percent NUMERIC,
        husk_percent NUMERIC,
        fine_brokens_percent NUMERIC,
        wastage_percent NUMERIC,
        warnings TEXT NOT NULL DEFAULT '[]',
        created_at TIMESTAMPTZ NOT NULL
    )
"#;

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_deals_book ON deals (commodity, side)",
    "CREATE INDEX IF NOT EXISTS idx_deal_allocations_do ON deal_allocations (committee_center, do_number)",
    "CREATE INDEX IF NOT EXISTS idx_milling_runs_date ON milling_runs (date)",
];

/// Every DDL statement, in dependency order.
pub fn statements() -> Vec<&'static str> {
    let mut all = vec![DO_ENTRIES, DEALS, DEAL_ALLOCATIONS, MILLING_RUNS];
    all.extend_from_slice(INDEXES);
    all
}

/// Create the ledger tables and indexes if they don't exist.
pub fn init_schema(executor: &dyn SqlExecutor) -> Result<(), ExecError> {
    for sql in statements() {
        executor.execute(sql, &[])?;
    }
    log::info!("ledger schema ready");
    Ok(())
}
