//! PostgreSQL store over `may_postgres`.
//!
//! Writes run in SERIALIZABLE transactions. DO rows touched by an allocation
//! are locked with `FOR UPDATE`, in key order, before their balances are read.
//! A serialization failure surfaces as [`LedgerError::Conflict`]; nothing from
//! the failed unit of work is kept.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use may_postgres::types::FromSql;
use may_postgres::{Client, Row};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::params::with_converted_params;
use super::{
    deal_not_found, do_not_found, prepare_correction, prepare_deal_update, prepare_new_deal,
    prepare_new_entry, schema, LedgerStore,
};
use crate::compute::{DealInputs, MillingYieldCalculator, YieldBreakdown, YieldWarning};
use crate::config::LedgerConfig;
use crate::connection::connect_with;
use crate::error::{LedgerError, Result};
use crate::executor::{ExecError, PgExecutor, SqlExecutor};
use crate::ledger::{DoBalance, DoLedger, LiftingFilter};
use crate::model::{Commodity, Deal, DealStatus, DoAllocation, DoEntry, DoKey, MillingRun, Side};
use crate::query::sql::{list_statements, ListStatements};
use crate::query::{DealResource, ListQuery, ListResponse, Listable};
use crate::transaction::{IsolationLevel, Transaction};

const INSERT_DO_ENTRY: &str = "INSERT INTO do_entries \
    (id, committee_center, do_number, date, grain_coarse, grain_fine, grain_common, total, \
     version, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const SELECT_DO_ENTRY: &str =
    "SELECT * FROM do_entries WHERE committee_center = $1 AND do_number = $2";

const UPDATE_DO_ENTRY: &str = "UPDATE do_entries SET \
    date = $2, grain_coarse = $3, grain_fine = $4, grain_common = $5, total = $6, \
    version = $7, updated_at = $8 \
    WHERE id = $1";

const TOUCH_DO_ENTRY: &str = "UPDATE do_entries SET version = version + 1, updated_at = $3 \
    WHERE committee_center = $1 AND do_number = $2";

const CONSUMED: &str = "SELECT COALESCE(SUM(quantity), 0) AS consumed FROM deal_allocations \
    WHERE committee_center = $1 AND do_number = $2 AND ($3::uuid IS NULL OR deal_id <> $3)";

const BALANCES: &str = "SELECT e.committee_center, e.do_number, e.total, e.version, \
    COALESCE(SUM(a.quantity), 0) AS consumed \
    FROM do_entries e \
    LEFT JOIN deal_allocations a \
      ON a.committee_center = e.committee_center AND a.do_number = e.do_number";

const INSERT_DEAL: &str = "INSERT INTO deals \
    (id, commodity, commodity_name, side, deal_number, party_name, broker_name, deal_date, \
     quantity, rate, gst_percent, discount_percent, brokerage_rate, \
     amount, gst_amount, total_with_gst, discount_amount, broker_payable, payable_amount, \
     status, created_at, updated_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
            $19, $20, $21, $22)";

const UPDATE_DEAL: &str = "UPDATE deals SET \
    deal_number = $2, party_name = $3, broker_name = $4, deal_date = $5, \
    quantity = $6, rate = $7, gst_percent = $8, discount_percent = $9, brokerage_rate = $10, \
    amount = $11, gst_amount = $12, total_with_gst = $13, discount_amount = $14, \
    broker_payable = $15, payable_amount = $16, status = $17, updated_at = $18 \
    WHERE id = $1";

const INSERT_ALLOCATION: &str = "INSERT INTO deal_allocations \
    (deal_id, position, committee_center, do_number, quantity) VALUES ($1, $2, $3, $4, $5)";

const SELECT_ALLOCATIONS: &str = "SELECT deal_id, committee_center, do_number, quantity \
    FROM deal_allocations WHERE deal_id = ANY($1) ORDER BY deal_id, position";

const INSERT_MILLING_RUN: &str = "INSERT INTO milling_runs \
    (id, date, paddy_type, hopper_quantity, rice, brokens, bran, husk_tons, fine_brokens, \
     rice_percent, brokens_percent, bran_percent, husk_percent, fine_brokens_percent, \
     wastage_percent, warnings, created_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)";

pub struct PgLedgerStore {
    client: Mutex<Client>,
    calculator: MillingYieldCalculator,
}

impl PgLedgerStore {
    pub fn new(client: Client, calculator: MillingYieldCalculator) -> Self {
        Self {
            client: Mutex::new(client),
            calculator,
        }
    }

    /// Connect with the database settings and milling policy from `config`.
    pub fn connect(config: &LedgerConfig) -> Result<Self> {
        let client = connect_with(&config.database)?;
        Ok(Self::new(client, MillingYieldCalculator::from_config(config)))
    }

    /// Create the ledger tables if they don't exist yet.
    pub fn init_schema(&self) -> Result<()> {
        self.read(|executor| Ok(schema::init_schema(executor)?))
    }

    /// Run `work` in one serializable transaction. An error from `work` rolls
    /// the whole transaction back.
    fn write<R>(&self, work: impl FnOnce(&Transaction) -> Result<R>) -> Result<R> {
        let client = self.client.lock();
        let tx = Transaction::begin(client.clone(), IsolationLevel::Serializable)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn read<R>(&self, work: impl FnOnce(&PgExecutor) -> Result<R>) -> Result<R> {
        let client = self.client.lock();
        let executor = PgExecutor::new(client.clone());
        work(&executor)
    }
}

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> std::result::Result<T, ExecError> {
    row.try_get(name)
        .map_err(|e| ExecError::Decode(format!("{}: {}", name, e)))
}

fn version_column(row: &Row) -> std::result::Result<u32, ExecError> {
    let raw: i32 = column(row, "version")?;
    u32::try_from(raw).map_err(|_| ExecError::Decode(format!("version: negative value {}", raw)))
}

fn version_param(version: u32) -> std::result::Result<i32, ExecError> {
    i32::try_from(version).map_err(|_| ExecError::Query(format!("version {} out of range", version)))
}

fn entry_from_row(row: &Row) -> std::result::Result<DoEntry, ExecError> {
    let mut entry = DoEntry::new(
        column::<String>(row, "committee_center")?,
        column::<String>(row, "do_number")?,
        column::<Option<NaiveDate>>(row, "date")?,
        column::<Decimal>(row, "grain_coarse")?,
        column::<Decimal>(row, "grain_fine")?,
        column::<Decimal>(row, "grain_common")?,
    );
    entry.id = Some(column(row, "id")?);
    entry.version = version_column(row)?;
    entry.created_at = Some(column::<DateTime<Utc>>(row, "created_at")?);
    entry.updated_at = Some(column::<DateTime<Utc>>(row, "updated_at")?);
    Ok(entry)
}

fn deal_from_row(
    row: &Row,
    allocations: Vec<DoAllocation>,
) -> std::result::Result<Deal, ExecError> {
    let side_raw: String = column(row, "side")?;
    let side = Side::parse(&side_raw)
        .ok_or_else(|| ExecError::Decode(format!("side: unknown value {}", side_raw)))?;
    let status_raw: String = column(row, "status")?;
    let status = DealStatus::parse(&status_raw)
        .ok_or_else(|| ExecError::Decode(format!("status: unknown value {}", status_raw)))?;

    let inputs = DealInputs {
        quantity: column(row, "quantity")?,
        rate: column(row, "rate")?,
        gst_percent: column(row, "gst_percent")?,
        discount_percent: column(row, "discount_percent")?,
        brokerage_rate: column(row, "brokerage_rate")?,
    };
    let mut deal = Deal::new(
        Commodity::from(column::<String>(row, "commodity_name")?),
        side,
        column::<String>(row, "deal_number")?,
        column::<String>(row, "party_name")?,
        inputs,
    );
    deal.id = Some(column(row, "id")?);
    deal.broker_name = column(row, "broker_name")?;
    deal.deal_date = column(row, "deal_date")?;
    deal.status = status;
    deal.created_at = Some(column::<DateTime<Utc>>(row, "created_at")?);
    deal.updated_at = Some(column::<DateTime<Utc>>(row, "updated_at")?);
    if !allocations.is_empty() {
        deal.set_allocations(allocations);
    }
    Ok(deal)
}

fn run_from_row(row: &Row) -> std::result::Result<MillingRun, ExecError> {
    let inputs = crate::compute::YieldInputs {
        hopper_quantity: column(row, "hopper_quantity")?,
        rice: column(row, "rice")?,
        brokens: column(row, "brokens")?,
        bran: column(row, "bran")?,
        husk_tons: column(row, "husk_tons")?,
        fine_brokens: column(row, "fine_brokens")?,
    };
    let mut run = MillingRun::new(
        column::<Option<NaiveDate>>(row, "date")?,
        column::<String>(row, "paddy_type")?,
        inputs,
    );
    run.id = Some(column(row, "id")?);
    run.created_at = Some(column::<DateTime<Utc>>(row, "created_at")?);

    let rice_percent: Option<Decimal> = column(row, "rice_percent")?;
    if let Some(rice_percent) = rice_percent {
        let warnings_raw: String = column(row, "warnings")?;
        let warnings: Vec<YieldWarning> = serde_json::from_str(&warnings_raw)
            .map_err(|e| ExecError::Decode(format!("warnings: {}", e)))?;
        run.restore_percentages(Some(YieldBreakdown {
            rice_percent,
            brokens_percent: column::<Option<Decimal>>(row, "brokens_percent")?.unwrap_or_default(),
            bran_percent: column::<Option<Decimal>>(row, "bran_percent")?.unwrap_or_default(),
            husk_percent: column::<Option<Decimal>>(row, "husk_percent")?.unwrap_or_default(),
            fine_brokens_percent: column::<Option<Decimal>>(row, "fine_brokens_percent")?
                .unwrap_or_default(),
            wastage_percent: column::<Option<Decimal>>(row, "wastage_percent")?.unwrap_or_default(),
            warnings,
        }));
    }
    Ok(run)
}

/// Map a unique violation on `key` to [`LedgerError::Duplicate`].
fn duplicate_or(error: ExecError, key: &DoKey) -> LedgerError {
    if error.is_unique_violation() {
        LedgerError::Duplicate(key.clone())
    } else {
        LedgerError::from(error)
    }
}

fn insert_entry(executor: &dyn SqlExecutor, entry: &DoEntry) -> Result<()> {
    let version = version_param(entry.version)?;
    let (coarse, fine, common, total) = (
        entry.grain_coarse(),
        entry.grain_fine(),
        entry.grain_common(),
        entry.total(),
    );
    executor
        .execute(
            INSERT_DO_ENTRY,
            &[
                &entry.id,
                &entry.committee_center,
                &entry.do_number,
                &entry.date,
                &coarse,
                &fine,
                &common,
                &total,
                &version,
                &entry.created_at,
                &entry.updated_at,
            ],
        )
        .map_err(|e| duplicate_or(e, &entry.key()))?;
    Ok(())
}

fn find_entry(executor: &dyn SqlExecutor, key: &DoKey, for_update: bool) -> Result<Option<DoEntry>> {
    let sql = if for_update {
        format!("{} FOR UPDATE", SELECT_DO_ENTRY)
    } else {
        SELECT_DO_ENTRY.to_string()
    };
    let rows = executor.query_all(&sql, &[&key.committee_center, &key.do_number])?;
    match rows.first() {
        Some(row) => Ok(Some(entry_from_row(row)?)),
        None => Ok(None),
    }
}

fn consumed(executor: &dyn SqlExecutor, key: &DoKey, excluded_deal: Option<Uuid>) -> Result<Decimal> {
    let row = executor.query_one(
        CONSUMED,
        &[&key.committee_center, &key.do_number, &excluded_deal],
    )?;
    Ok(column(&row, "consumed")?)
}

/// Lock the DO rows for `keys` and read their balances, ignoring
/// `excluded_deal`'s own allocations. Keys that don't exist are left out, so
/// the ledger reports them as unknown.
fn lock_ledger(
    executor: &dyn SqlExecutor,
    keys: &BTreeSet<DoKey>,
    excluded_deal: Option<Uuid>,
) -> Result<DoLedger> {
    let mut ledger = DoLedger::default();
    for key in keys {
        if let Some(entry) = find_entry(executor, key, true)? {
            ledger.insert_entitlement(key.clone(), entry.total(), entry.version);
            ledger.add_consumption(key.clone(), consumed(executor, key, excluded_deal)?);
        }
    }
    Ok(ledger)
}

fn touch(executor: &dyn SqlExecutor, keys: &BTreeSet<DoKey>) -> Result<()> {
    let now = Utc::now();
    for key in keys {
        executor.execute(TOUCH_DO_ENTRY, &[&key.committee_center, &key.do_number, &now])?;
    }
    Ok(())
}

fn allocation_keys(deal: &Deal) -> BTreeSet<DoKey> {
    deal.do_allocations().iter().map(|a| a.key()).collect()
}

fn insert_allocations(executor: &dyn SqlExecutor, deal_id: Uuid, deal: &Deal) -> Result<()> {
    for (position, allocation) in deal.do_allocations().iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| ExecError::Query(format!("allocation {} out of range", position)))?;
        executor.execute(
            INSERT_ALLOCATION,
            &[
                &deal_id,
                &position,
                &allocation.committee_center,
                &allocation.do_number,
                &allocation.quantity,
            ],
        )?;
    }
    Ok(())
}

fn load_allocations(
    executor: &dyn SqlExecutor,
    deal_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<DoAllocation>>> {
    let mut allocations: HashMap<Uuid, Vec<DoAllocation>> = HashMap::new();
    if deal_ids.is_empty() {
        return Ok(allocations);
    }
    let ids = deal_ids.to_vec();
    for row in executor.query_all(SELECT_ALLOCATIONS, &[&ids])? {
        let deal_id: Uuid = column(&row, "deal_id")?;
        allocations.entry(deal_id).or_default().push(DoAllocation::new(
            column::<String>(&row, "committee_center")?,
            column::<String>(&row, "do_number")?,
            column::<Decimal>(&row, "quantity")?,
        ));
    }
    Ok(allocations)
}

fn find_deal(executor: &dyn SqlExecutor, id: Uuid, for_update: bool) -> Result<Deal> {
    let sql = if for_update {
        "SELECT * FROM deals WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM deals WHERE id = $1"
    };
    let rows = executor.query_all(sql, &[&id])?;
    let row = rows.first().ok_or_else(|| deal_not_found(id))?;
    let mut allocations = load_allocations(executor, &[id])?;
    Ok(deal_from_row(row, allocations.remove(&id).unwrap_or_default())?)
}

/// One page of `T` plus the total count of matching rows.
fn list_page<T: Listable>(
    executor: &dyn SqlExecutor,
    query: &ListQuery,
    scope: &[(&str, String)],
) -> Result<(Vec<Row>, u64)> {
    let ListStatements { select, count } = list_statements::<T>(query, scope)?;
    let rows = with_converted_params(&select.1, |params| executor.query_all(&select.0, params))?;
    let count_row =
        with_converted_params(&count.1, |params| executor.query_one(&count.0, params))?;
    let total: i64 = count_row
        .try_get(0)
        .map_err(|e| ExecError::Decode(format!("count: {}", e)))?;
    Ok((rows, u64::try_from(total).unwrap_or_default()))
}

fn balances(executor: &dyn SqlExecutor, key: Option<&DoKey>) -> Result<DoLedger> {
    let rows = match key {
        Some(key) => executor.query_all(
            &format!(
                "{} WHERE e.committee_center = $1 AND e.do_number = $2 GROUP BY e.id",
                BALANCES
            ),
            &[&key.committee_center, &key.do_number],
        )?,
        None => executor.query_all(&format!("{} GROUP BY e.id", BALANCES), &[])?,
    };

    let mut ledger = DoLedger::default();
    for row in &rows {
        let key = DoKey::new(
            column::<String>(row, "committee_center")?,
            column::<String>(row, "do_number")?,
        );
        ledger.insert_entitlement(key.clone(), column(row, "total")?, version_column(row)?);
        ledger.add_consumption(key, column(row, "consumed")?);
    }
    Ok(ledger)
}

impl LedgerStore for PgLedgerStore {
    fn insert_do_entry(&self, entry: DoEntry) -> Result<DoEntry> {
        let entry = prepare_new_entry(entry)?;
        self.write(|tx| insert_entry(tx, &entry))?;
        log::info!("created DO entry {}", entry.key());
        Ok(entry)
    }

    fn insert_do_entries(&self, entries: Vec<DoEntry>) -> Result<Vec<DoEntry>> {
        let prepared = entries
            .into_iter()
            .map(prepare_new_entry)
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::new();
        for entry in &prepared {
            if !seen.insert(entry.key()) {
                return Err(LedgerError::Duplicate(entry.key()));
            }
        }

        self.write(|tx| {
            for entry in &prepared {
                insert_entry(tx, entry)?;
            }
            Ok(())
        })?;
        Ok(prepared)
    }

    fn correct_do_entry(&self, entry: DoEntry, expected_version: u32) -> Result<DoEntry> {
        let key = entry.key();
        let corrected = self.write(|tx| {
            let stored = find_entry(tx, &key, true)?.ok_or_else(|| do_not_found(&key))?;
            let corrected = prepare_correction(&stored, entry, expected_version)?;

            let mut ledger = DoLedger::default();
            ledger.add_consumption(key.clone(), consumed(tx, &key, None)?);
            ledger.check_correction(&corrected)?;

            let version = version_param(corrected.version)?;
            let (coarse, fine, common, total) = (
                corrected.grain_coarse(),
                corrected.grain_fine(),
                corrected.grain_common(),
                corrected.total(),
            );
            tx.execute(
                UPDATE_DO_ENTRY,
                &[
                    &corrected.id,
                    &corrected.date,
                    &coarse,
                    &fine,
                    &common,
                    &total,
                    &version,
                    &corrected.updated_at,
                ],
            )?;
            Ok(corrected)
        })?;
        log::info!("corrected DO entry {} (version {})", key, corrected.version);
        Ok(corrected)
    }

    fn get_do_entry(&self, key: &DoKey) -> Result<DoEntry> {
        self.read(|executor| find_entry(executor, key, false)?.ok_or_else(|| do_not_found(key)))
    }

    fn list_do_entries(&self, query: &ListQuery) -> Result<ListResponse<DoEntry>> {
        self.read(|executor| {
            let (rows, total) = list_page::<DoEntry>(executor, query, &[])?;
            let records = rows
                .iter()
                .map(entry_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ListResponse::new(records, total, query))
        })
    }

    fn create_deal(&self, deal: Deal) -> Result<Deal> {
        let deal = prepare_new_deal(deal)?;
        let id = deal.id.ok_or_else(|| LedgerError::Store("deal has no id".to_string()))?;
        self.write(|tx| {
            let keys = allocation_keys(&deal);
            lock_ledger(tx, &keys, None)?.check_allocations(deal.do_allocations())?;

            let commodity = deal.commodity.slug();
            let commodity_name = String::from(deal.commodity.clone());
            let side = deal.side.as_str();
            let status = deal.status.as_str();
            let inputs = deal.inputs();
            let figures = deal.figures();
            tx.execute(
                INSERT_DEAL,
                &[
                    &id,
                    &commodity,
                    &commodity_name,
                    &side,
                    &deal.deal_number,
                    &deal.party_name,
                    &deal.broker_name,
                    &deal.deal_date,
                    &inputs.quantity,
                    &inputs.rate,
                    &inputs.gst_percent,
                    &inputs.discount_percent,
                    &inputs.brokerage_rate,
                    &figures.amount,
                    &figures.gst_amount,
                    &figures.total_with_gst,
                    &figures.discount_amount,
                    &figures.broker_payable,
                    &figures.payable_amount,
                    &status,
                    &deal.created_at,
                    &deal.updated_at,
                ],
            )?;
            insert_allocations(tx, id, &deal)?;
            touch(tx, &keys)
        })?;
        log::info!(
            "created {} deal {} for {}",
            deal.resource(),
            deal.deal_number,
            deal.party_name
        );
        Ok(deal)
    }

    fn update_deal(&self, id: Uuid, deal: Deal) -> Result<Deal> {
        self.write(|tx| {
            let stored = find_deal(tx, id, true)?;
            let updated = prepare_deal_update(&stored, deal)?;

            let mut keys = allocation_keys(&stored);
            keys.extend(allocation_keys(&updated));
            lock_ledger(tx, &keys, Some(id))?.check_allocations(updated.do_allocations())?;

            let status = updated.status.as_str();
            let inputs = updated.inputs();
            let figures = updated.figures();
            tx.execute(
                UPDATE_DEAL,
                &[
                    &id,
                    &updated.deal_number,
                    &updated.party_name,
                    &updated.broker_name,
                    &updated.deal_date,
                    &inputs.quantity,
                    &inputs.rate,
                    &inputs.gst_percent,
                    &inputs.discount_percent,
                    &inputs.brokerage_rate,
                    &figures.amount,
                    &figures.gst_amount,
                    &figures.total_with_gst,
                    &figures.discount_amount,
                    &figures.broker_payable,
                    &figures.payable_amount,
                    &status,
                    &updated.updated_at,
                ],
            )?;
            tx.execute("DELETE FROM deal_allocations WHERE deal_id = $1", &[&id])?;
            insert_allocations(tx, id, &updated)?;
            touch(tx, &keys)?;
            Ok(updated)
        })
    }

    fn delete_deal(&self, id: Uuid) -> Result<()> {
        self.write(|tx| {
            let stored = find_deal(tx, id, true)?;
            tx.execute("DELETE FROM deals WHERE id = $1", &[&id])?;
            touch(tx, &allocation_keys(&stored))
        })?;
        log::info!("deleted deal {}", id);
        Ok(())
    }

    fn get_deal(&self, id: Uuid) -> Result<Deal> {
        self.read(|executor| find_deal(executor, id, false))
    }

    fn list_deals(&self, resource: &DealResource, query: &ListQuery) -> Result<ListResponse<Deal>> {
        let scope = [
            ("commodity", resource.commodity.slug()),
            ("side", resource.side.as_str().to_string()),
        ];
        self.read(|executor| {
            let (rows, total) = list_page::<Deal>(executor, query, &scope)?;
            let ids = rows
                .iter()
                .map(|row| column::<Uuid>(row, "id"))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut allocations = load_allocations(executor, &ids)?;
            let records = rows
                .iter()
                .zip(&ids)
                .map(|(row, id)| deal_from_row(row, allocations.remove(id).unwrap_or_default()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ListResponse::new(records, total, query))
        })
    }

    fn remaining_balance(&self, key: &DoKey) -> Result<DoBalance> {
        self.read(|executor| {
            balances(executor, Some(key))?
                .balance(key)
                .ok_or_else(|| LedgerError::UnknownDo(key.clone()))
        })
    }

    fn remaining_lifting(&self, filter: &LiftingFilter) -> Result<Vec<DoBalance>> {
        self.read(|executor| Ok(balances(executor, None)?.remaining_lifting(filter)))
    }

    fn insert_milling_run(&self, mut run: MillingRun) -> Result<MillingRun> {
        run.compute(&self.calculator)?;
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        run.id = Some(id);
        run.created_at = Some(created_at);

        let inputs = *run.inputs();
        let pct = run.percentages();
        let percent = |f: fn(&YieldBreakdown) -> Decimal| pct.map(f);
        let warnings = serde_json::to_string(&pct.map(|p| p.warnings.clone()).unwrap_or_default())
            .map_err(|e| LedgerError::Store(format!("cannot encode yield warnings: {}", e)))?;
        let (rice, brokens, bran, husk, fine_brokens, wastage) = (
            percent(|p| p.rice_percent),
            percent(|p| p.brokens_percent),
            percent(|p| p.bran_percent),
            percent(|p| p.husk_percent),
            percent(|p| p.fine_brokens_percent),
            percent(|p| p.wastage_percent),
        );

        self.write(|tx| {
            tx.execute(
                INSERT_MILLING_RUN,
                &[
                    &id,
                    &run.date,
                    &run.paddy_type,
                    &inputs.hopper_quantity,
                    &inputs.rice,
                    &inputs.brokens,
                    &inputs.bran,
                    &inputs.husk_tons,
                    &inputs.fine_brokens,
                    &rice,
                    &brokens,
                    &bran,
                    &husk,
                    &fine_brokens,
                    &wastage,
                    &warnings,
                    &created_at,
                ],
            )?;
            Ok(())
        })?;
        log::info!("recorded milling run {} ({})", id, run.paddy_type);
        Ok(run)
    }

    fn list_milling_runs(&self, query: &ListQuery) -> Result<ListResponse<MillingRun>> {
        self.read(|executor| {
            let (rows, total) = list_page::<MillingRun>(executor, query, &[])?;
            let records = rows
                .iter()
                .map(run_from_row)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ListResponse::new(records, total, query))
        })
    }
}
