//! Transactions over `may_postgres`.
//!
//! Every ledger write runs inside one transaction, so a batch or a deal with its
//! allocations is committed together or not at all. DO allocations use
//! [`IsolationLevel::Serializable`] so two submissions against the same DO cannot both
//! read the same remaining balance and both succeed.

use crate::executor::{instrumented, ExecError, SqlExecutor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read committed (PostgreSQL default)
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    fn to_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// PostgreSQL error from may_postgres
    Postgres(PostgresError),
    /// Transaction already committed or rolled back
    TransactionClosed,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Postgres(e) => write!(f, "PostgreSQL error: {}", e),
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<PostgresError> for TransactionError {
    fn from(err: PostgresError) -> Self {
        TransactionError::Postgres(err)
    }
}

impl From<TransactionError> for ExecError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Postgres(e) => ExecError::Postgres(e),
            TransactionError::TransactionClosed => {
                ExecError::Other("Transaction closed".to_string())
            }
        }
    }
}

/// A database transaction.
///
/// Dropping an open transaction rolls it back, so an early `?` return inside a
/// write path leaves nothing behind.
pub struct Transaction {
    client: Client,
    closed: bool,
}

impl Transaction {
    /// Begin a transaction at `isolation_level`.
    pub fn begin(client: Client, isolation_level: IsolationLevel) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        let sql = format!("BEGIN ISOLATION LEVEL {}", isolation_level.to_sql());
        client.execute(sql.as_str(), &[])?;

        Ok(Self {
            client,
            closed: false,
        })
    }

    /// Commit the transaction.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.closed = true;
        self.client.execute("COMMIT", &[])?;
        Ok(())
    }

    /// Roll back the transaction, discarding every change made in it.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        self.rollback_in_place()
    }

    fn rollback_in_place(&mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.closed = true;
        self.client.execute("ROLLBACK", &[])?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), ExecError> {
        if self.closed {
            return Err(ExecError::Other("Transaction is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.rollback_in_place() {
                log::warn!("rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

impl SqlExecutor for Transaction {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecError> {
        self.ensure_open()?;
        instrumented(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query(query, params))
    }
}
