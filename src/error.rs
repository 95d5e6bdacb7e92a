//! Crate-level error types.
//!
//! Errors follow the taxonomy the ledger reports to its callers:
//! input validation (nothing reaches the store), ingestion, persistence,
//! and reconciliation inconsistencies (over-allocation, overstated yields).

use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::connection::ConnectionError;
use crate::executor::ExecError;
use crate::ingest::IngestError;
use crate::model::DoKey;
use crate::transaction::TransactionError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// A single field that failed a format or range rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Every field error found on one record, collected rather than short-circuited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn push_error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether any error was recorded against `field`.
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors raised by ledger operations.
#[derive(Debug)]
pub enum LedgerError {
    /// Input failed validation; nothing was sent to the store
    Validation(ValidationErrors),
    /// Upload could not be read or yielded no rows
    Ingest(IngestError),
    /// Allocation would consume more than the DO's remaining balance
    OverAllocated {
        key: DoKey,
        requested: Decimal,
        remaining: Decimal,
    },
    /// Allocation references a DO that does not exist
    UnknownDo(DoKey),
    /// A DO correction would drop its total below what deals already consume
    EntitlementBelowConsumed {
        key: DoKey,
        total: Decimal,
        consumed: Decimal,
    },
    /// The DO changed since the caller read it
    VersionConflict {
        key: DoKey,
        expected: u32,
        actual: u32,
    },
    /// A DO entry with the same key already exists
    Duplicate(DoKey),
    /// Record not found
    NotFound { resource: &'static str, id: String },
    /// Bulk submission had no valid rows
    NothingToCommit,
    /// Yield percentages exceed 100 and the policy rejects them
    YieldsOverstated { total_percent: Decimal },
    /// Concurrent transaction conflict; the caller may resubmit
    Conflict(String),
    /// Store-level failure
    Store(String),
    /// SQL execution failure
    Database(ExecError),
    /// Configuration could not be loaded
    Config(config::ConfigError),
}

impl LedgerError {
    pub fn not_found(resource: &'static str, id: Uuid) -> Self {
        LedgerError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Reconciliation errors are rejected inputs, not infrastructure failures.
    pub fn is_reconciliation(&self) -> bool {
        matches!(
            self,
            LedgerError::OverAllocated { .. }
                | LedgerError::UnknownDo(_)
                | LedgerError::EntitlementBelowConsumed { .. }
                | LedgerError::VersionConflict { .. }
                | LedgerError::YieldsOverstated { .. }
        )
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Validation(e) => write!(f, "Validation failed: {}", e),
            LedgerError::Ingest(e) => write!(f, "Import failed: {}", e),
            LedgerError::OverAllocated {
                key,
                requested,
                remaining,
            } => write!(
                f,
                "DO {} over-allocated: requested {}, remaining {}",
                key, requested, remaining
            ),
            LedgerError::UnknownDo(key) => write!(f, "DO {} does not exist", key),
            LedgerError::EntitlementBelowConsumed {
                key,
                total,
                consumed,
            } => write!(
                f,
                "DO {} total {} is below the {} already allocated to deals",
                key, total, consumed
            ),
            LedgerError::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "DO {} changed since it was read: expected version {}, found {}",
                key, expected, actual
            ),
            LedgerError::Duplicate(key) => write!(f, "DO {} already exists", key),
            LedgerError::NotFound { resource, id } => {
                write!(f, "{} {} not found", resource, id)
            }
            LedgerError::NothingToCommit => write!(f, "No valid rows to commit"),
            LedgerError::YieldsOverstated { total_percent } => write!(
                f,
                "Yield percentages total {}%, exceeding the hopper quantity",
                total_percent
            ),
            LedgerError::Conflict(msg) => write!(f, "Concurrent update conflict: {}", msg),
            LedgerError::Store(msg) => write!(f, "Store error: {}", msg),
            LedgerError::Database(e) => write!(f, "Database error: {}", e),
            LedgerError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Validation(e) => Some(e),
            LedgerError::Ingest(e) => Some(e),
            LedgerError::Database(e) => Some(e),
            LedgerError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for LedgerError {
    fn from(errors: ValidationErrors) -> Self {
        LedgerError::Validation(errors)
    }
}

impl From<FieldError> for LedgerError {
    fn from(error: FieldError) -> Self {
        LedgerError::Validation(error.into())
    }
}

impl From<IngestError> for LedgerError {
    fn from(error: IngestError) -> Self {
        LedgerError::Ingest(error)
    }
}

impl From<ExecError> for LedgerError {
    fn from(error: ExecError) -> Self {
        if error.is_serialization_failure() {
            return LedgerError::Conflict(error.to_string());
        }
        LedgerError::Database(error)
    }
}

impl From<TransactionError> for LedgerError {
    fn from(error: TransactionError) -> Self {
        LedgerError::from(ExecError::from(error))
    }
}

impl From<ConnectionError> for LedgerError {
    fn from(error: ConnectionError) -> Self {
        LedgerError::Store(error.to_string())
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(error: config::ConfigError) -> Self {
        LedgerError::Config(error)
    }
}
