//! Validate, confirm, then submit.

use crate::error::{Result, ValidationErrors};
use crate::model::{Deal, DoEntry, MillingRun};

/// Record types that can be checked before submission.
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), ValidationErrors>;
}

impl Validate for DoEntry {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        DoEntry::validate(self)
    }
}

impl Validate for Deal {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        Deal::validate(self)
    }
}

impl Validate for MillingRun {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        MillingRun::validate(self)
    }
}

/// A validated record waiting for the user to confirm it.
///
/// Both [`confirm`](Self::confirm) and [`cancel`](Self::cancel) consume the
/// submission, so a staged record reaches the store at most once.
#[derive(Debug)]
#[must_use = "a staged record does nothing until confirmed or cancelled"]
pub struct PendingSubmission<T> {
    record: T,
}

impl<T: Validate> PendingSubmission<T> {
    /// Validate `record` and hold it for confirmation. Invalid records are
    /// refused here, before any store call.
    pub fn stage(record: T) -> std::result::Result<Self, ValidationErrors> {
        record.validate()?;
        Ok(Self { record })
    }

    /// The record as it will be submitted.
    pub fn preview(&self) -> &T {
        &self.record
    }

    /// Submit the record through `submit`.
    pub fn confirm<R>(self, submit: impl FnOnce(T) -> Result<R>) -> Result<R> {
        log::debug!("staged submission confirmed");
        submit(self.record)
    }

    /// Discard the submission and hand the draft back for further editing.
    pub fn cancel(self) -> T {
        log::debug!("staged submission cancelled");
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::cell::Cell;

    fn entry(center: &str) -> DoEntry {
        DoEntry::new(center, "D1", None, Decimal::from(10), Decimal::ZERO, Decimal::ZERO)
    }

    #[test]
    fn test_invalid_record_is_not_staged() {
        let errors = PendingSubmission::stage(entry("")).unwrap_err();
        assert!(errors.has("committeeCenter"));
    }

    #[test]
    fn test_confirm_submits_once() {
        let calls = Cell::new(0);
        let pending = PendingSubmission::stage(entry("Rampur")).unwrap();
        assert_eq!(pending.preview().committee_center, "Rampur");
        let total = pending
            .confirm(|record| {
                calls.set(calls.get() + 1);
                Ok(record.total())
            })
            .unwrap();
        assert_eq!(total, Decimal::from(10));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cancel_has_no_side_effect() {
        let calls = Cell::new(0);
        let pending = PendingSubmission::stage(entry("Rampur")).unwrap();
        let draft = pending.cancel();
        assert_eq!(draft.committee_center, "Rampur");
        assert_eq!(calls.get(), 0);
    }
}
