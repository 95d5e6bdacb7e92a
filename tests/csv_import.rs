//! Importing a DO sheet exported as CSV.

use std::io::Write;

use chrono::NaiveDate;
use mill_ledger::config::ImportSettings;
use mill_ledger::ingest::{ingest_file, IngestError};
use mill_ledger::{BulkCommitCoordinator, DoKey, LedgerStore, ListQuery, MemoryStore};
use rust_decimal::Decimal;

fn csv_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write csv");
    file
}

const SHEET: &str = "\
Committee Center,Sl,DO Number,Date,Coarse,Fine,Common,Total
Rampur,1,D-101,05/11/2024,100,150,50,999
,2,D-102,06/11/2024,\"1,200\",,,
,3,,,,,,
Kota,4,K-7,45607,20,abc,0,20
";

#[test]
fn test_csv_sheet_to_store() {
    let file = csv_file(SHEET);
    let ingestion = ingest_file(file.path(), &ImportSettings::default()).unwrap();
    assert_eq!(ingestion.candidates.len(), 3);
    assert_eq!(ingestion.valid_count(), 3);
    assert!(!ingestion.truncated);

    let first = &ingestion.candidates[0];
    assert_eq!(first.row, 2);
    assert_eq!(first.entry.total(), Decimal::from(300));
    assert_eq!(first.entry.date, NaiveDate::from_ymd_opt(2024, 11, 5));

    let second = &ingestion.candidates[1];
    assert_eq!(second.entry.committee_center, "Rampur");
    assert_eq!(second.entry.total(), Decimal::from(1200));

    let third = &ingestion.candidates[2];
    assert_eq!(third.row, 5);
    assert_eq!(third.entry.date, NaiveDate::from_ymd_opt(2024, 11, 11));
    assert_eq!(third.entry.total(), Decimal::from(20));
    assert!(third.notes.iter().any(|n| n.contains("grainFine")));

    let store = MemoryStore::new();
    let report = BulkCommitCoordinator::new(&store).commit(&ingestion).unwrap();
    assert_eq!(report.committed.len(), 3);
    assert_eq!(report.skipped_invalid, 0);
    assert_eq!(
        store.list_do_entries(&ListQuery::default()).unwrap().total_count,
        3
    );
    let balance = store.remaining_balance(&DoKey::new("Kota", "K-7")).unwrap();
    assert_eq!(balance.remaining, Decimal::from(20));
}

#[test]
fn test_row_limit_truncates() {
    let file = csv_file(SHEET);
    let settings = ImportSettings { max_rows: 1 };
    let ingestion = ingest_file(file.path(), &settings).unwrap();
    assert!(ingestion.truncated);
    assert_eq!(ingestion.candidates.len(), 1);
}

#[test]
fn test_header_only_sheet_has_no_data() {
    let file = csv_file("Committee Center,Sl,DO Number\n");
    let err = ingest_file(file.path(), &ImportSettings::default()).unwrap_err();
    assert!(matches!(err, IngestError::NoData));
}

#[test]
fn test_unknown_extension_is_refused() {
    let file = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .expect("temp file");
    let err = ingest_file(file.path(), &ImportSettings::default()).unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(_)));
}
