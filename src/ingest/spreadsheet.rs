//! Reading the first worksheet of an uploaded file into [`Cell`] rows.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use super::{Cell, IngestError};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read up to `limit` rows, header included.
pub fn read_rows(path: &Path, limit: usize) -> Result<Vec<Vec<Cell>>, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(path, limit)
    } else if extension == "csv" {
        read_csv(path, limit)
    } else {
        Err(IngestError::UnsupportedFormat(extension))
    }
}

fn read_workbook(path: &Path, limit: usize) -> Result<Vec<Vec<Cell>>, IngestError> {
    let unreadable = |reason: String| IngestError::Unreadable {
        path: path.display().to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| unreadable("workbook has no worksheets".to_string()))?
        .map_err(|e| unreadable(e.to_string()))?;

    Ok(rows_from_range(&range, limit))
}

/// Rows of `range` laid out from A1. A used range that starts further in
/// (blank first rows or columns) is padded back so positions match the sheet.
fn rows_from_range(range: &Range<Data>, limit: usize) -> Vec<Vec<Cell>> {
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let blank_rows = (first_row as usize).min(limit);
    let mut rows: Vec<Vec<Cell>> = std::iter::repeat_with(Vec::new).take(blank_rows).collect();
    rows.extend(range.rows().take(limit - blank_rows).map(|row| {
        std::iter::repeat_with(|| Cell::Empty)
            .take(first_col as usize)
            .chain(row.iter().map(cell_from_data))
            .collect::<Vec<_>>()
    }));
    rows
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(text) | Data::DateTimeIso(text) => Cell::text(text),
        Data::Float(value) => Cell::Number(*value),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::DateTime(value) => Cell::DateSerial(value.as_f64()),
        Data::Bool(value) => Cell::text(&value.to_string()),
        _ => Cell::Empty,
    }
}

fn read_csv(path: &Path, limit: usize) -> Result<Vec<Vec<Cell>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| IngestError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut rows = Vec::new();
    for record in reader.records().take(limit) {
        let record = record.map_err(|e| IngestError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_rows_are_text_cells() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        writeln!(file, "Center,Sl,DO No,Date,Coarse,Fine,Common,Total").unwrap();
        writeln!(file, "Rampur,1,D-1,04/11/2024,100,,50,150").unwrap();
        writeln!(file, ",2,D-2").unwrap();

        let rows = read_rows(file.path(), 100).expect("read");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], Cell::Text("Rampur".to_string()));
        assert_eq!(rows[1][5], Cell::Empty);
        assert_eq!(rows[2].len(), 3);
    }

    #[test]
    fn test_row_limit_counts_header() {
        let mut file = tempfile::Builder::new()
            .suffix(".CSV")
            .tempfile()
            .expect("temp csv");
        for i in 0..10 {
            writeln!(file, "Rampur,{},D-{}", i, i).unwrap();
        }
        let rows = read_rows(file.path(), 4).expect("read");
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_used_range_is_placed_from_a1() {
        // Used range B2:E3: column A and row 1 are blank.
        let mut range: Range<Data> = Range::new((1, 1), (2, 4));
        range.set_value((1, 1), Data::String("Committee".to_string()));
        range.set_value((1, 3), Data::String("DO No".to_string()));
        range.set_value((2, 1), Data::String("Rampur".to_string()));
        range.set_value((2, 3), Data::String("D-1".to_string()));
        range.set_value((2, 4), Data::Float(120.0));

        let rows = rows_from_range(&range, 100);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1][1], Cell::Text("Committee".to_string()));
        assert_eq!(rows[2][0], Cell::Empty);
        assert_eq!(rows[2][1], Cell::Text("Rampur".to_string()));
        assert_eq!(rows[2][3], Cell::Text("D-1".to_string()));
        assert_eq!(rows[2][4], Cell::Number(120.0));

        assert_eq!(rows_from_range(&range, 2).len(), 2);
    }

    #[test]
    fn test_range_at_a1_is_unchanged() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 2));
        range.set_value((0, 0), Data::String("Committee".to_string()));
        range.set_value((1, 0), Data::String("Kota".to_string()));
        range.set_value((1, 2), Data::String("K-7".to_string()));

        let rows = rows_from_range(&range, 100);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], Cell::Text("Kota".to_string()));
        assert_eq!(rows[1][2], Cell::Text("K-7".to_string()));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .expect("temp file");
        let err = read_rows(file.path(), 10).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[test]
    fn test_corrupt_workbook_is_unreadable() {
        let mut file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .expect("temp file");
        file.write_all(b"this is not a zip archive").unwrap();
        let err = read_rows(file.path(), 10).unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }
}
