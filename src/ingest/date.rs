//! Spreadsheet date cells.

use chrono::{Days, NaiveDate};

/// Last serial a spreadsheet can display (9999-12-31).
const MAX_SERIAL: u64 = 2_958_465;

/// Serial of the 1900-02-29 that spreadsheets count but the calendar lacks.
const PHANTOM_LEAP_DAY: u64 = 60;

const FOUR_DIGIT_YEAR: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%d-%b-%Y"];
const TWO_DIGIT_YEAR: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];

/// Convert a 1900-epoch spreadsheet serial to a date.
///
/// Serial 1 is 1900-01-01. Serials before 60 are off by one from those after
/// it, because serial 60 stands for 1900-02-29; that day has no date and
/// yields `None`. The fractional part (time of day) is dropped.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.floor() as u64;
    if days == PHANTOM_LEAP_DAY || days > MAX_SERIAL {
        return None;
    }
    let epoch = if days < PHANTOM_LEAP_DAY {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch.checked_add_days(Days::new(days))
}

/// Parse a date typed into a cell.
///
/// Day-first layouts are accepted with `/`, `-` or `.` separators, as is ISO
/// `yyyy-mm-dd` and `dd-Mon-yyyy`. A trailing time component is ignored, and
/// a bare number is read as a serial.
pub fn parse_text(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(serial) = text.parse::<f64>() {
        return from_serial(serial);
    }

    let date_part = text.split(' ').next().unwrap_or(text);
    let date_part = match date_part.find('T') {
        Some(10) => &date_part[..10],
        _ => date_part,
    };
    let two_digit_year = date_part
        .rsplit(['/', '-', '.'])
        .next()
        .map(|year| year.len() == 2 && year.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    let formats = if two_digit_year {
        TWO_DIGIT_YEAR
    } else {
        FOUR_DIGIT_YEAR
    };

    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}
