// Utility helpers for parsing table cells.
//
// Source tables arrive as text exported from spreadsheets, so numbers may carry
// thousands separators and dates come in several layouts. This module turns
// those cells into typed values so the report code can stay clean.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Date layouts seen in the source exports, tried in order.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%Y.%m.%d", "%Y年%m月%d日"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Numeric value of a delay count or diff cell. Blank cells and placeholders
/// such as `-` or `无` give `None`; ASCII and full-width thousands separators
/// are ignored.
pub fn parse_number_cell(cell: Option<&str>) -> Option<f64> {
    let digits: String = cell?
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '，'))
        .collect();
    if digits.is_empty() || digits.chars().any(char::is_alphabetic) {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date cell in any of the layouts the exports use, including a time
/// suffix and Excel serial day numbers.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // Plain numbers in a date column are Excel serials. Eight-digit numbers
    // were already tried as `%Y%m%d` above.
    let serial = s.parse::<f64>().ok()?;
    excel_serial_to_date(serial)
}

/// Excel counts days from 1899-12-30 (the 1900 leap-year bug baked in).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Normalize a date cell to ISO `YYYY-MM-DD`. Cells that do not parse are
/// kept as they are so that a bad date never silently joins with another row.
pub fn normalize_date(s: Option<&str>) -> Option<String> {
    let raw = s?;
    match parse_date_safe(Some(raw)) {
        Some(d) => Some(d.format("%Y-%m-%d").to_string()),
        None => Some(raw.trim().to_string()),
    }
}

/// Render a numeric cell the way a spreadsheet shows it: integral values
/// without a fraction.
pub fn format_cell_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Row and file counts in log lines, grouped by thousands.
pub fn format_count<T: ToFormattedString>(count: T) -> String {
    count.to_formatted_string(&Locale::en)
}
