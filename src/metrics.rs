//! Percentage formatting and parsing shared by every report.
//!
//! Values go out as strings (`" 5.12%"`, `"-0.40%"`) and come back as ratios.
//! Parsing never fails: placeholder cells such as `"-"` or an empty string read
//! as zero.

use crate::util::parse_number_cell;

/// Format a ratio as a signed percentage with two decimals.
///
/// Non-negative values carry a leading space in the sign position, so
/// `0.0512` becomes `" 5.12%"` and `-0.0512` becomes `"-5.12%"`.
pub fn format_percent(ratio: f64) -> String {
    format_points(ratio * 100.0)
}

/// Format a value that is already expressed in percentage points.
pub fn format_points(points: f64) -> String {
    if !points.is_finite() {
        return " 0.00%".to_string();
    }
    if points.is_sign_negative() {
        format!("{points:.2}%")
    } else {
        format!(" {points:.2}%")
    }
}

/// Parse a percentage string back to a ratio. Text without any digit, or text
/// that still does not parse after stripping the `%`, yields `0.0`.
pub fn parse_percent(text: &str) -> f64 {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return 0.0;
    }
    let stripped = text.trim().trim_end_matches('%').trim();
    parse_number_cell(Some(stripped)).map_or(0.0, |v| v / 100.0)
}

pub fn parse_percent_cell(cell: Option<&str>) -> f64 {
    cell.map_or(0.0, parse_percent)
}

/// Reformat a percentage-point cell (`95.5` → `" 95.50%"`). Empty cells stay
/// empty and cells that are not numbers pass through untouched.
pub fn reformat_points_cell(cell: Option<&str>) -> Option<String> {
    let raw = cell?;
    let numeric = raw.trim().trim_end_matches('%');
    match parse_number_cell(Some(numeric)) {
        Some(v) => Some(format_points(v)),
        None => Some(raw.to_string()),
    }
}

/// Divide a scaled figure (e.g. ×10,000) back into a ratio.
pub fn rescale(value: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        return 0.0;
    }
    value / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_sign_position() {
        assert_eq!(format_percent(0.0512), " 5.12%");
        assert_eq!(format_percent(-0.0512), "-5.12%");
        assert_eq!(format_percent(1.0), " 100.00%");
        assert_eq!(format_percent(0.0), " 0.00%");
        assert_eq!(format_percent(f64::NAN), " 0.00%");
        assert_eq!(format_points(95.5), " 95.50%");
    }

    #[test]
    fn placeholders_parse_as_zero() {
        assert_eq!(parse_percent("-"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("—"), 0.0);
        assert_eq!(parse_percent("%"), 0.0);
        assert_eq!(parse_percent("1.2.3%"), 0.0);
        assert_eq!(parse_percent_cell(None), 0.0);
    }

    #[test]
    fn parses_stored_percentages() {
        assert!((parse_percent(" 5.12%") - 0.0512).abs() < 1e-12);
        assert!((parse_percent("-0.40%") + 0.004).abs() < 1e-12);
        assert!((parse_percent("12") - 0.12).abs() < 1e-12);
        assert!((parse_percent("1,250.00%") - 12.5).abs() < 1e-12);
    }

    #[test]
    fn round_trip_within_two_decimal_tolerance() {
        for step in -1000..=1000 {
            let ratio = f64::from(step) / 1000.0 + 0.000_037;
            let ratio = ratio.clamp(-1.0, 1.0);
            let back = parse_percent(&format_percent(ratio));
            assert!(
                (back - ratio).abs() <= 0.000_05 + 1e-12,
                "{ratio} came back as {back}"
            );
        }
    }

    #[test]
    fn points_cells_keep_text_and_gaps() {
        assert_eq!(reformat_points_cell(Some("95.5")).as_deref(), Some(" 95.50%"));
        assert_eq!(reformat_points_cell(Some("-1.2%")).as_deref(), Some("-1.20%"));
        assert_eq!(reformat_points_cell(Some("暂无")).as_deref(), Some("暂无"));
        assert_eq!(reformat_points_cell(None), None);
    }

    #[test]
    fn rescales_reference_scale() {
        assert_eq!(rescale(50_000.0, 10_000.0), 5.0);
        assert_eq!(format_percent(rescale(50_000.0, 10_000.0)), " 500.00%");
        assert_eq!(rescale(1.0, 0.0), 0.0);
    }
}
