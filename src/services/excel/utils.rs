use once_cell::sync::Lazy;
use regex::Regex;

use super::types::CellValue;

/// Cells captured from every sheet for cross-project comparison charts.
pub const SNAPSHOT_CELL_REFS: [&str; 12] = [
    "B7", "B65", "B122",
    "T7", "T65", "T122",
    "AL7", "AL65", "AL122",
    "BC7", "BC65", "BC122",
];

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit regex"));

/// Reads a number written with `.` as thousands separator and `,` as the
/// decimal mark ("1.234,56" -> 1234.56).
///
/// Every `.` is stripped, grouped or not, so "1.5" reads as 15. Stored
/// campaigns were produced under this rule, keep it that way.
pub fn parse_locale_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => {
            let cleaned = s.trim().replace('.', "").replacen(',', ".", 1);
            parse_float_prefix(&cleaned)
        }
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Parses the longest leading decimal literal of `s`, ignoring whatever
/// trails it ("4.16 Pa" -> 4.16). Non-finite results are rejected.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Converts an A1-style reference into zero-based `(row, col)`.
pub fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim();
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);

    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters
        .chars()
        .try_fold(0usize, |acc, c| {
            let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            acc.checked_mul(26)?.checked_add(value)
        })?;

    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}

/// First run of ASCII digits in `text` ("Cp = 70%" -> 70).
pub fn leading_digit_run(text: &str) -> Option<f64> {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_parse_grouped_decimal() {
        assert_eq!(parse_locale_number(&text("1.234,56")), Some(1234.56));
        assert_eq!(parse_locale_number(&text("12.345.678,9")), Some(12345678.9));
        assert_eq!(parse_locale_number(&text("4,16")), Some(4.16));
        assert_eq!(parse_locale_number(&text("  0,015 ")), Some(0.015));
    }

    #[test]
    fn test_numbers_pass_through() {
        for n in [0.0, -3.5, 1e-9, 1234.5678] {
            assert_eq!(parse_locale_number(&CellValue::Number(n)), Some(n));
        }
    }

    #[test]
    fn test_absent_values() {
        assert_eq!(parse_locale_number(&CellValue::Empty), None);
        assert_eq!(parse_locale_number(&text("")), None);
        assert_eq!(parse_locale_number(&text("abc")), None);
        assert_eq!(parse_locale_number(&text("-")), None);
        assert_eq!(parse_locale_number(&CellValue::Bool(true)), None);
    }

    #[test]
    fn test_dot_is_always_stripped() {
        assert_eq!(parse_locale_number(&text("1.5")), Some(15.0));
    }

    #[test]
    fn test_trailing_text_is_ignored() {
        assert_eq!(parse_locale_number(&text("4,16 Pa")), Some(4.16));
        assert_eq!(parse_locale_number(&text("1,2,3")), Some(1.2));
        assert_eq!(parse_locale_number(&text("2,5e3x")), Some(2500.0));
        assert_eq!(parse_locale_number(&text("7e")), Some(7.0));
    }

    #[test]
    fn test_non_finite_is_absent() {
        assert_eq!(parse_locale_number(&text("1e999")), None);
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B7"), Some((6, 1)));
        assert_eq!(parse_cell_ref("T65"), Some((64, 19)));
        assert_eq!(parse_cell_ref("AL7"), Some((6, 37)));
        assert_eq!(parse_cell_ref("BC122"), Some((121, 54)));
        assert_eq!(parse_cell_ref("bc122"), Some((121, 54)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("B"), None);
        assert_eq!(parse_cell_ref("B7C"), None);
    }

    #[test]
    fn test_leading_digit_run() {
        assert_eq!(leading_digit_run("Cp = 70%"), Some(70.0));
        assert_eq!(leading_digit_run("Cp 65,5 %"), Some(65.0));
        assert_eq!(leading_digit_run("sin dato"), None);
    }
}
