//! Normalisation of descriptions, codes, hierarchy keys and localized numbers.

use crate::model::CellValue;

/// Trims, collapses whitespace runs to one space and upper-cases. Idempotent.
pub fn normalize_description(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Description key of a cell value; empty cells yield an empty key.
pub fn description_key(value: &CellValue) -> String {
    normalize_description(&value.to_string())
}

/// Lookup key of an item code: trimmed text, integral numbers without a
/// fractional part.
pub fn code_key(value: &CellValue) -> String {
    value.trimmed()
}

/// Normalises a hierarchy code of the synthetic budget to dotted text.
///
/// Spaces are removed and commas become dots so the code reads the same in
/// every locale. Integral numbers lose their `.0`; other numbers use the
/// general format with six significant digits. Returns `None` for empty
/// cells.
pub fn normalize_hierarchy_code(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Empty => None,
        CellValue::Bool(true) => Some("True".to_string()),
        CellValue::Bool(false) => Some("False".to_string()),
        CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
            Some(format!("{}", *number as i64))
        }
        CellValue::Number(number) => Some(general_format(*number)),
        CellValue::Text(text) | CellValue::Formula(text) => {
            Some(text.replace(' ', "").replace(',', "."))
        }
    }
}

fn strip_trailing_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Six significant digits; fixed notation for exponents in `-4..6`,
/// scientific (`1.5e-05`) otherwise. Trailing zeros are dropped.
fn general_format(number: f64) -> String {
    let scientific = format!("{number:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        strip_trailing_zeros(&format!("{number:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_trailing_zeros(mantissa), exponent.abs())
    }
}

/// Depth of a dotted hierarchy code (`"3.2.1"` → 3); `-1` for blank values.
pub fn hierarchy_level(value: &CellValue) -> i32 {
    let code = match normalize_hierarchy_code(value) {
        Some(code) => code,
        None => return -1,
    };
    let code = code.trim();
    if code.is_empty() {
        return -1;
    }
    code.matches('.').count() as i32 + 1
}

/// Parses numbers written as text with a comma decimal separator, such as
/// `"1.234,56"` or `" 12,5 "`. Returns `None` when the text is not numeric.
pub fn parse_localized_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    canonical.parse::<f64>().ok().filter(|number| number.is_finite())
}
