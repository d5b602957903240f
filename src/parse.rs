use chrono::NaiveDate;

use crate::error::{MandataError, Result};

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Convert an Excel serial date to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> NaiveDate {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    base + chrono::Duration::days(serial as i64)
}

/// Parse a spreadsheet date cell without a declared locale.
///
/// Slash dates (`D/M/Y` or `M/D/Y`) are disambiguated by component range:
/// a first component above 12 must be the day, a second component above 12
/// forces a swap. When both fit either reading, `month_first` decides; the
/// default convention is day-first.
pub fn parse_date(raw: &str, month_first: bool) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Some(parsed) = parse_slash_date(raw, month_first) {
        return parsed;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    for format in ["%d.%m.%Y", "%Y/%m/%d", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date);
        }
    }
    Err(MandataError::Other(format!("Date format not recognized: '{raw}'")))
}

/// Stricter variant rejecting dates beyond `max_date`, which catches
/// day/month swaps that would otherwise land on a plausible future date.
pub fn parse_date_strict(raw: &str, month_first: bool, max_date: NaiveDate) -> Result<NaiveDate> {
    let date = parse_date(raw, month_first)?;
    if date > max_date {
        return Err(MandataError::Other(format!(
            "Future date {date} from '{raw}'; check day/month order"
        )));
    }
    Ok(date)
}

fn parse_slash_date(raw: &str, month_first: bool) -> Option<Result<NaiveDate>> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 || parts[0].len() > 2 || parts[1].len() > 2 {
        return None;
    }
    if !(2..=4).contains(&parts[2].trim().len()) {
        return None;
    }
    let a: u32 = parts[0].trim().parse().ok()?;
    let b: u32 = parts[1].trim().parse().ok()?;
    let y: i32 = parts[2].trim().parse().ok()?;
    let year = if y < 100 { y + 2000 } else { y };

    let (day, month) = if a > 12 {
        (a, b)
    } else if b > 12 {
        (b, a)
    } else if month_first {
        (b, a)
    } else {
        (a, b)
    };

    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return Some(Err(MandataError::Other(format!("Invalid date: '{raw}'"))));
    }
    Some(
        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| MandataError::Other(format!("Invalid date: '{raw}'"))),
    )
}

// ---------------------------------------------------------------------------
// Numeric values
// ---------------------------------------------------------------------------

/// Parse a numeric cell whose separators follow an undeclared locale.
///
/// With both `,` and `.` present, whichever appears later is the decimal
/// separator. With only `,`, it is a decimal separator when at most two
/// digits follow the last comma and no run of four or more digits precedes
/// it; otherwise all commas are thousands separators. Remaining symbols
/// (currency signs, apostrophe grouping) are stripped.
pub fn parse_value(raw: &str) -> Result<f64> {
    let s = raw.trim();
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let before = &s[..comma];
            let after = &s[comma + 1..];
            let decimals = after.chars().filter(|c| c.is_ascii_digit()).count();
            if decimals <= 2 && !has_digit_run(before, 4) {
                format!("{}.{after}", before.replace(',', ""))
            } else {
                s.replace(',', "")
            }
        }
        _ => s.to_string(),
    };

    let mut cleaned = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        if c.is_ascii_digit() || c == '.' || (c == '-' && cleaned.is_empty()) {
            cleaned.push(c);
        }
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| MandataError::Other(format!("Invalid numeric value: '{raw}'")))?;
    if value.is_nan() || value < 0.0 {
        return Err(MandataError::Other(format!("Invalid numeric value: '{raw}'")));
    }
    Ok(value)
}

fn has_digit_run(s: &str, len: usize) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}
