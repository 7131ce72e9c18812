//! Cell parsers shared by the reconcilers.

use chrono::{NaiveDate, NaiveDateTime};

use crate::outcome::RowError;
use crate::source::Row;

// Month-first before day-first for slashed dates.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_date(column: &'static str, raw: &str) -> Result<NaiveDate, RowError> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
        .ok_or_else(|| RowError::invalid(column, format!("'{raw}' is not a date")))
}

/// Non-negative whole number; spreadsheet floats such as `12.0` are accepted.
pub fn parse_count(column: &'static str, raw: &str) -> Result<u32, RowError> {
    let raw = raw.trim();
    let invalid = || RowError::invalid(column, format!("'{raw}' is not a non-negative whole number"));
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&f) => Ok(f as u32),
        _ => Err(invalid()),
    }
}

pub fn parse_flag(column: &'static str, raw: &str) -> Result<bool, RowError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(true),
        "false" | "0" | "no" | "n" | "f" => Ok(false),
        other => Err(RowError::invalid(column, format!("'{other}' is not true or false"))),
    }
}

pub fn required<'r>(row: &'r Row, column: &'static str) -> Result<&'r str, RowError> {
    row.get(column).ok_or(RowError::Missing(column))
}

pub fn optional_date(row: &Row, column: &'static str) -> Result<Option<NaiveDate>, RowError> {
    row.get(column).map(|raw| parse_date(column, raw)).transpose()
}

/// Comma-separated list cell, trimmed, blanks dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
