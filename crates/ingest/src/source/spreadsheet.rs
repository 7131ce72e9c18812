use std::io::Cursor;

use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};

use crate::outcome::FileError;
use crate::source::{Row, RowSource, normalize_header};

/// Rows of the first worksheet of an Excel or OpenDocument workbook.
///
/// The sheet is converted to text up front; cells are rendered the way a
/// user would type them into a CSV (whole numbers without a fraction, dates
/// as `YYYY-MM-DD`).
pub struct SpreadsheetRows {
    headers: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl SpreadsheetRows {
    pub fn new(bytes: Vec<u8>) -> Result<Self, FileError> {
        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| FileError::Spreadsheet(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(FileError::Empty)?
            .map_err(|e| FileError::Spreadsheet(e.to_string()))?;

        let mut sheet_rows = range.rows();
        let headers: Vec<String> = sheet_rows
            .next()
            .ok_or(FileError::Empty)?
            .iter()
            .map(|cell| normalize_header(&cell_text(cell)))
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(FileError::Empty);
        }

        let rows: Vec<Row> = sheet_rows
            .enumerate()
            .map(|(i, cells)| Row::from_cells(i + 1, &headers, cells.iter().map(cell_text)))
            .filter(|row| !row.is_blank())
            .collect();

        Ok(Self {
            headers,
            rows: rows.into_iter(),
        })
    }
}

impl Iterator for SpreadsheetRows {
    type Item = Result<Row, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(Ok)
    }
}

impl RowSource for SpreadsheetRows {
    fn headers(&self) -> &[String] {
        &self.headers
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(120.0)), "120");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn iso_dates_render_as_plain_dates() {
        let cell = Data::DateTimeIso("2021-03-04T00:00:00".to_string());
        assert_eq!(cell_text(&cell), "2021-03-04");
    }

    #[test]
    fn first_sheet_becomes_numbered_text_rows() {
        let bytes = include_bytes!("../../tests/fixtures/employees.xlsx").to_vec();
        let rows = SpreadsheetRows::new(bytes).unwrap();
        assert_eq!(
            rows.headers(),
            ["company_registration_number", "name", "role", "date_started", "employee_id", "department"]
        );

        let rows: Vec<Row> = rows.map(Result::unwrap).collect();
        assert_eq!(rows.iter().map(|r| r.number).collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(rows[0].get("date_started"), Some("2021-01-01"));
        assert_eq!(rows[0].get("employee_id"), Some("1001"));
        assert_eq!(rows[1].get("date_started"), Some("2022-05-05"));
        assert_eq!(rows[2].get("department"), None);
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        let result = SpreadsheetRows::new(b"name,role\n".to_vec());
        assert!(matches!(result, Err(FileError::Spreadsheet(_))));
    }
}
