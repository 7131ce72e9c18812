//! Tabular file readers.
//!
//! Every supported format is read into the same shape: a header row of
//! normalized column names followed by [`Row`]s. Reconcilers only ever see
//! rows, never the underlying format.

mod delimited;
mod spreadsheet;

use std::collections::BTreeMap;
use std::path::Path;

pub use delimited::DelimitedRows;
pub use spreadsheet::SpreadsheetRows;

use crate::outcome::FileError;

/// File formats accepted for bulk upload, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
    /// Tab- or comma-separated text; the delimiter is sniffed from the header.
    DelimitedText,
}

impl FileFormat {
    pub fn from_file_name(name: &str) -> Result<Self, FileError> {
        let extension = Path::new(name.trim())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(Self::Spreadsheet),
            "txt" | "tsv" => Ok(Self::DelimitedText),
            _ => Err(FileError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Lower-cased, trimmed column name.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// One data row keyed by normalized column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position among the data rows (the header is not counted).
    pub number: usize,
    fields: BTreeMap<String, String>,
}

impl Row {
    pub fn new(number: usize, fields: BTreeMap<String, String>) -> Self {
        Self { number, fields }
    }

    pub(crate) fn from_cells(number: usize, headers: &[String], cells: impl IntoIterator<Item = String>) -> Self {
        let fields = headers
            .iter()
            .zip(cells)
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), v))
            .collect();
        Self { number, fields }
    }

    /// Trimmed value of `column`; blank cells read as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

/// A stream of rows under a fixed header.
pub trait RowSource: Iterator<Item = Result<Row, FileError>> {
    fn headers(&self) -> &[String];

    /// Required columns that the header lacks, in the order given.
    fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.headers().iter().any(|h| h == *c))
            .map(|c| c.to_string())
            .collect()
    }
}

/// Open `bytes` as `format`. Fails before any row is produced if the file
/// cannot be decoded or has no header row.
pub fn open(format: FileFormat, bytes: Vec<u8>) -> Result<Box<dyn RowSource>, FileError> {
    Ok(match format {
        FileFormat::Csv => Box::new(DelimitedRows::new(bytes, b',')?),
        FileFormat::DelimitedText => Box::new(DelimitedRows::sniffed(bytes)?),
        FileFormat::Spreadsheet => Box::new(SpreadsheetRows::new(bytes)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_the_extension() {
        assert_eq!(FileFormat::from_file_name("staff.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("staff.xlsx").unwrap(), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_file_name("staff.txt").unwrap(), FileFormat::DelimitedText);
        assert!(matches!(
            FileFormat::from_file_name("staff.pdf"),
            Err(FileError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("staff").is_err());
    }

    #[test]
    fn headers_are_normalized() {
        assert_eq!(normalize_header("\u{feff} Registration_Number "), "registration_number");
    }

    #[test]
    fn blank_cells_read_as_absent() {
        let headers = vec!["name".to_string(), "role".to_string()];
        let row = Row::from_cells(1, &headers, vec![" Tendai ".to_string(), "  ".to_string()]);
        assert_eq!(row.get("name"), Some("Tendai"));
        assert_eq!(row.get("role"), None);
        assert_eq!(row.get("duties"), None);
        assert!(!row.is_blank());
    }
}
