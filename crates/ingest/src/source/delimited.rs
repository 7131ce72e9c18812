use std::io::Cursor;

use crate::outcome::FileError;
use crate::source::{Row, RowSource, normalize_header};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rows of a comma- or tab-separated UTF-8 file.
pub struct DelimitedRows {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    next_number: usize,
}

impl DelimitedRows {
    pub fn new(bytes: Vec<u8>, delimiter: u8) -> Result<Self, FileError> {
        let bytes = strip_bom(bytes);
        if let Err(e) = std::str::from_utf8(&bytes) {
            return Err(FileError::Encoding(format!(
                "file is not valid UTF-8 (byte {})",
                e.valid_up_to()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(Cursor::new(bytes));

        let headers: Vec<String> = reader
            .headers()
            .map_err(malformed)?
            .iter()
            .map(normalize_header)
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(FileError::Empty);
        }

        Ok(Self {
            headers,
            records: reader.into_records(),
            next_number: 1,
        })
    }

    /// Tab-separated when the header line contains a tab, comma-separated otherwise.
    pub fn sniffed(bytes: Vec<u8>) -> Result<Self, FileError> {
        let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let delimiter = if header_line.contains(&b'\t') { b'\t' } else { b',' };
        Self::new(bytes, delimiter)
    }
}

impl Iterator for DelimitedRows {
    type Item = Result<Row, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(malformed(e))),
            };
            let number = self.next_number;
            self.next_number += 1;

            let row = Row::from_cells(number, &self.headers, record.iter().map(str::to_string));
            if !row.is_blank() {
                return Some(Ok(row));
            }
        }
    }
}

impl RowSource for DelimitedRows {
    fn headers(&self) -> &[String] {
        &self.headers
    }
}

fn strip_bom(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    bytes
}

fn malformed(e: csv::Error) -> FileError {
    FileError::Malformed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(source: DelimitedRows) -> Vec<Row> {
        source.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn reads_csv_with_bom_and_padded_headers() {
        let bytes = b"\xEF\xBB\xBFName , Role\nTendai,Engineer\n".to_vec();
        let source = DelimitedRows::new(bytes, b',').unwrap();
        assert_eq!(source.headers(), ["name", "role"]);

        let rows = rows(source);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].get("role"), Some("Engineer"));
    }

    #[test]
    fn short_records_and_blank_rows_are_tolerated() {
        let bytes = b"name,role,duties\nTendai,Engineer\n,,\nRudo,Analyst,Reports\n".to_vec();
        let rows = rows(DelimitedRows::new(bytes, b',').unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("duties"), None);
        // numbering keeps the skipped blank row
        assert_eq!(rows[1].number, 3);
    }

    #[test]
    fn tab_separated_text_is_sniffed() {
        let bytes = b"name\trole\nTendai, Jr\tEngineer\n".to_vec();
        let rows = rows(DelimitedRows::sniffed(bytes).unwrap());
        assert_eq!(rows[0].get("name"), Some("Tendai, Jr"));
    }

    #[test]
    fn comma_text_falls_back_to_commas() {
        let bytes = b"name,role\nTendai,Engineer\n".to_vec();
        let rows = rows(DelimitedRows::sniffed(bytes).unwrap());
        assert_eq!(rows[0].get("role"), Some("Engineer"));
    }

    #[test]
    fn invalid_utf8_is_a_file_error() {
        let bytes = b"name,role\n\xFF\xFE,Engineer\n".to_vec();
        assert!(matches!(DelimitedRows::new(bytes, b','), Err(FileError::Encoding(_))));
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(matches!(DelimitedRows::new(Vec::new(), b','), Err(FileError::Empty)));
    }
}
