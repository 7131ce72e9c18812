//! Per-row outcomes, batch reports and the engine's error types.

use serde::Serialize;
use thiserror::Error;

use talentverify_auth::AuthzError;
use talentverify_core::{DomainError, UploadId};
use talentverify_crypto::CodecError;
use talentverify_directory::UploadCounts;
use talentverify_infra::{RepositoryError, StoreError};

/// Problems with the file as a whole. The upload stops and nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("Unsupported file type. Please upload CSV, Excel, or TXT file.")]
    UnsupportedFormat(String),

    #[error("file is {size} bytes; the limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    Encoding(String),

    #[error("malformed file: {0}")]
    Malformed(String),

    #[error("unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("file has no header row")]
    Empty,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Why a single row was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing value for '{0}'")]
    Missing(&'static str),

    #[error("invalid {column}: {message}")]
    Invalid { column: &'static str, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl RowError {
    pub fn invalid(column: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            column,
            message: message.into(),
        }
    }

    /// Line written to the upload log for this row.
    ///
    /// Lookup and permission failures read as sentences of their own; the
    /// rest are wrapped as generic row errors.
    pub fn detail(&self, row: usize) -> String {
        match self {
            Self::NotFound(_) | Self::Forbidden(_) | Self::Conflict(_) => format!("Row {row}: {self}"),
            _ => format!("Error in row {row}: {self}"),
        }
    }
}

impl From<DomainError> for RowError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Rejected(other.to_string()),
        }
    }
}

impl From<RepositoryError> for RowError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Domain(d) => d.into(),
            RepositoryError::Authz(a) => Self::Forbidden(a.to_string()),
            RepositoryError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Store(StoreError::Conflict(msg)) => Self::Conflict(msg),
            RepositoryError::Store(StoreError::NotFound(msg)) => Self::NotFound(msg),
            RepositoryError::Store(StoreError::Integrity(msg)) => Self::Rejected(msg),
            other => Self::Store(other.to_string()),
        }
    }
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Created,
    Updated,
    /// Matched an existing record but carried nothing to change.
    Unchanged,
    /// Matched an existing record on an upload that only creates.
    SkippedExisting(String),
    Rejected(RowError),
}

/// Summary returned to the caller and mirrored into the upload log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub upload_id: Option<UploadId>,
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub skipped_existing: u32,
    pub errors: u32,
    pub error_details: Vec<String>,
}

impl BatchReport {
    pub fn record(&mut self, row: usize, outcome: RowOutcome) {
        self.processed += 1;
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Unchanged => {}
            RowOutcome::SkippedExisting(message) => {
                self.skipped_existing += 1;
                self.error_details.push(format!("Row {row}: {message}"));
            }
            RowOutcome::Rejected(error) => {
                self.errors += 1;
                self.error_details.push(error.detail(row));
            }
        }
    }

    pub fn counts(&self) -> UploadCounts {
        UploadCounts {
            processed: self.processed,
            created: self.created,
            updated: self.updated,
            errors: self.errors,
        }
    }
}

/// Failure of a whole upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("upload log: {0}")]
    Audit(StoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tallies_each_outcome() {
        let mut report = BatchReport::default();
        report.record(1, RowOutcome::Created);
        report.record(2, RowOutcome::SkippedExisting("Company 'REG1' already exists".to_string()));
        report.record(3, RowOutcome::Rejected(RowError::invalid("date_started", "not a date")));
        report.record(4, RowOutcome::Unchanged);

        assert_eq!(report.processed, 4);
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(
            report.error_details,
            vec![
                "Row 2: Company 'REG1' already exists".to_string(),
                "Error in row 3: invalid date_started: not a date".to_string(),
            ]
        );
        assert_eq!(report.counts().errors, 1);
    }

    #[test]
    fn lookup_failures_are_their_own_sentence() {
        let e = RowError::NotFound("Employee with ID 'EMP999' not found".to_string());
        assert_eq!(e.detail(7), "Row 7: Employee with ID 'EMP999' not found");
    }

    #[test]
    fn missing_columns_are_listed() {
        let e = FileError::MissingColumns(vec!["role".to_string(), "date_started".to_string()]);
        assert_eq!(e.to_string(), "Missing required columns: role, date_started");
    }

    #[test]
    fn store_conflicts_stay_conflicts() {
        let e: RowError = RepositoryError::Store(StoreError::Conflict("duplicate".to_string())).into();
        assert_eq!(e, RowError::Conflict("duplicate".to_string()));
    }
}
