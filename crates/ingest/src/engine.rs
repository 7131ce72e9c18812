//! The bulk upload engine.
//!
//! One call per upload: authorize, open the upload log, read the file, then
//! reconcile it row by row. File-level problems fail the log and write
//! nothing; row-level problems are collected into the report and the batch
//! carries on.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::instrument;

use talentverify_auth::{Permission, Principal, authorize};
use talentverify_directory::{BulkUploadLog, UploadKind};
use talentverify_infra::config::DEFAULT_MAX_UPLOAD_BYTES;
use talentverify_infra::{AppConfig, Directory, DirectoryStore, RepositoryError, UploadAuditSink};

use crate::outcome::{BatchReport, FileError, IngestError, RowOutcome};
use crate::reconcile::{
    COMPANY_EDIT_COLUMNS, COMPANY_UPLOAD_COLUMNS, CompanyEdit, CompanyUpload, Context, EMPLOYEE_EDIT_COLUMNS,
    EMPLOYEE_UPLOAD_COLUMNS, EmployeeEdit, EmployeeUpload, Reconciler,
};
use crate::source::{self, FileFormat, Row};

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

pub struct BulkEngine<S, A> {
    directory: Directory<S>,
    audit: Arc<A>,
    max_upload_bytes: u64,
    today: Option<NaiveDate>,
}

impl<S: DirectoryStore, A: UploadAuditSink> BulkEngine<S, A> {
    pub fn new(directory: Directory<S>, audit: Arc<A>) -> Self {
        Self {
            directory,
            audit,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            today: None,
        }
    }

    pub fn from_config(directory: Directory<S>, audit: Arc<A>, config: &AppConfig) -> Self {
        Self::new(directory, audit).with_max_upload_bytes(config.max_upload_bytes)
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Pin the date used for role changes that carry no start date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn directory(&self) -> &Directory<S> {
        &self.directory
    }

    pub fn upload_companies(&self, principal: &Principal, upload: Upload) -> Result<BatchReport, IngestError> {
        self.run(
            principal,
            upload,
            UploadKind::Company,
            Permission::COMPANIES_BULK,
            COMPANY_UPLOAD_COLUMNS,
            CompanyUpload::new,
        )
    }

    pub fn edit_companies(&self, principal: &Principal, upload: Upload) -> Result<BatchReport, IngestError> {
        self.run(
            principal,
            upload,
            UploadKind::CompanyEdit,
            Permission::COMPANIES_BULK,
            COMPANY_EDIT_COLUMNS,
            CompanyEdit::new,
        )
    }

    pub fn upload_employees(&self, principal: &Principal, upload: Upload) -> Result<BatchReport, IngestError> {
        self.run(
            principal,
            upload,
            UploadKind::Employee,
            Permission::EMPLOYEES_BULK,
            EMPLOYEE_UPLOAD_COLUMNS,
            EmployeeUpload::new,
        )
    }

    pub fn edit_employees(&self, principal: &Principal, upload: Upload) -> Result<BatchReport, IngestError> {
        self.run(
            principal,
            upload,
            UploadKind::EmployeeEdit,
            Permission::EMPLOYEES_BULK,
            EMPLOYEE_EDIT_COLUMNS,
            EmployeeEdit::new,
        )
    }

    #[instrument(
        skip_all,
        fields(user_id = %principal.user_id, kind = %kind, file = %upload.file_name),
        err
    )]
    fn run<R, F>(
        &self,
        principal: &Principal,
        upload: Upload,
        kind: UploadKind,
        permission: Permission,
        required: &[&str],
        build: F,
    ) -> Result<BatchReport, IngestError>
    where
        R: Reconciler,
        F: FnOnce(Context<S>) -> Result<R, RepositoryError>,
    {
        authorize(principal, permission)?;

        let now = Utc::now();
        let log = BulkUploadLog::open(principal.user_id, &upload.file_name, upload.bytes.len() as u64, kind, now);
        let upload_id = self.audit.open(log).map_err(IngestError::Audit)?;

        let prepared = self.read_rows(upload, required).and_then(|rows| {
            self.directory.codec().ensure_ready()?;
            let ctx = Context {
                directory: self.directory.clone(),
                principal: principal.clone(),
                today: self.today.unwrap_or_else(|| now.date_naive()),
                now,
            };
            Ok((rows, build(ctx)?))
        });
        let (rows, mut reconciler) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!(%upload_id, error = %e, "bulk upload failed");
                self.audit
                    .mark_failed(upload_id, &e.to_string())
                    .map_err(IngestError::Audit)?;
                return Err(e);
            }
        };

        let mut report = BatchReport {
            upload_id: Some(upload_id),
            ..BatchReport::default()
        };
        for row in rows {
            let outcome = reconciler.reconcile(&row).unwrap_or_else(RowOutcome::Rejected);
            if let RowOutcome::Rejected(e) = &outcome {
                tracing::warn!(%upload_id, row = row.number, error = %e, "row rejected");
            }
            report.record(row.number, outcome);
        }

        let details = (!report.error_details.is_empty()).then(|| report.error_details.join("\n"));
        self.audit
            .mark_completed(upload_id, report.counts(), details)
            .map_err(IngestError::Audit)?;

        tracing::info!(
            %upload_id,
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped_existing,
            errors = report.errors,
            "bulk upload completed"
        );
        Ok(report)
    }

    /// Read the whole file before touching the directory, so a file that
    /// turns out to be unreadable halfway writes nothing.
    fn read_rows(&self, upload: Upload, required: &[&str]) -> Result<Vec<Row>, IngestError> {
        let size = upload.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(FileError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            }
            .into());
        }

        let format = FileFormat::from_file_name(&upload.file_name)?;
        let source = source::open(format, upload.bytes)?;
        let missing = source.missing_columns(required);
        if !missing.is_empty() {
            return Err(FileError::MissingColumns(missing).into());
        }
        Ok(source.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use talentverify_auth::UserRole;
    use talentverify_core::UserId;
    use talentverify_crypto::FieldCodec;
    use talentverify_directory::UploadStatus;
    use talentverify_infra::InMemoryDirectoryStore;

    fn engine() -> (BulkEngine<InMemoryDirectoryStore, InMemoryDirectoryStore>, Arc<InMemoryDirectoryStore>) {
        let store = Arc::new(InMemoryDirectoryStore::new());
        let directory = Directory::new(Arc::clone(&store), Arc::new(FieldCodec::from_key([9u8; 32])));
        let engine = BulkEngine::new(directory, Arc::clone(&store))
            .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        (engine, store)
    }

    fn staff() -> Principal {
        Principal::staff(UserId::new())
    }

    #[test]
    fn oversized_files_fail_the_log() {
        let (engine, store) = engine();
        let engine = engine.with_max_upload_bytes(8);
        let err = engine
            .upload_companies(&staff(), Upload::new("c.csv", "name,registration_number\n"))
            .unwrap_err();
        assert!(matches!(err, IngestError::File(FileError::TooLarge { .. })));

        let logs = store.uploads(None).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, UploadStatus::Failed);
    }

    #[test]
    fn unsupported_files_are_rejected_before_reading() {
        let (engine, _) = engine();
        let err = engine
            .upload_companies(&staff(), Upload::new("companies.pdf", "%PDF"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Please upload CSV, Excel, or TXT file."
        );
    }

    #[test]
    fn missing_columns_fail_the_whole_file() {
        let (engine, store) = engine();
        let err = engine
            .upload_employees(&staff(), Upload::new("e.csv", "name\nTendai\n"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required columns: role, date_started");
        assert!(store.employees(None).unwrap().is_empty());
    }

    #[test]
    fn company_staff_cannot_bulk_load() {
        let (engine, store) = engine();
        let principal = Principal::company_user(UserId::new(), UserRole::CompanyStaff, talentverify_core::CompanyId::new());
        let err = engine
            .upload_employees(&principal, Upload::new("e.csv", "name,role,date_started\n"))
            .unwrap_err();
        assert!(matches!(err, IngestError::Authz(_)));
        // refused before a log is opened
        assert!(store.uploads(None).unwrap().is_empty());
    }

    #[test]
    fn completed_uploads_record_counts() {
        let (engine, store) = engine();
        let csv = "name,registration_number,registration_date\nAcme,REG1,2020-01-01\nBeta,REG2,not-a-date\n";
        let report = engine.upload_companies(&staff(), Upload::new("c.csv", csv)).unwrap();
        assert_eq!((report.processed, report.created, report.errors), (2, 1, 1));

        let log = store.upload(report.upload_id.unwrap()).unwrap().unwrap();
        assert_eq!(log.status, UploadStatus::Completed);
        assert_eq!(log.counts.created, 1);
        assert_eq!(
            log.error_details.as_deref(),
            Some("Error in row 2: invalid registration_date: 'not-a-date' is not a date")
        );
    }
}
