use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{DomainError, DomainResult, Entity, UploadId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Company,
    CompanyEdit,
    Employee,
    EmployeeEdit,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Company => "company",
            UploadKind::CompanyEdit => "company_edit",
            UploadKind::Employee => "employee",
            UploadKind::EmployeeEdit => "employee_edit",
        }
    }
}

impl core::fmt::Display for UploadKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UploadKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(UploadKind::Company),
            "company_edit" => Ok(UploadKind::CompanyEdit),
            "employee" => Ok(UploadKind::Employee),
            "employee_edit" => Ok(UploadKind::EmployeeEdit),
            other => Err(DomainError::validation(format!("unknown upload kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Processing)
    }
}

impl core::str::FromStr for UploadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(UploadStatus::Processing),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(DomainError::validation(format!("unknown upload status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCounts {
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub errors: u32,
}

/// Durable record of one bulk upload.
///
/// Opened in `Processing`, moved exactly once to `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUploadLog {
    pub id: UploadId,
    pub user_id: UserId,
    pub file_name: String,
    pub file_size: u64,
    pub kind: UploadKind,
    pub counts: UploadCounts,
    pub error_details: Option<String>,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkUploadLog {
    pub fn open(
        user_id: UserId,
        file_name: impl Into<String>,
        file_size: u64,
        kind: UploadKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UploadId::new(),
            user_id,
            file_name: file_name.into(),
            file_size,
            kind,
            counts: UploadCounts::default(),
            error_details: None,
            status: UploadStatus::Processing,
            created_at: now,
            completed_at: None,
        }
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "upload {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn complete(
        &mut self,
        counts: UploadCounts,
        error_details: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_open()?;
        self.counts = counts;
        self.error_details = error_details.filter(|d| !d.is_empty());
        self.status = UploadStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, detail: impl Into<String>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.error_details = Some(detail.into());
        self.status = UploadStatus::Failed;
        self.completed_at = Some(now);
        Ok(())
    }
}

impl Entity for BulkUploadLog {
    type Id = UploadId;

    fn id(&self) -> UploadId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> BulkUploadLog {
        BulkUploadLog::open(UserId::new(), "staff.csv", 512, UploadKind::Employee, Utc::now())
    }

    #[test]
    fn completes_once() {
        let mut log = log();
        let counts = UploadCounts {
            processed: 3,
            created: 2,
            updated: 0,
            errors: 1,
        };
        log.complete(counts, Some("Row 3: bad date".to_string()), Utc::now()).unwrap();
        assert_eq!(log.status, UploadStatus::Completed);
        assert_eq!(log.counts, counts);
        assert!(log.completed_at.is_some());

        assert!(matches!(log.fail("late", Utc::now()), Err(DomainError::Conflict(_))));
        assert_eq!(log.status, UploadStatus::Completed);
    }

    #[test]
    fn failed_log_cannot_complete() {
        let mut log = log();
        log.fail("Missing required columns: role", Utc::now()).unwrap();
        assert!(log.complete(UploadCounts::default(), None, Utc::now()).is_err());
        assert_eq!(log.error_details.as_deref(), Some("Missing required columns: role"));
    }

    #[test]
    fn empty_detail_is_stored_as_none() {
        let mut log = log();
        log.complete(UploadCounts::default(), Some(String::new()), Utc::now()).unwrap();
        assert_eq!(log.error_details, None);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            UploadKind::Company,
            UploadKind::CompanyEdit,
            UploadKind::Employee,
            UploadKind::EmployeeEdit,
        ] {
            assert_eq!(kind.as_str().parse::<UploadKind>(), Ok(kind));
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{kind}\""));
        }
    }
}
