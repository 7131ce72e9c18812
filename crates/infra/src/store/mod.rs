//! Directory storage abstractions.
//!
//! Stores deal in records (tokens for sensitive columns) and plain entities
//! for everything else. All writes go through [`DirectoryStore::commit`]: a
//! [`ChangeSet`] is applied completely or not at all.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryDirectoryStore;
pub use postgres::PostgresDirectoryStore;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use talentverify_core::{CompanyId, DepartmentId, DomainError, EmployeeId, UploadId, UserId};
use talentverify_directory::{BulkUploadLog, Department, EmployeeRole, UploadCounts};

use crate::records::{CompanyRecord, EmployeeRecord};

/// One write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    InsertCompany(CompanyRecord),
    UpdateCompany(CompanyRecord),
    /// Cascades to departments, employees and their roles.
    DeleteCompany(CompanyId),
    /// Rejected when the company already has a department with the same
    /// case-insensitive name.
    InsertDepartment(Department),
    /// Nulls employee and role references to the department.
    DeleteDepartment(DepartmentId),
    InsertEmployee(EmployeeRecord),
    UpdateEmployee(EmployeeRecord),
    /// Cascades to the employee's roles.
    DeleteEmployee(EmployeeId),
    /// Demote every current role of the employee, ending open ones at `end_date`.
    CloseCurrentRoles {
        employee_id: EmployeeId,
        end_date: NaiveDate,
        at: DateTime<Utc>,
    },
    /// A current role demotes the employee's other current roles first.
    InsertRole(EmployeeRole),
    /// Recompute the cached headcount from active employees.
    RefreshEmployeeCount(CompanyId),
}

/// Writes that commit together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl Extend<Change> for ChangeSet {
    fn extend<T: IntoIterator<Item = Change>>(&mut self, iter: T) {
        self.changes.extend(iter);
    }
}

/// Storage error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A referenced record is missing or belongs to another company.
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(m) => StoreError::NotFound(m),
            DomainError::Conflict(m) => StoreError::Conflict(m),
            other => StoreError::Integrity(other.to_string()),
        }
    }
}

/// Directory entity store.
pub trait DirectoryStore: Send + Sync {
    fn companies(&self) -> Result<Vec<CompanyRecord>, StoreError>;

    fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError>;

    /// Departments of one company, or of all companies when `company_id` is `None`.
    fn departments(&self, company_id: Option<CompanyId>) -> Result<Vec<Department>, StoreError>;

    /// Employees whose current company is `company_id`, or all employees.
    fn employees(&self, company_id: Option<CompanyId>) -> Result<Vec<EmployeeRecord>, StoreError>;

    fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeRecord>, StoreError>;

    /// Role history of one employee, newest start date first.
    fn roles(&self, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, StoreError>;

    /// Roles held at `company_id` by anyone, most recently updated first.
    fn company_roles(&self, company_id: CompanyId) -> Result<Vec<EmployeeRole>, StoreError>;

    /// Apply all changes atomically.
    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;
}

/// Durable audit trail of bulk uploads.
///
/// Each upload gets exactly one terminal call; a second one is a `Conflict`.
pub trait UploadAuditSink: Send + Sync {
    fn open(&self, log: BulkUploadLog) -> Result<UploadId, StoreError>;

    fn mark_completed(
        &self,
        id: UploadId,
        counts: UploadCounts,
        error_details: Option<String>,
    ) -> Result<(), StoreError>;

    fn mark_failed(&self, id: UploadId, detail: &str) -> Result<(), StoreError>;

    fn upload(&self, id: UploadId) -> Result<Option<BulkUploadLog>, StoreError>;

    /// Upload history, newest first; all users when `user_id` is `None`.
    fn uploads(&self, user_id: Option<UserId>) -> Result<Vec<BulkUploadLog>, StoreError>;
}

impl<S> DirectoryStore for Arc<S>
where
    S: DirectoryStore + ?Sized,
{
    fn companies(&self) -> Result<Vec<CompanyRecord>, StoreError> {
        (**self).companies()
    }

    fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError> {
        (**self).company(id)
    }

    fn departments(&self, company_id: Option<CompanyId>) -> Result<Vec<Department>, StoreError> {
        (**self).departments(company_id)
    }

    fn employees(&self, company_id: Option<CompanyId>) -> Result<Vec<EmployeeRecord>, StoreError> {
        (**self).employees(company_id)
    }

    fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeRecord>, StoreError> {
        (**self).employee(id)
    }

    fn roles(&self, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, StoreError> {
        (**self).roles(employee_id)
    }

    fn company_roles(&self, company_id: CompanyId) -> Result<Vec<EmployeeRole>, StoreError> {
        (**self).company_roles(company_id)
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        (**self).commit(changes)
    }
}

impl<S> UploadAuditSink for Arc<S>
where
    S: UploadAuditSink + ?Sized,
{
    fn open(&self, log: BulkUploadLog) -> Result<UploadId, StoreError> {
        (**self).open(log)
    }

    fn mark_completed(
        &self,
        id: UploadId,
        counts: UploadCounts,
        error_details: Option<String>,
    ) -> Result<(), StoreError> {
        (**self).mark_completed(id, counts, error_details)
    }

    fn mark_failed(&self, id: UploadId, detail: &str) -> Result<(), StoreError> {
        (**self).mark_failed(id, detail)
    }

    fn upload(&self, id: UploadId) -> Result<Option<BulkUploadLog>, StoreError> {
        (**self).upload(id)
    }

    fn uploads(&self, user_id: Option<UserId>) -> Result<Vec<BulkUploadLog>, StoreError> {
        (**self).uploads(user_id)
    }
}
