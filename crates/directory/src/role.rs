use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{CompanyId, DepartmentId, DomainError, DomainResult, EmployeeId, Entity, RoleId};

/// One entry of an employee's role history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRole {
    pub id: RoleId,
    pub employee_id: EmployeeId,
    /// Company at the time of the role.
    pub company_id: CompanyId,
    /// Weak reference; nulled when the department is deleted.
    pub department_id: Option<DepartmentId>,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub duties: String,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for appending a role to an employee's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub title: String,
    pub company_id: CompanyId,
    pub department_id: Option<DepartmentId>,
    pub start_date: NaiveDate,
    /// `None` makes the role the employee's current role.
    pub end_date: Option<NaiveDate>,
    pub duties: String,
}

impl RoleAssignment {
    pub fn current(title: impl Into<String>, company_id: CompanyId, start_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            company_id,
            department_id: None,
            start_date,
            end_date: None,
            duties: String::new(),
        }
    }

    pub fn in_department(mut self, department_id: Option<DepartmentId>) -> Self {
        self.department_id = department_id;
        self
    }

    pub fn ended(mut self, end_date: Option<NaiveDate>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn with_duties(mut self, duties: impl Into<String>) -> Self {
        self.duties = duties.into();
        self
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("role title cannot be empty"));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(DomainError::validation(format!(
                    "role end date {end} is before start date {}",
                    self.start_date
                )));
            }
        }
        Ok(())
    }
}

impl EmployeeRole {
    pub(crate) fn from_assignment(employee_id: EmployeeId, assignment: RoleAssignment, now: DateTime<Utc>) -> Self {
        Self {
            id: RoleId::new(),
            employee_id,
            company_id: assignment.company_id,
            department_id: assignment.department_id,
            title: assignment.title.trim().to_string(),
            start_date: assignment.start_date,
            is_current: assignment.end_date.is_none(),
            end_date: assignment.end_date,
            duties: assignment.duties.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Demote this role. An unset end date becomes `end`, never earlier than the start.
    pub fn close(&mut self, end: NaiveDate, now: DateTime<Utc>) {
        if !self.is_current {
            return;
        }
        self.is_current = false;
        if self.end_date.is_none() {
            self.end_date = Some(end.max(self.start_date));
        }
        self.updated_at = now;
    }
}

impl Entity for EmployeeRole {
    type Id = RoleId;

    fn id(&self) -> RoleId {
        self.id
    }
}
