//! Storage-side shapes of the entities with sensitive attributes.
//!
//! Sensitive columns hold codec tokens, never plaintext. Departments, roles
//! and upload logs carry nothing sensitive and are stored as their entities.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{CompanyId, DepartmentId, EmployeeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: CompanyId,
    pub name: String,
    pub registration_number: String,
    pub registration_date: NaiveDate,
    pub address: String,
    pub employee_count: u32,
    pub contact_person: String,
    pub contact_phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    pub name: String,
    pub employee_code: Option<String>,
    pub company_id: CompanyId,
    pub department_id: Option<DepartmentId>,
    pub current_role: String,
    pub join_date: NaiveDate,
    pub leave_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
