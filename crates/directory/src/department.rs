use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{CompanyId, DepartmentId, DomainError, DomainResult, Entity};

/// Lookup key for a department name: trimmed and case-folded.
///
/// Department identity within a company is case-insensitive; the stored name
/// keeps the casing it was created with.
pub fn department_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub company_id: CompanyId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn new(company_id: CompanyId, name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("department name cannot be empty"));
        }
        Ok(Self {
            id: DepartmentId::new(),
            company_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        department_key(&self.name) == department_key(name)
    }
}

impl Entity for Department {
    type Id = DepartmentId;

    fn id(&self) -> DepartmentId {
        self.id
    }
}
