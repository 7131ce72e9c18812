use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{CompanyId, DomainError, DomainResult, Entity, SensitiveValue};

/// Normalize a business key (registration number, employee code) for comparison.
///
/// Applied to both the stored and the incoming side.
pub fn business_key(raw: &str) -> &str {
    raw.trim()
}

/// A registered company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Natural key; unique across all companies.
    pub registration_number: SensitiveValue,
    pub registration_date: NaiveDate,
    pub address: String,
    /// Cached headcount of active employees.
    pub employee_count: u32,
    pub contact_person: String,
    pub contact_phone: Option<SensitiveValue>,
    pub email: Option<SensitiveValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a company.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompanyDraft {
    pub name: String,
    pub registration_number: String,
    pub registration_date: NaiveDate,
    pub address: String,
    pub employee_count: u32,
    pub contact_person: String,
    pub contact_phone: Option<String>,
    pub email: Option<String>,
}

impl Company {
    pub fn register(draft: CompanyDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("company name cannot be empty"));
        }
        let registration_number = business_key(&draft.registration_number);
        if registration_number.is_empty() {
            return Err(DomainError::validation("registration number cannot be empty"));
        }

        Ok(Self {
            id: CompanyId::new(),
            name: name.to_string(),
            registration_number: SensitiveValue::plain(registration_number),
            registration_date: draft.registration_date,
            address: draft.address.trim().to_string(),
            employee_count: draft.employee_count,
            contact_person: draft.contact_person.trim().to_string(),
            contact_phone: non_blank(draft.contact_phone),
            email: non_blank(draft.email),
            created_at: now,
            updated_at: now,
        })
    }

    /// Trimmed registration number, if readable.
    pub fn registration_key(&self) -> Option<&str> {
        self.registration_number.key()
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("company name cannot be empty"));
        }
        self.name = name.to_string();
        Ok(())
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> CompanyId {
        self.id
    }
}

fn non_blank(value: Option<String>) -> Option<SensitiveValue> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SensitiveValue::Plain)
}
