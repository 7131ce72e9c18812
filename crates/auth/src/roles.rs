use serde::{Deserialize, Serialize};

use crate::permissions::Permission;

/// Role of a directory user.
///
/// Verification staff (`Admin`, `TalentVerifyStaff`) work across all companies;
/// company roles are bound to the user's own company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    TalentVerifyStaff,
    CompanyAdmin,
    CompanyStaff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::TalentVerifyStaff => "talent_verify_staff",
            UserRole::CompanyAdmin => "company_admin",
            UserRole::CompanyStaff => "company_staff",
        }
    }

    pub fn is_verification_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::TalentVerifyStaff)
    }

    pub fn is_company_role(&self) -> bool {
        matches!(self, UserRole::CompanyAdmin | UserRole::CompanyStaff)
    }

    /// Permissions granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Admin | UserRole::TalentVerifyStaff => &[
                Permission::COMPANIES_READ,
                Permission::COMPANIES_WRITE,
                Permission::COMPANIES_BULK,
                Permission::EMPLOYEES_READ,
                Permission::EMPLOYEES_WRITE,
                Permission::EMPLOYEES_BULK,
                Permission::DIRECTORY_STATS,
                Permission::MAINTENANCE,
            ],
            UserRole::CompanyAdmin => &[
                Permission::COMPANIES_READ,
                Permission::EMPLOYEES_READ,
                Permission::EMPLOYEES_WRITE,
                Permission::EMPLOYEES_BULK,
            ],
            UserRole::CompanyStaff => &[Permission::COMPANIES_READ, Permission::EMPLOYEES_READ],
        }
    }
}

impl core::fmt::Display for UserRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "talent_verify_staff" => Ok(UserRole::TalentVerifyStaff),
            "company_admin" => Ok(UserRole::CompanyAdmin),
            "company_staff" => Ok(UserRole::CompanyStaff),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
