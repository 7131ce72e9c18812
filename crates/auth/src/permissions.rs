use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. "employees.bulk").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(&'static str);

impl Permission {
    pub const COMPANIES_READ: Permission = Permission("companies.read");
    pub const COMPANIES_WRITE: Permission = Permission("companies.write");
    /// Company bulk upload and bulk edit.
    pub const COMPANIES_BULK: Permission = Permission("companies.bulk");
    pub const EMPLOYEES_READ: Permission = Permission("employees.read");
    pub const EMPLOYEES_WRITE: Permission = Permission("employees.write");
    /// Employee bulk upload and bulk edit.
    pub const EMPLOYEES_BULK: Permission = Permission("employees.bulk");
    pub const DIRECTORY_STATS: Permission = Permission("directory.stats");
    /// Maintenance operations such as scrubbing undecryptable fields.
    pub const MAINTENANCE: Permission = Permission("directory.maintenance");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}
