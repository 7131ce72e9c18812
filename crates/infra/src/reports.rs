//! Dashboard statistics.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use talentverify_auth::{Permission, Principal, authorize, ensure_company_access};
use talentverify_core::{CompanyId, EmployeeId};

use crate::repository::{Directory, RepositoryError};
use crate::store::DirectoryStore;

/// Look-back window for "recent" figures.
pub const RECENT_WINDOW_DAYS: i64 = 7;

const DIRECTORY_ACTIVITY_PER_KIND: usize = 5;
const COMPANY_ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub action: String,
    pub details: String,
    pub at: DateTime<Utc>,
}

/// Directory-wide figures for verification staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub total_companies: usize,
    pub total_employees: usize,
    /// Companies plus employees created inside the window.
    pub recent_records: usize,
    pub recent_activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentHeadcount {
    pub name: String,
    /// Current roles held in the department.
    pub employee_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleActivity {
    pub employee: String,
    pub title: String,
    pub at: DateTime<Utc>,
}

/// Figures for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyStats {
    pub company_id: CompanyId,
    pub total_employees: usize,
    pub departments: Vec<DepartmentHeadcount>,
    /// Employees updated inside the window.
    pub recent_updates: usize,
    pub recent_activity: Vec<RoleActivity>,
}

impl<S: DirectoryStore> Directory<S> {
    pub fn directory_stats(&self, principal: &Principal, now: DateTime<Utc>) -> Result<DirectoryStats, RepositoryError> {
        authorize(principal, Permission::DIRECTORY_STATS)?;
        let since = now - Duration::days(RECENT_WINDOW_DAYS);

        // Names and timestamps only; no sensitive column is decrypted here.
        let mut companies = self.store().companies()?;
        let mut employees = self.store().employees(None)?;
        let company_names: HashMap<CompanyId, String> =
            companies.iter().map(|c| (c.id, c.name.clone())).collect();

        companies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        employees.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let recent_companies: Vec<_> = companies.iter().filter(|c| c.created_at >= since).collect();
        let recent_employees: Vec<_> = employees.iter().filter(|e| e.created_at >= since).collect();

        let mut recent_activity: Vec<ActivityEntry> = recent_companies
            .iter()
            .take(DIRECTORY_ACTIVITY_PER_KIND)
            .map(|c| ActivityEntry {
                action: "New Company Added".to_string(),
                details: c.name.clone(),
                at: c.created_at,
            })
            .collect();
        recent_activity.extend(recent_employees.iter().take(DIRECTORY_ACTIVITY_PER_KIND).map(|e| {
            ActivityEntry {
                action: "New Employee Added".to_string(),
                details: format!(
                    "{} at {}",
                    e.name,
                    company_names.get(&e.company_id).map(String::as_str).unwrap_or("unknown company")
                ),
                at: e.created_at,
            }
        }));

        Ok(DirectoryStats {
            total_companies: companies.len(),
            total_employees: employees.len(),
            recent_records: recent_companies.len() + recent_employees.len(),
            recent_activity,
        })
    }

    pub fn company_stats(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<CompanyStats, RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_READ)?;
        ensure_company_access(principal, company_id)?;
        if self.store().company(company_id)?.is_none() {
            return Err(RepositoryError::NotFound(format!("company {company_id}")));
        }
        let since = now - Duration::days(RECENT_WINDOW_DAYS);

        let employees = self.store().employees(Some(company_id))?;
        let roles = self.store().company_roles(company_id)?;
        let names: HashMap<EmployeeId, &str> = employees.iter().map(|e| (e.id, e.name.as_str())).collect();

        let departments = self
            .departments(company_id)?
            .into_iter()
            .map(|d| DepartmentHeadcount {
                employee_count: roles
                    .iter()
                    .filter(|r| r.is_current && r.department_id == Some(d.id))
                    .count(),
                name: d.name,
            })
            .collect();

        let recent_activity = roles
            .iter()
            .filter(|r| r.updated_at >= since)
            .take(COMPANY_ACTIVITY_LIMIT)
            .map(|r| RoleActivity {
                employee: names.get(&r.employee_id).copied().unwrap_or_default().to_string(),
                title: r.title.clone(),
                at: r.updated_at,
            })
            .collect();

        Ok(CompanyStats {
            company_id,
            total_employees: employees.len(),
            departments,
            recent_updates: employees.iter().filter(|e| e.updated_at >= since).count(),
            recent_activity,
        })
    }
}
