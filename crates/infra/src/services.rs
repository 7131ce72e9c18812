//! Principal-aware directory operations.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use talentverify_auth::{Permission, Principal, authorize, ensure_company_access};
use talentverify_core::{CompanyId, DepartmentId, EmployeeId, SensitiveValue};
use talentverify_directory::{
    BulkUploadLog, Company, CompanyDraft, Department, EmployeeProfile, EmployeeQuery, EmployeeRole, RoleAssignment, RoleSummary,
    department_key,
};

use crate::repository::{Directory, RepositoryError};
use crate::store::{DirectoryStore, UploadAuditSink};

/// Outcome of [`Directory::scrub_undecryptable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrubReport {
    pub companies: usize,
    pub employees: usize,
}

fn is_broken(value: &Option<SensitiveValue>) -> bool {
    value.as_ref().is_some_and(SensitiveValue::is_undecryptable)
}

/// Trimmed, non-blank names with case-insensitive duplicates dropped (first spelling wins).
fn distinct_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(department_key(n)))
        .map(str::to_string)
        .collect()
}

impl<S: DirectoryStore> Directory<S> {
    /// Create a company and its initial departments in one commit.
    #[instrument(skip_all, fields(user_id = %principal.user_id), err)]
    pub fn register_company(
        &self,
        principal: &Principal,
        draft: CompanyDraft,
        departments: &[String],
        now: DateTime<Utc>,
    ) -> Result<Company, RepositoryError> {
        authorize(principal, Permission::COMPANIES_WRITE)?;
        let company = Company::register(draft, now)?;
        if let Some(key) = company.registration_key() {
            if self.company_index()?.contains_key(key) {
                return Err(RepositoryError::Conflict(format!(
                    "company with registration number '{key}' already exists"
                )));
            }
        }

        let mut uow = self.begin();
        uow.insert_company(&company)?;
        for name in distinct_names(departments) {
            uow.insert_department(Department::new(company.id, &name, now)?);
        }
        uow.commit()?;
        tracing::info!(company_id = %company.id, "company registered");
        Ok(company)
    }

    /// Make the company's departments exactly `names` (case-insensitive).
    ///
    /// Departments that stay keep their id and casing; removed ones are
    /// deleted, which nulls references from employees and roles.
    #[instrument(skip_all, fields(user_id = %principal.user_id, company_id = %company_id), err)]
    pub fn replace_departments(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        names: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<Department>, RepositoryError> {
        authorize(principal, Permission::COMPANIES_WRITE)?;
        ensure_company_access(principal, company_id)?;
        self.company(company_id)?;

        let wanted = distinct_names(names);
        let wanted_keys: HashSet<String> = wanted.iter().map(|n| department_key(n)).collect();
        let existing = self.departments(company_id)?;
        let existing_keys: HashSet<String> = existing.iter().map(|d| department_key(&d.name)).collect();

        let mut uow = self.begin();
        for department in existing.iter().filter(|d| !wanted_keys.contains(&department_key(&d.name))) {
            uow.delete_department(department.id);
        }
        for name in wanted.iter().filter(|n| !existing_keys.contains(&department_key(n))) {
            uow.insert_department(Department::new(company_id, name, now)?);
        }
        uow.commit()?;
        self.departments(company_id)
    }

    #[instrument(skip_all, fields(user_id = %principal.user_id, company_id = %id), err)]
    pub fn delete_company(&self, principal: &Principal, id: CompanyId) -> Result<(), RepositoryError> {
        authorize(principal, Permission::COMPANIES_WRITE)?;
        let mut uow = self.begin();
        uow.delete_company(id);
        uow.commit()
    }

    #[instrument(skip_all, fields(user_id = %principal.user_id, department_id = %id), err)]
    pub fn delete_department(&self, principal: &Principal, id: DepartmentId) -> Result<(), RepositoryError> {
        authorize(principal, Permission::COMPANIES_WRITE)?;
        let department = self
            .store()
            .departments(principal.company_scope())?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("department {id}")))?;
        ensure_company_access(principal, department.company_id)?;
        let mut uow = self.begin();
        uow.delete_department(id);
        uow.commit()
    }

    #[instrument(skip_all, fields(user_id = %principal.user_id, employee_id = %id), err)]
    pub fn delete_employee(&self, principal: &Principal, id: EmployeeId) -> Result<(), RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_WRITE)?;
        let employee = self.employee(id)?;
        ensure_company_access(principal, employee.company_id)?;
        let mut uow = self.begin();
        uow.delete_employee(id);
        uow.refresh_employee_count(employee.company_id);
        uow.commit()
    }

    /// Role history, newest first.
    pub fn role_history(&self, principal: &Principal, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_READ)?;
        let employee = self.employee(employee_id)?;
        ensure_company_access(principal, employee.company_id)?;
        self.roles(employee_id)
    }

    /// Append a role. An open-ended role becomes the current one.
    #[instrument(skip_all, fields(user_id = %principal.user_id, employee_id = %employee_id), err)]
    pub fn add_role(
        &self,
        principal: &Principal,
        employee_id: EmployeeId,
        assignment: RoleAssignment,
        now: DateTime<Utc>,
    ) -> Result<EmployeeRole, RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_WRITE)?;
        let mut employee = self.employee(employee_id)?;
        ensure_company_access(principal, employee.company_id)?;
        ensure_company_access(principal, assignment.company_id)?;

        let previous_company = employee.company_id;
        let role = employee.assign_role(assignment, now)?;

        let mut uow = self.begin();
        if role.is_current {
            uow.update_employee(&employee)?;
        }
        uow.insert_role(role.clone());
        uow.refresh_employee_count(previous_company);
        if employee.company_id != previous_company {
            uow.refresh_employee_count(employee.company_id);
        }
        uow.commit()?;
        Ok(role)
    }

    /// Decrypt the visible employees and filter them in memory.
    pub fn search_employees(
        &self,
        principal: &Principal,
        query: &EmployeeQuery,
    ) -> Result<Vec<EmployeeProfile>, RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_READ)?;
        let scope = principal.company_scope();

        let company_names: HashMap<CompanyId, String> =
            self.store().companies()?.into_iter().map(|c| (c.id, c.name)).collect();
        let department_names: HashMap<DepartmentId, String> =
            self.store().departments(None)?.into_iter().map(|d| (d.id, d.name)).collect();
        let name_of = |id: CompanyId| company_names.get(&id).cloned().unwrap_or_default();

        let mut results = Vec::new();
        for employee in self.employees(scope)? {
            let history = if query.needs_history() {
                self.roles(employee.id)?
                    .into_iter()
                    .map(|r| RoleSummary {
                        company_name: name_of(r.company_id),
                        department_name: r.department_id.and_then(|d| department_names.get(&d).cloned()),
                        title: r.title,
                        start_date: r.start_date,
                        end_date: r.end_date,
                        duties: r.duties,
                        is_current: r.is_current,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            let profile = EmployeeProfile {
                company_name: name_of(employee.company_id),
                department_name: employee.department_id.and_then(|d| department_names.get(&d).cloned()),
                employee,
                history,
            };
            if query.matches(&profile) {
                results.push(profile);
            }
        }
        Ok(results)
    }

    /// Clear optional sensitive fields whose tokens no longer decrypt.
    ///
    /// Registration numbers are required and are left alone.
    #[instrument(skip_all, fields(user_id = %principal.user_id), err)]
    pub fn scrub_undecryptable(&self, principal: &Principal, now: DateTime<Utc>) -> Result<ScrubReport, RepositoryError> {
        authorize(principal, Permission::MAINTENANCE)?;
        let mut report = ScrubReport::default();
        let mut uow = self.begin();

        for mut company in self.companies()? {
            if is_broken(&company.contact_phone) || is_broken(&company.email) {
                if is_broken(&company.contact_phone) {
                    company.contact_phone = None;
                }
                if is_broken(&company.email) {
                    company.email = None;
                }
                company.updated_at = now;
                uow.update_company(&company)?;
                report.companies += 1;
            }
        }

        for mut employee in self.employees(None)? {
            if is_broken(&employee.employee_code) {
                employee.employee_code = None;
                employee.updated_at = now;
                uow.update_employee(&employee)?;
                report.employees += 1;
            }
        }

        uow.commit()?;
        tracing::info!(
            companies = report.companies,
            employees = report.employees,
            "scrubbed undecryptable fields"
        );
        Ok(report)
    }
}

impl<S: DirectoryStore + UploadAuditSink> Directory<S> {
    /// Upload logs, newest first.
    ///
    /// Company users only ever see their own uploads; staff see everyone's
    /// unless `mine` is set.
    pub fn upload_history(&self, principal: &Principal, mine: bool) -> Result<Vec<BulkUploadLog>, RepositoryError> {
        authorize(principal, Permission::EMPLOYEES_READ)?;
        let user = (mine || principal.company_scope().is_some()).then_some(principal.user_id);
        Ok(self.store().uploads(user)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use talentverify_auth::{AuthzError, UserRole};
    use talentverify_core::UserId;
    use talentverify_crypto::FieldCodec;
    use talentverify_directory::{Employee, EmployeeDraft, UploadKind};

    use crate::store::{Change, ChangeSet, InMemoryDirectoryStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn directory() -> Directory<InMemoryDirectoryStore> {
        Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(FieldCodec::from_key([3u8; 32])),
        )
    }

    fn staff() -> Principal {
        Principal::staff(UserId::new())
    }

    fn draft(reg: &str) -> CompanyDraft {
        CompanyDraft {
            name: format!("Company {reg}"),
            registration_number: reg.to_string(),
            registration_date: date(2020, 1, 1),
            ..CompanyDraft::default()
        }
    }

    fn hire(dir: &Directory<InMemoryDirectoryStore>, company_id: CompanyId, name: &str) -> Employee {
        let (employee, role) = Employee::hire(
            EmployeeDraft {
                name: name.to_string(),
                employee_code: Some(format!("EMP-{name}")),
                company_id,
                department_id: None,
                role: "Clerk".to_string(),
                join_date: date(2021, 1, 1),
                leave_date: None,
                duties: String::new(),
            },
            Utc::now(),
        )
        .unwrap();
        let mut uow = dir.begin();
        uow.insert_employee(&employee).unwrap();
        uow.insert_role(role);
        uow.refresh_employee_count(company_id);
        uow.commit().unwrap();
        employee
    }

    #[test]
    fn register_company_creates_departments_once_and_rejects_duplicates() {
        let dir = directory();
        let names = vec!["Engineering".to_string(), "engineering ".to_string(), " ".to_string(), "Sales".to_string()];
        let acme = dir.register_company(&staff(), draft("REG1"), &names, Utc::now()).unwrap();

        let departments = dir.departments(acme.id).unwrap();
        assert_eq!(departments.len(), 2);
        assert!(departments.iter().any(|d| d.name == "Engineering"));

        let again = dir.register_company(&staff(), draft(" REG1"), &[], Utc::now());
        assert!(matches!(again, Err(RepositoryError::Conflict(_))));
        assert_eq!(dir.companies().unwrap().len(), 1);
    }

    #[test]
    fn company_staff_cannot_register_companies() {
        let dir = directory();
        let principal = Principal::company_user(UserId::new(), UserRole::CompanyStaff, CompanyId::new());
        let result = dir.register_company(&principal, draft("REG1"), &[], Utc::now());
        assert!(matches!(result, Err(RepositoryError::Authz(AuthzError::Forbidden(_)))));
    }

    #[test]
    fn replace_departments_keeps_matches_and_nulls_removed() {
        let dir = directory();
        let names = vec!["engineering".to_string(), "Sales".to_string()];
        let acme = dir.register_company(&staff(), draft("REG1"), &names, Utc::now()).unwrap();
        let sales = dir.find_department(acme.id, "sales").unwrap().unwrap();
        let engineering = dir.find_department(acme.id, "engineering").unwrap().unwrap();

        let mut worker = hire(&dir, acme.id, "Farai");
        worker.department_id = Some(sales.id);
        let mut uow = dir.begin();
        uow.update_employee(&worker).unwrap();
        uow.commit().unwrap();

        let replaced = dir
            .replace_departments(&staff(), acme.id, &["Engineering".to_string(), "Finance".to_string()], Utc::now())
            .unwrap();
        assert_eq!(replaced.len(), 2);
        assert!(replaced.iter().any(|d| d.id == engineering.id && d.name == "engineering"));
        assert_eq!(dir.employee(worker.id).unwrap().department_id, None);
    }

    #[test]
    fn add_role_keeps_single_current_role() {
        let dir = directory();
        let acme = dir.register_company(&staff(), draft("REG1"), &[], Utc::now()).unwrap();
        let worker = hire(&dir, acme.id, "Chipo");

        let promotion = RoleAssignment::current("Supervisor", acme.id, date(2023, 3, 1));
        dir.add_role(&staff(), worker.id, promotion, Utc::now()).unwrap();

        let history = dir.role_history(&staff(), worker.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|r| r.is_current).count(), 1);
        assert_eq!(history[0].title, "Supervisor");
        assert_eq!(dir.employee(worker.id).unwrap().current_role, "Supervisor");
    }

    #[test]
    fn company_users_only_see_their_company() {
        let dir = directory();
        let acme = dir.register_company(&staff(), draft("REG1"), &[], Utc::now()).unwrap();
        let globex = dir.register_company(&staff(), draft("REG2"), &[], Utc::now()).unwrap();
        hire(&dir, acme.id, "Tatenda");
        let outsider = hire(&dir, globex.id, "Tinashe");

        let viewer = Principal::company_user(UserId::new(), UserRole::CompanyStaff, acme.id);
        let found = dir.search_employees(&viewer, &EmployeeQuery::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].company_name, "Company REG1");

        let by_code = dir.search_employees(&staff(), &EmployeeQuery::text("emp-tinashe")).unwrap();
        assert_eq!(by_code.len(), 1);

        assert!(matches!(
            dir.role_history(&viewer, outsider.id),
            Err(RepositoryError::Authz(AuthzError::CompanyMismatch(_)))
        ));
    }

    #[test]
    fn delete_employee_refreshes_headcount() {
        let dir = directory();
        let acme = dir.register_company(&staff(), draft("REG1"), &[], Utc::now()).unwrap();
        let worker = hire(&dir, acme.id, "Rufaro");
        assert_eq!(dir.company(acme.id).unwrap().employee_count, 1);

        dir.delete_employee(&staff(), worker.id).unwrap();
        assert_eq!(dir.company(acme.id).unwrap().employee_count, 0);
        assert!(dir.roles(worker.id).unwrap().is_empty());
    }

    #[test]
    fn scrub_clears_only_broken_optional_fields() {
        let dir = directory();
        let mut company_draft = draft("REG1");
        company_draft.email = Some("hr@acme.example".to_string());
        company_draft.contact_phone = Some("+263 4 000".to_string());
        let acme = dir.register_company(&staff(), company_draft, &[], Utc::now()).unwrap();

        let mut record = dir.store().company(acme.id).unwrap().unwrap();
        record.email = Some("corrupted".to_string());
        let mut changes = ChangeSet::new();
        changes.push(Change::UpdateCompany(record));
        dir.store().commit(changes).unwrap();

        let report = dir.scrub_undecryptable(&staff(), Utc::now()).unwrap();
        assert_eq!(report, ScrubReport { companies: 1, employees: 0 });

        let scrubbed = dir.company(acme.id).unwrap();
        assert_eq!(scrubbed.email, None);
        assert_eq!(scrubbed.contact_phone, Some(SensitiveValue::plain("+263 4 000")));
    }

    #[test]
    fn company_users_only_see_their_own_uploads() {
        let dir = directory();
        let acme = dir.register_company(&staff(), draft("REG1"), &[], Utc::now()).unwrap();
        let admin = Principal::company_user(UserId::new(), UserRole::CompanyAdmin, acme.id);
        let operator = staff();
        let now = Utc::now();
        dir.store()
            .open(BulkUploadLog::open(admin.user_id, "mine.csv", 10, UploadKind::Employee, now))
            .unwrap();
        dir.store()
            .open(BulkUploadLog::open(operator.user_id, "theirs.csv", 10, UploadKind::Company, now))
            .unwrap();

        let seen = dir.upload_history(&admin, false).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].file_name, "mine.csv");

        assert_eq!(dir.upload_history(&operator, false).unwrap().len(), 2);
        let own = dir.upload_history(&operator, true).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].file_name, "theirs.csv");
    }
}
