use std::collections::{HashMap, HashSet};

use talentverify_core::{CompanyId, EmployeeId};
use talentverify_directory::{Employee, EmployeeDraft, RoleAssignment, business_key};
use talentverify_infra::{DirectoryStore, RepositoryError};

use crate::fields::{optional_date, parse_date, parse_flag, required};
use crate::outcome::{RowError, RowOutcome};
use crate::reconcile::{Context, DepartmentCache, Reconciler, stage_departments};
use crate::source::Row;

pub const EMPLOYEE_UPLOAD_COLUMNS: &[&str] = &["name", "role", "date_started"];
pub const EMPLOYEE_EDIT_COLUMNS: &[&str] = &["employee_id"];

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Creates employees with their first role.
///
/// A row is an existing employee when its code is already used in the
/// company, or, for rows without a code, when the company already has an
/// employee of that name.
pub struct EmployeeUpload<S> {
    ctx: Context<S>,
    companies: HashMap<String, CompanyId>,
    codes: HashSet<(CompanyId, String)>,
    names: HashSet<(CompanyId, String)>,
    departments: DepartmentCache,
}

impl<S: DirectoryStore> EmployeeUpload<S> {
    pub fn new(ctx: Context<S>) -> Result<Self, RepositoryError> {
        let companies = ctx.directory.company_index()?;
        let employees = ctx.directory.employees(ctx.principal.company_scope())?;

        let codes = employees
            .iter()
            .filter_map(|e| e.code_key().map(|code| (e.company_id, code.to_string())))
            .collect();
        let names = employees.iter().map(|e| (e.company_id, name_key(&e.name))).collect();

        Ok(Self {
            ctx,
            companies,
            codes,
            names,
            departments: DepartmentCache::default(),
        })
    }

    /// Company users load into their own company; staff name it per row.
    fn company_for(&self, row: &Row) -> Result<CompanyId, RowError> {
        let registration = row.get("company_registration_number").map(business_key);
        match (self.ctx.principal.company_scope(), registration) {
            (Some(own), None) => Ok(own),
            (Some(own), Some(registration)) => match self.companies.get(registration) {
                Some(id) if *id == own => Ok(own),
                _ => Err(RowError::Forbidden(format!(
                    "You don't have permission to add employees to company '{registration}'"
                ))),
            },
            (None, Some(registration)) => self.companies.get(registration).copied().ok_or_else(|| {
                RowError::NotFound(format!(
                    "Company with registration number '{registration}' not found."
                ))
            }),
            (None, None) => Err(RowError::Missing("company_registration_number")),
        }
    }
}

impl<S: DirectoryStore> Reconciler for EmployeeUpload<S> {
    fn reconcile(&mut self, row: &Row) -> Result<RowOutcome, RowError> {
        let company_id = self.company_for(row)?;
        let name = required(row, "name")?;
        let code = row.get("employee_id").map(business_key);

        match code {
            Some(code) if self.codes.contains(&(company_id, code.to_string())) => {
                return Ok(RowOutcome::SkippedExisting(format!(
                    "Employee with ID '{code}' already exists"
                )));
            }
            None if self.names.contains(&(company_id, name_key(name))) => {
                return Ok(RowOutcome::SkippedExisting(format!(
                    "Employee '{name}' already exists in this company"
                )));
            }
            _ => {}
        }

        let role = required(row, "role")?;
        let join_date = parse_date("date_started", required(row, "date_started")?)?;
        let leave_date = optional_date(row, "date_left")?;

        let directory = &self.ctx.directory;
        let now = self.ctx.now;
        let mut pending = Vec::new();
        let department_id = row
            .get("department")
            .map(|d| self.departments.resolve(directory, company_id, d, now, &mut pending))
            .transpose()?;

        let (employee, first_role) = Employee::hire(
            EmployeeDraft {
                name: name.to_string(),
                employee_code: code.map(str::to_string),
                company_id,
                department_id,
                role: role.to_string(),
                join_date,
                leave_date,
                duties: row.get("duties").unwrap_or_default().to_string(),
            },
            now,
        )?;

        let mut uow = directory.begin();
        stage_departments(&mut uow, &pending);
        uow.insert_employee(&employee)?;
        uow.insert_role(first_role);
        uow.refresh_employee_count(company_id);
        uow.commit()?;

        if let Some(code) = code {
            self.codes.insert((company_id, code.to_string()));
        }
        self.names.insert((company_id, name_key(name)));
        self.departments.remember(&pending);
        Ok(RowOutcome::Created)
    }
}

/// Applies partial updates to employees matched by employee code.
///
/// The code is looked up across every company so that a company user
/// naming another company's employee is told they may not edit it rather
/// than that it does not exist.
pub struct EmployeeEdit<S> {
    ctx: Context<S>,
    by_code: HashMap<String, Vec<(EmployeeId, CompanyId)>>,
    departments: DepartmentCache,
}

impl<S: DirectoryStore> EmployeeEdit<S> {
    pub fn new(ctx: Context<S>) -> Result<Self, RepositoryError> {
        let mut by_code: HashMap<String, Vec<(EmployeeId, CompanyId)>> = HashMap::new();
        for employee in ctx.directory.employees(None)? {
            if let Some(code) = employee.code_key() {
                by_code
                    .entry(code.to_string())
                    .or_default()
                    .push((employee.id, employee.company_id));
            }
        }
        Ok(Self {
            ctx,
            by_code,
            departments: DepartmentCache::default(),
        })
    }

    fn resolve(&self, code: &str) -> Result<EmployeeId, RowError> {
        let candidates = self.by_code.get(code).map(Vec::as_slice).unwrap_or_default();
        if candidates.is_empty() {
            return Err(RowError::NotFound(format!("Employee with ID '{code}' not found")));
        }

        let visible: Vec<EmployeeId> = match self.ctx.principal.company_scope() {
            Some(own) => candidates.iter().filter(|(_, c)| *c == own).map(|(id, _)| *id).collect(),
            None => candidates.iter().map(|(id, _)| *id).collect(),
        };
        match visible.as_slice() {
            [id] => Ok(*id),
            [] => Err(RowError::Forbidden(format!(
                "You don't have permission to edit employee with ID '{code}'"
            ))),
            _ => Err(RowError::Conflict(format!(
                "Employee ID '{code}' matches more than one employee"
            ))),
        }
    }
}

impl<S: DirectoryStore> Reconciler for EmployeeEdit<S> {
    fn reconcile(&mut self, row: &Row) -> Result<RowOutcome, RowError> {
        let code = business_key(required(row, "employee_id")?);
        let id = self.resolve(code)?;

        let directory = &self.ctx.directory;
        let now = self.ctx.now;
        let mut employee = directory.employee(id)?;
        let mut changed = false;

        if let Some(name) = row.get("name") {
            if employee.name != name {
                employee.rename(name, now)?;
                changed = true;
            }
        }

        let mut pending = Vec::new();
        if let Some(department) = row.get("department") {
            let department_id = self
                .departments
                .resolve(directory, employee.company_id, department, now, &mut pending)?;
            if employee.department_id != Some(department_id) {
                employee.department_id = Some(department_id);
                employee.updated_at = now;
                changed = true;
            }
        }

        // A different title opens a new current role; the store closes the old one.
        let mut new_role = None;
        if let Some(title) = row.get("role") {
            if title != employee.current_role {
                let start = optional_date(row, "start_date")?.unwrap_or(self.ctx.today);
                let assignment = RoleAssignment::current(title, employee.company_id, start)
                    .in_department(employee.department_id)
                    .with_duties(row.get("duties").unwrap_or_default());
                new_role = Some((start, employee.assign_role(assignment, now)?));
                changed = true;
            }
        }

        let left = optional_date(row, "date_left")?;
        if let Some(date) = left {
            employee.leave(date, now)?;
            changed = true;
        }

        if let Some(raw) = row.get("is_active") {
            let active = parse_flag("is_active", raw)?;
            if employee.is_active != active {
                employee.set_active(active, now);
                changed = true;
            }
        }

        if !changed {
            return Ok(RowOutcome::Unchanged);
        }

        let mut uow = directory.begin();
        stage_departments(&mut uow, &pending);
        uow.update_employee(&employee)?;
        if let Some((start, role)) = new_role {
            uow.close_current_roles(id, start, now);
            uow.insert_role(role);
        }
        // Leaving closes every current role, including one opened above.
        if let Some(date) = left {
            uow.close_current_roles(id, date, now);
        }
        uow.refresh_employee_count(employee.company_id);
        uow.commit()?;

        self.departments.remember(&pending);
        Ok(RowOutcome::Updated)
    }
}
