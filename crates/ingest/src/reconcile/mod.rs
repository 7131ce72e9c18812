//! Row reconcilers, one per upload kind.
//!
//! A reconciler is built once per upload and loads the business keys it
//! needs up front, so a batch decrypts each stored key once instead of once
//! per row. Every applied row is its own unit of work: a failing row leaves
//! nothing behind, and earlier rows stay committed.

mod company;
mod employee;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use talentverify_auth::Principal;
use talentverify_core::{CompanyId, DepartmentId};
use talentverify_directory::{Department, department_key};
use talentverify_infra::{Directory, DirectoryStore, UnitOfWork};

pub use company::{COMPANY_EDIT_COLUMNS, COMPANY_UPLOAD_COLUMNS, CompanyEdit, CompanyUpload};
pub use employee::{EMPLOYEE_EDIT_COLUMNS, EMPLOYEE_UPLOAD_COLUMNS, EmployeeEdit, EmployeeUpload};

use crate::outcome::{RowError, RowOutcome};
use crate::source::Row;

pub trait Reconciler {
    fn reconcile(&mut self, row: &Row) -> Result<RowOutcome, RowError>;
}

/// Everything a reconciler needs besides the rows.
pub struct Context<S> {
    pub directory: Directory<S>,
    pub principal: Principal,
    /// Default start date for role changes without one.
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

/// Case-insensitive department lookup, loaded lazily per company.
#[derive(Default)]
pub(crate) struct DepartmentCache {
    by_company: HashMap<CompanyId, HashMap<String, DepartmentId>>,
}

impl DepartmentCache {
    /// Id of the department called `name`, staging a new one in `pending`
    /// when the company has none by that name yet.
    pub(crate) fn resolve<S: DirectoryStore>(
        &mut self,
        directory: &Directory<S>,
        company_id: CompanyId,
        name: &str,
        now: DateTime<Utc>,
        pending: &mut Vec<Department>,
    ) -> Result<DepartmentId, RowError> {
        if let Some(staged) = pending.iter().find(|d| d.company_id == company_id && d.matches_name(name)) {
            return Ok(staged.id);
        }
        let key = department_key(name);

        if !self.by_company.contains_key(&company_id) {
            let known = directory
                .departments(company_id)?
                .into_iter()
                .map(|d| (department_key(&d.name), d.id))
                .collect();
            self.by_company.insert(company_id, known);
        }
        if let Some(id) = self.by_company.get(&company_id).and_then(|known| known.get(&key)) {
            return Ok(*id);
        }

        let department = Department::new(company_id, name, now)?;
        let id = department.id;
        pending.push(department);
        Ok(id)
    }

    /// Record departments once their unit of work has committed.
    pub(crate) fn remember(&mut self, committed: &[Department]) {
        for department in committed {
            self.by_company
                .entry(department.company_id)
                .or_default()
                .insert(department_key(&department.name), department.id);
        }
    }
}

pub(crate) fn stage_departments<S: DirectoryStore>(uow: &mut UnitOfWork<'_, S>, pending: &[Department]) {
    for department in pending {
        uow.insert_department(department.clone());
    }
}

/// Assign `value` if it differs; reports whether it did.
pub(crate) fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
