use std::collections::{HashMap, HashSet};

use talentverify_core::{CompanyId, SensitiveValue};
use talentverify_directory::{Company, CompanyDraft, business_key};
use talentverify_infra::{DirectoryStore, RepositoryError};

use crate::fields::{parse_count, parse_date, required, split_list};
use crate::outcome::{RowError, RowOutcome};
use crate::reconcile::{Context, DepartmentCache, Reconciler, replace, stage_departments};
use crate::source::Row;

pub const COMPANY_UPLOAD_COLUMNS: &[&str] = &["name", "registration_number", "registration_date"];
pub const COMPANY_EDIT_COLUMNS: &[&str] = &["registration_number"];

fn email(row: &Row) -> Option<&str> {
    row.get("email_address").or_else(|| row.get("email"))
}

fn employee_count(row: &Row) -> Result<Option<u32>, RowError> {
    row.get("number_of_employees")
        .map(|raw| parse_count("number_of_employees", raw))
        .transpose()
}

/// Creates companies; rows naming a registration number already on file are skipped.
pub struct CompanyUpload<S> {
    ctx: Context<S>,
    known: HashSet<String>,
    departments: DepartmentCache,
}

impl<S: DirectoryStore> CompanyUpload<S> {
    pub fn new(ctx: Context<S>) -> Result<Self, RepositoryError> {
        let known = ctx.directory.company_index()?.into_keys().collect();
        Ok(Self {
            ctx,
            known,
            departments: DepartmentCache::default(),
        })
    }
}

impl<S: DirectoryStore> Reconciler for CompanyUpload<S> {
    fn reconcile(&mut self, row: &Row) -> Result<RowOutcome, RowError> {
        let registration = business_key(required(row, "registration_number")?);
        if self.known.contains(registration) {
            return Ok(RowOutcome::SkippedExisting(format!(
                "Company with registration number '{registration}' already exists. \
                 Use bulk_edit to update existing companies."
            )));
        }

        let draft = CompanyDraft {
            name: required(row, "name")?.to_string(),
            registration_number: registration.to_string(),
            registration_date: parse_date("registration_date", required(row, "registration_date")?)?,
            address: row.get("address").unwrap_or_default().to_string(),
            employee_count: employee_count(row)?.unwrap_or(0),
            contact_person: row.get("contact_person").unwrap_or_default().to_string(),
            contact_phone: row.get("contact_phone").map(str::to_string),
            email: email(row).map(str::to_string),
        };
        let company = Company::register(draft, self.ctx.now)?;

        let directory = &self.ctx.directory;
        let mut pending = Vec::new();
        for name in row.get("departments").map(split_list).unwrap_or_default() {
            self.departments
                .resolve(directory, company.id, &name, self.ctx.now, &mut pending)?;
        }

        let mut uow = directory.begin();
        uow.insert_company(&company)?;
        stage_departments(&mut uow, &pending);
        uow.commit()?;

        self.known.insert(registration.to_string());
        self.departments.remember(&pending);
        Ok(RowOutcome::Created)
    }
}

/// Updates companies matched by registration number with the non-blank cells of each row.
pub struct CompanyEdit<S> {
    ctx: Context<S>,
    index: HashMap<String, CompanyId>,
    departments: DepartmentCache,
}

impl<S: DirectoryStore> CompanyEdit<S> {
    pub fn new(ctx: Context<S>) -> Result<Self, RepositoryError> {
        let index = ctx.directory.company_index()?;
        Ok(Self {
            ctx,
            index,
            departments: DepartmentCache::default(),
        })
    }
}

impl<S: DirectoryStore> Reconciler for CompanyEdit<S> {
    fn reconcile(&mut self, row: &Row) -> Result<RowOutcome, RowError> {
        let registration = business_key(required(row, "registration_number")?);
        let id = *self.index.get(registration).ok_or_else(|| {
            RowError::NotFound(format!(
                "Company with registration number '{registration}' not found."
            ))
        })?;

        let directory = &self.ctx.directory;
        let now = self.ctx.now;
        let mut company = directory.company(id)?;
        let mut changed = false;

        if let Some(name) = row.get("name") {
            if company.name != name {
                company.rename(name)?;
                changed = true;
            }
        }
        if let Some(raw) = row.get("registration_date") {
            changed |= replace(&mut company.registration_date, parse_date("registration_date", raw)?);
        }
        if let Some(address) = row.get("address") {
            changed |= replace(&mut company.address, address.to_string());
        }
        if let Some(count) = employee_count(row)? {
            changed |= replace(&mut company.employee_count, count);
        }
        if let Some(person) = row.get("contact_person") {
            changed |= replace(&mut company.contact_person, person.to_string());
        }
        if let Some(phone) = row.get("contact_phone") {
            changed |= replace(&mut company.contact_phone, Some(SensitiveValue::plain(phone)));
        }
        if let Some(email) = email(row) {
            changed |= replace(&mut company.email, Some(SensitiveValue::plain(email)));
        }

        // Listed departments are added when missing; unlisted ones stay.
        let mut pending = Vec::new();
        for name in row.get("departments").map(split_list).unwrap_or_default() {
            self.departments.resolve(directory, id, &name, now, &mut pending)?;
        }

        if !changed && pending.is_empty() {
            return Ok(RowOutcome::Unchanged);
        }

        let mut uow = directory.begin();
        if changed {
            company.updated_at = now;
            uow.update_company(&company)?;
        }
        stage_departments(&mut uow, &pending);
        uow.commit()?;

        self.departments.remember(&pending);
        Ok(RowOutcome::Updated)
    }
}
