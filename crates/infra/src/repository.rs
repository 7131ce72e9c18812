//! Entity-level access to the directory.
//!
//! [`Directory`] pairs a [`DirectoryStore`] with the shared [`FieldCodec`]:
//! reads come back as decoded entities, writes are sealed into records and
//! grouped into a [`UnitOfWork`] that commits as one change set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use talentverify_auth::AuthzError;
use talentverify_core::{CompanyId, DepartmentId, DomainError, EmployeeId};
use talentverify_crypto::{CodecError, FieldCodec};
use talentverify_directory::{Company, Department, Employee, EmployeeRole};

use crate::mapping;
use crate::store::{Change, ChangeSet, DirectoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// The directory as seen by services and the bulk engine.
pub struct Directory<S> {
    store: Arc<S>,
    codec: Arc<FieldCodec>,
}

impl<S> Clone for Directory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<S: DirectoryStore> Directory<S> {
    pub fn new(store: Arc<S>, codec: Arc<FieldCodec>) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn companies(&self) -> Result<Vec<Company>, RepositoryError> {
        self.store
            .companies()?
            .into_iter()
            .map(|r| mapping::open_company(&self.codec, r).map_err(RepositoryError::from))
            .collect()
    }

    pub fn company(&self, id: CompanyId) -> Result<Company, RepositoryError> {
        let record = self
            .store
            .company(id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("company {id}")))?;
        Ok(mapping::open_company(&self.codec, record)?)
    }

    /// Registration number (trimmed) to company id, decrypting every company once.
    ///
    /// Companies whose registration number can't be decrypted are left out.
    pub fn company_index(&self) -> Result<HashMap<String, CompanyId>, RepositoryError> {
        Ok(self
            .companies()?
            .into_iter()
            .filter_map(|c| c.registration_key().map(|k| (k.to_string(), c.id)))
            .collect())
    }

    pub fn departments(&self, company_id: CompanyId) -> Result<Vec<Department>, RepositoryError> {
        Ok(self.store.departments(Some(company_id))?)
    }

    /// Department of `company_id` whose name matches case-insensitively.
    pub fn find_department(&self, company_id: CompanyId, name: &str) -> Result<Option<Department>, RepositoryError> {
        Ok(self
            .store
            .departments(Some(company_id))?
            .into_iter()
            .find(|d| d.matches_name(name)))
    }

    pub fn employees(&self, company_id: Option<CompanyId>) -> Result<Vec<Employee>, RepositoryError> {
        self.store
            .employees(company_id)?
            .into_iter()
            .map(|r| mapping::open_employee(&self.codec, r).map_err(RepositoryError::from))
            .collect()
    }

    pub fn employee(&self, id: EmployeeId) -> Result<Employee, RepositoryError> {
        let record = self
            .store
            .employee(id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("employee {id}")))?;
        Ok(mapping::open_employee(&self.codec, record)?)
    }

    /// Roles newest first.
    pub fn roles(&self, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, RepositoryError> {
        Ok(self.store.roles(employee_id)?)
    }

    pub fn begin(&self) -> UnitOfWork<'_, S> {
        UnitOfWork {
            directory: self,
            changes: ChangeSet::new(),
        }
    }
}

/// Writes staged for one atomic commit.
///
/// Nothing reaches the store until [`UnitOfWork::commit`]; dropping the unit
/// discards it.
pub struct UnitOfWork<'a, S> {
    directory: &'a Directory<S>,
    changes: ChangeSet,
}

impl<S: DirectoryStore> UnitOfWork<'_, S> {
    pub fn insert_company(&mut self, company: &Company) -> Result<(), RepositoryError> {
        let record = mapping::seal_company(&self.directory.codec, company)?;
        self.changes.push(Change::InsertCompany(record));
        Ok(())
    }

    pub fn update_company(&mut self, company: &Company) -> Result<(), RepositoryError> {
        let record = mapping::seal_company(&self.directory.codec, company)?;
        self.changes.push(Change::UpdateCompany(record));
        Ok(())
    }

    pub fn delete_company(&mut self, id: CompanyId) {
        self.changes.push(Change::DeleteCompany(id));
    }

    pub fn insert_department(&mut self, department: Department) {
        self.changes.push(Change::InsertDepartment(department));
    }

    pub fn delete_department(&mut self, id: DepartmentId) {
        self.changes.push(Change::DeleteDepartment(id));
    }

    pub fn insert_employee(&mut self, employee: &Employee) -> Result<(), RepositoryError> {
        let record = mapping::seal_employee(&self.directory.codec, employee)?;
        self.changes.push(Change::InsertEmployee(record));
        Ok(())
    }

    pub fn update_employee(&mut self, employee: &Employee) -> Result<(), RepositoryError> {
        let record = mapping::seal_employee(&self.directory.codec, employee)?;
        self.changes.push(Change::UpdateEmployee(record));
        Ok(())
    }

    pub fn delete_employee(&mut self, id: EmployeeId) {
        self.changes.push(Change::DeleteEmployee(id));
    }

    pub fn close_current_roles(&mut self, employee_id: EmployeeId, end_date: NaiveDate, at: DateTime<Utc>) {
        self.changes.push(Change::CloseCurrentRoles {
            employee_id,
            end_date,
            at,
        });
    }

    /// A current role demotes the employee's other current roles on commit.
    pub fn insert_role(&mut self, role: EmployeeRole) {
        self.changes.push(Change::InsertRole(role));
    }

    pub fn refresh_employee_count(&mut self, company_id: CompanyId) {
        self.changes.push(Change::RefreshEmployeeCount(company_id));
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn commit(self) -> Result<(), RepositoryError> {
        let count = self.changes.len();
        self.directory.store.commit(self.changes)?;
        tracing::debug!(changes = count, "unit of work committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDirectoryStore;
    use talentverify_core::SensitiveValue;
    use talentverify_directory::{CompanyDraft, EmployeeDraft};

    fn directory() -> Directory<InMemoryDirectoryStore> {
        Directory::new(
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(FieldCodec::from_key([5u8; 32])),
        )
    }

    fn draft(reg: &str) -> CompanyDraft {
        CompanyDraft {
            name: format!("Company {reg}"),
            registration_number: reg.to_string(),
            registration_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            ..CompanyDraft::default()
        }
    }

    #[test]
    fn company_index_decrypts_and_trims() {
        let dir = directory();
        let now = Utc::now();
        let acme = Company::register(draft(" REG1 "), now).unwrap();
        let mut uow = dir.begin();
        uow.insert_company(&acme).unwrap();
        uow.commit().unwrap();

        let index = dir.company_index().unwrap();
        assert_eq!(index.get("REG1"), Some(&acme.id));
    }

    #[test]
    fn undecryptable_registration_numbers_are_not_indexed() {
        let dir = directory();
        let mut acme = Company::register(draft("REG1"), Utc::now()).unwrap();
        acme.registration_number = SensitiveValue::Undecryptable("not-a-token".to_string());
        let mut uow = dir.begin();
        uow.insert_company(&acme).unwrap();
        uow.commit().unwrap();

        assert!(dir.company_index().unwrap().is_empty());
        assert!(dir.company(acme.id).unwrap().registration_number.is_undecryptable());
    }

    #[test]
    fn dropped_unit_of_work_writes_nothing() {
        let dir = directory();
        let acme = Company::register(draft("REG1"), Utc::now()).unwrap();
        {
            let mut uow = dir.begin();
            uow.insert_company(&acme).unwrap();
        }
        assert!(dir.companies().unwrap().is_empty());
    }

    #[test]
    fn employee_codes_round_trip_through_the_store() {
        let dir = directory();
        let now = Utc::now();
        let acme = Company::register(draft("REG1"), now).unwrap();
        let (employee, role) = Employee::hire(
            EmployeeDraft {
                name: "Nyasha".to_string(),
                employee_code: Some("EMP001".to_string()),
                company_id: acme.id,
                department_id: None,
                role: "Clerk".to_string(),
                join_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                leave_date: None,
                duties: String::new(),
            },
            now,
        )
        .unwrap();

        let mut uow = dir.begin();
        uow.insert_company(&acme).unwrap();
        uow.insert_employee(&employee).unwrap();
        uow.insert_role(role);
        uow.commit().unwrap();

        let stored = dir.store().employee(employee.id).unwrap().unwrap();
        assert_ne!(stored.employee_code.as_deref(), Some("EMP001"));
        assert_eq!(dir.employee(employee.id).unwrap().code_key(), Some("EMP001"));
        assert_eq!(dir.roles(employee.id).unwrap().len(), 1);
    }

    #[test]
    fn department_lookup_ignores_case() {
        let dir = directory();
        let now = Utc::now();
        let acme = Company::register(draft("REG1"), now).unwrap();
        let mut uow = dir.begin();
        uow.insert_company(&acme).unwrap();
        uow.insert_department(Department::new(acme.id, "engineering", now).unwrap());
        uow.commit().unwrap();

        let found = dir.find_department(acme.id, "Engineering").unwrap().unwrap();
        assert_eq!(found.name, "engineering");
    }
}
