use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;

use chrono::Utc;

use talentverify_core::{CompanyId, DepartmentId, EmployeeId, Entity, RoleId, UploadId, UserId};
use talentverify_directory::{BulkUploadLog, Department, EmployeeRole, UploadCounts};

use super::{Change, ChangeSet, DirectoryStore, StoreError, UploadAuditSink};
use crate::records::{CompanyRecord, EmployeeRecord};

#[derive(Debug, Clone, Default)]
struct State {
    companies: BTreeMap<CompanyId, CompanyRecord>,
    departments: BTreeMap<DepartmentId, Department>,
    employees: BTreeMap<EmployeeId, EmployeeRecord>,
    roles: BTreeMap<RoleId, EmployeeRole>,
}

/// In-memory directory store for tests/dev.
///
/// `commit` stages the change set on a copy of the state and swaps it in only
/// if every change applied, so a failed row leaves nothing behind.
///
/// The copy is the whole directory, so a bulk upload of `n` rows costs
/// O(n × stored records). Use
/// [`PostgresDirectoryStore`](super::PostgresDirectoryStore) for anything
/// beyond tests and small dev data.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    state: RwLock<State>,
    uploads: RwLock<HashMap<UploadId, BulkUploadLog>>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Storage("directory state lock poisoned".to_string()))?;
        Ok(f(&state))
    }
}

/// Insert an entity under its id; an id already present is a conflict.
fn insert_new<E>(map: &mut BTreeMap<E::Id, E>, entity: E, kind: &str) -> Result<(), StoreError>
where
    E: Entity,
    E::Id: Ord + fmt::Display,
{
    let id = entity.id();
    if map.contains_key(&id) {
        return Err(StoreError::Conflict(format!("{kind} {id} already exists")));
    }
    map.insert(id, entity);
    Ok(())
}

fn poisoned() -> StoreError {
    StoreError::Storage("upload log lock poisoned".to_string())
}

impl State {
    fn require_company(&self, id: CompanyId) -> Result<(), StoreError> {
        if self.companies.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Integrity(format!("company {id} does not exist")))
        }
    }

    fn require_employee(&self, id: EmployeeId) -> Result<(), StoreError> {
        if self.employees.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("employee {id}")))
        }
    }

    fn check_department(&self, company_id: CompanyId, department_id: Option<DepartmentId>) -> Result<(), StoreError> {
        let Some(department_id) = department_id else {
            return Ok(());
        };
        match self.departments.get(&department_id) {
            Some(d) if d.company_id == company_id => Ok(()),
            Some(_) => Err(StoreError::Integrity(format!(
                "department {department_id} belongs to another company"
            ))),
            None => Err(StoreError::Integrity(format!("department {department_id} does not exist"))),
        }
    }

    fn apply(&mut self, change: Change) -> Result<(), StoreError> {
        match change {
            Change::InsertCompany(record) => {
                if self.companies.contains_key(&record.id) {
                    return Err(StoreError::Conflict(format!("company {} already exists", record.id)));
                }
                self.companies.insert(record.id, record);
            }
            Change::UpdateCompany(record) => {
                if !self.companies.contains_key(&record.id) {
                    return Err(StoreError::NotFound(format!("company {}", record.id)));
                }
                self.companies.insert(record.id, record);
            }
            Change::DeleteCompany(id) => {
                if self.companies.remove(&id).is_none() {
                    return Err(StoreError::NotFound(format!("company {id}")));
                }
                self.departments.retain(|_, d| d.company_id != id);
                let removed: Vec<EmployeeId> = self
                    .employees
                    .values()
                    .filter(|e| e.company_id == id)
                    .map(|e| e.id)
                    .collect();
                self.employees.retain(|_, e| e.company_id != id);
                self.roles
                    .retain(|_, r| r.company_id != id && !removed.contains(&r.employee_id));
            }
            Change::InsertDepartment(department) => {
                self.require_company(department.company_id)?;
                let duplicate = self
                    .departments
                    .values()
                    .any(|d| d.company_id == department.company_id && d.matches_name(&department.name));
                if duplicate {
                    return Err(StoreError::Conflict(format!(
                        "department '{}' already exists for company {}",
                        department.name, department.company_id
                    )));
                }
                insert_new(&mut self.departments, department, "department")?;
            }
            Change::DeleteDepartment(id) => {
                if self.departments.remove(&id).is_none() {
                    return Err(StoreError::NotFound(format!("department {id}")));
                }
                for employee in self.employees.values_mut().filter(|e| e.department_id == Some(id)) {
                    employee.department_id = None;
                }
                for role in self.roles.values_mut().filter(|r| r.department_id == Some(id)) {
                    role.department_id = None;
                }
            }
            Change::InsertEmployee(record) => {
                if self.employees.contains_key(&record.id) {
                    return Err(StoreError::Conflict(format!("employee {} already exists", record.id)));
                }
                self.require_company(record.company_id)?;
                self.check_department(record.company_id, record.department_id)?;
                self.employees.insert(record.id, record);
            }
            Change::UpdateEmployee(record) => {
                self.require_employee(record.id)?;
                self.require_company(record.company_id)?;
                self.check_department(record.company_id, record.department_id)?;
                self.employees.insert(record.id, record);
            }
            Change::DeleteEmployee(id) => {
                if self.employees.remove(&id).is_none() {
                    return Err(StoreError::NotFound(format!("employee {id}")));
                }
                self.roles.retain(|_, r| r.employee_id != id);
            }
            Change::CloseCurrentRoles { employee_id, end_date, at } => {
                self.require_employee(employee_id)?;
                for role in self
                    .roles
                    .values_mut()
                    .filter(|r| r.employee_id == employee_id && r.is_current)
                {
                    role.close(end_date, at);
                }
            }
            Change::InsertRole(role) => {
                self.require_employee(role.employee_id)?;
                self.require_company(role.company_id)?;
                self.check_department(role.company_id, role.department_id)?;
                if role.is_current {
                    for other in self
                        .roles
                        .values_mut()
                        .filter(|r| r.employee_id == role.employee_id && r.is_current)
                    {
                        other.close(role.start_date, role.created_at);
                    }
                }
                insert_new(&mut self.roles, role, "role")?;
            }
            Change::RefreshEmployeeCount(company_id) => {
                let active = self
                    .employees
                    .values()
                    .filter(|e| e.company_id == company_id && e.is_active)
                    .count();
                // The company may have been deleted earlier in the same set.
                if let Some(company) = self.companies.get_mut(&company_id) {
                    company.employee_count = u32::try_from(active).unwrap_or(u32::MAX);
                }
            }
        }
        Ok(())
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn companies(&self) -> Result<Vec<CompanyRecord>, StoreError> {
        self.read(|s| s.companies.values().cloned().collect())
    }

    fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError> {
        self.read(|s| s.companies.get(&id).cloned())
    }

    fn departments(&self, company_id: Option<CompanyId>) -> Result<Vec<Department>, StoreError> {
        self.read(|s| {
            s.departments
                .values()
                .filter(|d| company_id.is_none_or(|c| d.company_id == c))
                .cloned()
                .collect()
        })
    }

    fn employees(&self, company_id: Option<CompanyId>) -> Result<Vec<EmployeeRecord>, StoreError> {
        self.read(|s| {
            s.employees
                .values()
                .filter(|e| company_id.is_none_or(|c| e.company_id == c))
                .cloned()
                .collect()
        })
    }

    fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeRecord>, StoreError> {
        self.read(|s| s.employees.get(&id).cloned())
    }

    fn roles(&self, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, StoreError> {
        self.read(|s| {
            let mut roles: Vec<EmployeeRole> = s
                .roles
                .values()
                .filter(|r| r.employee_id == employee_id)
                .cloned()
                .collect();
            roles.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.created_at.cmp(&a.created_at)));
            roles
        })
    }

    fn company_roles(&self, company_id: CompanyId) -> Result<Vec<EmployeeRole>, StoreError> {
        self.read(|s| {
            let mut roles: Vec<EmployeeRole> = s
                .roles
                .values()
                .filter(|r| r.company_id == company_id)
                .cloned()
                .collect();
            roles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            roles
        })
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Storage("directory state lock poisoned".to_string()))?;

        let mut staged = state.clone();
        for change in changes {
            staged.apply(change)?;
        }
        *state = staged;
        Ok(())
    }
}

impl UploadAuditSink for InMemoryDirectoryStore {
    fn open(&self, log: BulkUploadLog) -> Result<UploadId, StoreError> {
        let mut uploads = self.uploads.write().map_err(|_| poisoned())?;
        if uploads.contains_key(&log.id) {
            return Err(StoreError::Conflict(format!("upload {} already exists", log.id)));
        }
        let id = log.id;
        uploads.insert(id, log);
        Ok(id)
    }

    fn mark_completed(
        &self,
        id: UploadId,
        counts: UploadCounts,
        error_details: Option<String>,
    ) -> Result<(), StoreError> {
        let mut uploads = self.uploads.write().map_err(|_| poisoned())?;
        let log = uploads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("upload {id}")))?;
        log.complete(counts, error_details, Utc::now())?;
        Ok(())
    }

    fn mark_failed(&self, id: UploadId, detail: &str) -> Result<(), StoreError> {
        let mut uploads = self.uploads.write().map_err(|_| poisoned())?;
        let log = uploads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("upload {id}")))?;
        log.fail(detail, Utc::now())?;
        Ok(())
    }

    fn upload(&self, id: UploadId) -> Result<Option<BulkUploadLog>, StoreError> {
        let uploads = self.uploads.read().map_err(|_| poisoned())?;
        Ok(uploads.get(&id).cloned())
    }

    fn uploads(&self, user_id: Option<UserId>) -> Result<Vec<BulkUploadLog>, StoreError> {
        let uploads = self.uploads.read().map_err(|_| poisoned())?;
        let mut logs: Vec<BulkUploadLog> = uploads
            .values()
            .filter(|log| user_id.is_none_or(|u| log.user_id == u))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use talentverify_core::UserId;
    use talentverify_directory::{UploadKind, UploadStatus};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn company(now: DateTime<Utc>) -> CompanyRecord {
        CompanyRecord {
            id: CompanyId::new(),
            name: "Acme".to_string(),
            registration_number: "token".to_string(),
            registration_date: date(2020, 1, 1),
            address: String::new(),
            employee_count: 0,
            contact_person: String::new(),
            contact_phone: None,
            email: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn employee(company_id: CompanyId, department_id: Option<DepartmentId>, now: DateTime<Utc>) -> EmployeeRecord {
        EmployeeRecord {
            id: EmployeeId::new(),
            name: "Tariro".to_string(),
            employee_code: None,
            company_id,
            department_id,
            current_role: "Clerk".to_string(),
            join_date: date(2021, 1, 1),
            leave_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn role(employee_id: EmployeeId, company_id: CompanyId, start: NaiveDate) -> EmployeeRole {
        EmployeeRole {
            id: RoleId::new(),
            employee_id,
            company_id,
            department_id: None,
            title: "Clerk".to_string(),
            start_date: start,
            end_date: None,
            duties: String::new(),
            is_current: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn commit(store: &InMemoryDirectoryStore, changes: Vec<Change>) -> Result<(), StoreError> {
        let mut set = ChangeSet::new();
        set.extend(changes);
        store.commit(set)
    }

    #[test]
    fn failed_change_set_leaves_no_trace() {
        let store = InMemoryDirectoryStore::new();
        let now = Utc::now();
        let acme = company(now);
        let ghost = CompanyId::new();

        let result = commit(
            &store,
            vec![
                Change::InsertCompany(acme.clone()),
                Change::InsertEmployee(employee(ghost, None, now)),
            ],
        );
        assert!(matches!(result, Err(StoreError::Integrity(_))));
        assert!(store.companies().unwrap().is_empty());
    }

    #[test]
    fn department_names_are_unique_case_insensitively() {
        let store = InMemoryDirectoryStore::new();
        let now = Utc::now();
        let acme = company(now);
        let engineering = Department::new(acme.id, "engineering", now).unwrap();
        commit(&store, vec![Change::InsertCompany(acme.clone()), Change::InsertDepartment(engineering)]).unwrap();

        let shouting = Department::new(acme.id, " ENGINEERING", now).unwrap();
        let result = commit(&store, vec![Change::InsertDepartment(shouting)]);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.departments(Some(acme.id)).unwrap().len(), 1);
    }

    #[test]
    fn current_role_insert_demotes_previous_current() {
        let store = InMemoryDirectoryStore::new();
        let now = Utc::now();
        let acme = company(now);
        let worker = employee(acme.id, None, now);
        let first = role(worker.id, acme.id, date(2021, 1, 1));
        commit(
            &store,
            vec![
                Change::InsertCompany(acme.clone()),
                Change::InsertEmployee(worker.clone()),
                Change::InsertRole(first),
            ],
        )
        .unwrap();

        let second = role(worker.id, acme.id, date(2022, 6, 1));
        commit(&store, vec![Change::InsertRole(second.clone())]).unwrap();

        let roles = store.roles(worker.id).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles.iter().filter(|r| r.is_current).count(), 1);
        assert_eq!(roles[0].id, second.id);
        assert_eq!(roles[1].end_date, Some(date(2022, 6, 1)));
    }

    #[test]
    fn deleting_department_nulls_weak_references() {
        let store = InMemoryDirectoryStore::new();
        let now = Utc::now();
        let acme = company(now);
        let sales = Department::new(acme.id, "Sales", now).unwrap();
        let worker = employee(acme.id, Some(sales.id), now);
        commit(
            &store,
            vec![
                Change::InsertCompany(acme.clone()),
                Change::InsertDepartment(sales.clone()),
                Change::InsertEmployee(worker.clone()),
            ],
        )
        .unwrap();

        commit(&store, vec![Change::DeleteDepartment(sales.id)]).unwrap();
        assert_eq!(store.employee(worker.id).unwrap().unwrap().department_id, None);
    }

    #[test]
    fn deleting_company_cascades() {
        let store = InMemoryDirectoryStore::new();
        let now = Utc::now();
        let acme = company(now);
        let worker = employee(acme.id, None, now);
        commit(
            &store,
            vec![
                Change::InsertCompany(acme.clone()),
                Change::InsertEmployee(worker.clone()),
                Change::InsertRole(role(worker.id, acme.id, date(2021, 1, 1))),
                Change::RefreshEmployeeCount(acme.id),
            ],
        )
        .unwrap();
        assert_eq!(store.company(acme.id).unwrap().unwrap().employee_count, 1);

        commit(&store, vec![Change::DeleteCompany(acme.id)]).unwrap();
        assert!(store.employees(None).unwrap().is_empty());
        assert!(store.roles(worker.id).unwrap().is_empty());
    }

    #[test]
    fn upload_log_takes_exactly_one_terminal_call() {
        let store = InMemoryDirectoryStore::new();
        let log = BulkUploadLog::open(UserId::new(), "companies.csv", 10, UploadKind::Company, Utc::now());
        let id = store.open(log).unwrap();

        store.mark_completed(id, UploadCounts::default(), None).unwrap();
        assert!(matches!(store.mark_failed(id, "late"), Err(StoreError::Conflict(_))));
        assert_eq!(store.upload(id).unwrap().unwrap().status, UploadStatus::Completed);
    }

    #[test]
    fn upload_history_filters_by_user() {
        let store = InMemoryDirectoryStore::new();
        let alice = UserId::new();
        let now = Utc::now();
        store
            .open(BulkUploadLog::open(alice, "a.csv", 1, UploadKind::Employee, now))
            .unwrap();
        store
            .open(BulkUploadLog::open(UserId::new(), "b.csv", 1, UploadKind::Company, now))
            .unwrap();

        assert_eq!(store.uploads(None).unwrap().len(), 2);
        let mine = store.uploads(Some(alice)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].file_name, "a.csv");
    }
}
