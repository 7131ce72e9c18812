use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use talentverify_core::{
    CompanyId, DepartmentId, DomainError, DomainResult, EmployeeId, Entity, SensitiveValue,
};

use crate::role::{EmployeeRole, RoleAssignment};

/// An employee and the denormalized view of their current role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    /// Optional company-issued identifier.
    pub employee_code: Option<SensitiveValue>,
    pub company_id: CompanyId,
    pub department_id: Option<DepartmentId>,
    pub current_role: String,
    pub join_date: NaiveDate,
    pub leave_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for hiring an employee together with their first role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeDraft {
    pub name: String,
    pub employee_code: Option<String>,
    pub company_id: CompanyId,
    pub department_id: Option<DepartmentId>,
    pub role: String,
    pub join_date: NaiveDate,
    pub leave_date: Option<NaiveDate>,
    pub duties: String,
}

impl Employee {
    /// Create an employee and the role they were hired into.
    ///
    /// A draft with a leave date produces an inactive employee whose first
    /// role is already closed.
    pub fn hire(draft: EmployeeDraft, now: DateTime<Utc>) -> DomainResult<(Self, EmployeeRole)> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("employee name cannot be empty"));
        }

        let assignment = RoleAssignment {
            title: draft.role,
            company_id: draft.company_id,
            department_id: draft.department_id,
            start_date: draft.join_date,
            end_date: draft.leave_date,
            duties: draft.duties,
        };
        assignment.validate()?;

        let mut employee = Self {
            id: EmployeeId::new(),
            name: name.to_string(),
            employee_code: draft
                .employee_code
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .map(SensitiveValue::Plain),
            company_id: draft.company_id,
            department_id: draft.department_id,
            current_role: assignment.title.trim().to_string(),
            join_date: draft.join_date,
            leave_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        if let Some(left) = draft.leave_date {
            employee.leave(left, now)?;
        }

        let role = EmployeeRole::from_assignment(employee.id, assignment, now);
        Ok((employee, role))
    }

    /// Trimmed employee code, if present and readable.
    pub fn code_key(&self) -> Option<&str> {
        self.employee_code.as_ref().and_then(SensitiveValue::key)
    }

    /// Build a new role for this employee.
    ///
    /// An open-ended role becomes current: its title, company and department
    /// are mirrored onto the employee. The previously current roles are
    /// demoted by the store when the new role is inserted.
    pub fn assign_role(&mut self, assignment: RoleAssignment, now: DateTime<Utc>) -> DomainResult<EmployeeRole> {
        assignment.validate()?;
        let role = EmployeeRole::from_assignment(self.id, assignment, now);
        if role.is_current {
            self.current_role = role.title.clone();
            self.company_id = role.company_id;
            self.department_id = role.department_id;
            self.updated_at = now;
        }
        Ok(role)
    }

    /// Record a departure.
    pub fn leave(&mut self, date: NaiveDate, now: DateTime<Utc>) -> DomainResult<()> {
        if date < self.join_date {
            return Err(DomainError::validation(format!(
                "date left {date} is before join date {}",
                self.join_date
            )));
        }
        self.leave_date = Some(date);
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.updated_at = now;
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("employee name cannot be empty"));
        }
        self.name = name.to_string();
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Employee {
    type Id = EmployeeId;

    fn id(&self) -> EmployeeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(company_id: CompanyId) -> EmployeeDraft {
        EmployeeDraft {
            name: "Tendai Moyo".to_string(),
            employee_code: Some(" EMP001 ".to_string()),
            company_id,
            department_id: None,
            role: "Engineer".to_string(),
            join_date: date(2021, 2, 1),
            leave_date: None,
            duties: "Builds things".to_string(),
        }
    }

    #[test]
    fn hire_creates_current_role_and_trims_code() {
        let company = CompanyId::new();
        let (employee, role) = Employee::hire(draft(company), Utc::now()).unwrap();
        assert_eq!(employee.code_key(), Some("EMP001"));
        assert!(employee.is_active);
        assert!(role.is_current);
        assert_eq!(role.employee_id, employee.id);
        assert_eq!(role.start_date, employee.join_date);
        assert_eq!(employee.current_role, "Engineer");
    }

    #[test]
    fn hire_with_leave_date_is_inactive_with_closed_role() {
        let mut input = draft(CompanyId::new());
        input.leave_date = Some(date(2022, 5, 31));
        let (employee, role) = Employee::hire(input, Utc::now()).unwrap();
        assert!(!employee.is_active);
        assert_eq!(employee.leave_date, Some(date(2022, 5, 31)));
        assert!(!role.is_current);
        assert_eq!(role.end_date, Some(date(2022, 5, 31)));
    }

    #[test]
    fn leave_before_join_is_rejected() {
        let (mut employee, _) = Employee::hire(draft(CompanyId::new()), Utc::now()).unwrap();
        assert!(employee.leave(date(2020, 1, 1), Utc::now()).is_err());
        assert!(employee.is_active);
    }

    #[test]
    fn new_current_role_leaves_exactly_one_current_and_mirrors_fields() {
        let now = Utc::now();
        let company = CompanyId::new();
        let (mut employee, first) = Employee::hire(draft(company), now).unwrap();
        let mut history = vec![first];

        let department = DepartmentId::new();
        let promotion = RoleAssignment::current("Lead Engineer", company, date(2023, 1, 1))
            .in_department(Some(department));
        let role = employee.assign_role(promotion, now).unwrap();
        for previous in history.iter_mut().filter(|r| r.is_current) {
            previous.close(role.start_date, now);
        }
        history.push(role);

        let current: Vec<_> = history.iter().filter(|r| r.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].title, employee.current_role);
        assert_eq!(current[0].company_id, employee.company_id);
        assert_eq!(current[0].department_id, employee.department_id);
        assert_eq!(history[0].end_date, Some(date(2023, 1, 1)));
    }

    #[test]
    fn closed_role_does_not_touch_employee() {
        let now = Utc::now();
        let company = CompanyId::new();
        let (mut employee, _) = Employee::hire(draft(company), now).unwrap();
        let past = RoleAssignment::current("Intern", CompanyId::new(), date(2019, 1, 1))
            .ended(Some(date(2019, 6, 30)));
        let role = employee.assign_role(past, now).unwrap();
        assert!(!role.is_current);
        assert_eq!(employee.current_role, "Engineer");
        assert_eq!(employee.company_id, company);
    }
}
