//! Employee search criteria.
//!
//! Employee codes are stored encrypted with a random nonce, so filtering can't
//! be pushed down to storage. The repository decrypts the (company-scoped)
//! candidate set into [`EmployeeProfile`]s and filters them here.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::employee::Employee;

/// A role from an employee's history, with names resolved for display and matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub title: String,
    pub company_name: String,
    pub department_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub duties: String,
    pub is_current: bool,
}

/// An employee together with resolved names and (optionally) role history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee: Employee,
    pub company_name: String,
    pub department_name: Option<String>,
    /// Newest first. Empty unless history was requested.
    pub history: Vec<RoleSummary>,
}

/// Search filters. Every set filter must match; text filters are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeQuery {
    /// Matches name, employee code, company, department or current role.
    pub text: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    /// Joined in or after this year.
    pub start_year: Option<i32>,
    /// Left in or before this year, or still employed.
    pub end_year: Option<i32>,
    /// Joined, or started any role, on or after this date.
    pub started_on_or_after: Option<NaiveDate>,
    /// Left, or ended any role, on or before this date.
    pub ended_on_or_before: Option<NaiveDate>,
    pub active: Option<bool>,
    /// Let company, department and role filters match past roles too.
    pub include_history: bool,
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn active_filter(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl EmployeeQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Whether loading role history is needed to evaluate this query.
    pub fn needs_history(&self) -> bool {
        self.include_history || self.started_on_or_after.is_some() || self.ended_on_or_before.is_some()
    }

    pub fn matches(&self, profile: &EmployeeProfile) -> bool {
        let employee = &profile.employee;
        let department = profile.department_name.as_deref().unwrap_or("");

        if let Some(text) = active_filter(&self.text) {
            let code = employee.code_key().unwrap_or("");
            let hit = contains(&employee.name, text)
                || contains(code, text)
                || contains(&profile.company_name, text)
                || contains(department, text)
                || contains(&employee.current_role, text);
            if !hit {
                return false;
            }
        }

        if let Some(name) = active_filter(&self.name) {
            if !contains(&employee.name, name) {
                return false;
            }
        }

        if let Some(company) = active_filter(&self.company) {
            let past = self.include_history
                && profile.history.iter().any(|r| contains(&r.company_name, company));
            if !contains(&profile.company_name, company) && !past {
                return false;
            }
        }

        if let Some(wanted) = active_filter(&self.department) {
            let past = self.include_history
                && profile
                    .history
                    .iter()
                    .filter_map(|r| r.department_name.as_deref())
                    .any(|d| contains(d, wanted));
            if !contains(department, wanted) && !past {
                return false;
            }
        }

        if let Some(role) = active_filter(&self.role) {
            let past = self.include_history && profile.history.iter().any(|r| contains(&r.title, role));
            if !contains(&employee.current_role, role) && !past {
                return false;
            }
        }

        if let Some(year) = self.start_year {
            if employee.join_date.year() < year {
                return false;
            }
        }

        if let Some(year) = self.end_year {
            if employee.leave_date.is_some_and(|left| left.year() > year) {
                return false;
            }
        }

        if let Some(from) = self.started_on_or_after {
            let hit = employee.join_date >= from || profile.history.iter().any(|r| r.start_date >= from);
            if !hit {
                return false;
            }
        }

        if let Some(until) = self.ended_on_or_before {
            let hit = employee.leave_date.is_some_and(|d| d <= until)
                || profile.history.iter().any(|r| r.end_date.is_some_and(|d| d <= until));
            if !hit {
                return false;
            }
        }

        if let Some(active) = self.active {
            if employee.is_active != active {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::EmployeeDraft;
    use chrono::Utc;
    use talentverify_core::CompanyId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn profile() -> EmployeeProfile {
        let (employee, _) = Employee::hire(
            EmployeeDraft {
                name: "Rudo Chikwanha".to_string(),
                employee_code: Some("EMP-42".to_string()),
                company_id: CompanyId::new(),
                department_id: None,
                role: "Data Analyst".to_string(),
                join_date: date(2019, 4, 1),
                leave_date: Some(date(2023, 8, 31)),
                duties: String::new(),
            },
            Utc::now(),
        )
        .unwrap();

        EmployeeProfile {
            employee,
            company_name: "Acme Ltd".to_string(),
            department_name: Some("Finance".to_string()),
            history: vec![RoleSummary {
                title: "Bookkeeper".to_string(),
                company_name: "Old Mutual".to_string(),
                department_name: Some("Accounts".to_string()),
                start_date: date(2015, 1, 1),
                end_date: Some(date(2019, 3, 31)),
                duties: String::new(),
                is_current: false,
            }],
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(EmployeeQuery::default().matches(&profile()));
    }

    #[test]
    fn free_text_covers_decrypted_code_and_company() {
        let p = profile();
        assert!(EmployeeQuery::text("emp-42").matches(&p));
        assert!(EmployeeQuery::text("ACME").matches(&p));
        assert!(EmployeeQuery::text("analyst").matches(&p));
        assert!(!EmployeeQuery::text("plumber").matches(&p));
    }

    #[test]
    fn past_company_matches_only_with_history() {
        let p = profile();
        let mut query = EmployeeQuery {
            company: Some("mutual".to_string()),
            ..EmployeeQuery::default()
        };
        assert!(!query.matches(&p));
        query.include_history = true;
        assert!(query.matches(&p));
    }

    #[test]
    fn year_bounds() {
        let p = profile();
        let joined_late = EmployeeQuery {
            start_year: Some(2020),
            ..EmployeeQuery::default()
        };
        assert!(!joined_late.matches(&p));

        let left_by_2023 = EmployeeQuery {
            end_year: Some(2023),
            ..EmployeeQuery::default()
        };
        assert!(left_by_2023.matches(&p));

        let left_by_2022 = EmployeeQuery {
            end_year: Some(2022),
            ..EmployeeQuery::default()
        };
        assert!(!left_by_2022.matches(&p));
    }

    #[test]
    fn date_bounds_consider_role_history() {
        let p = profile();
        let query = EmployeeQuery {
            ended_on_or_before: Some(date(2020, 1, 1)),
            ..EmployeeQuery::default()
        };
        assert!(query.needs_history());
        assert!(query.matches(&p));
    }

    #[test]
    fn active_flag_filters() {
        let query = EmployeeQuery {
            active: Some(true),
            ..EmployeeQuery::default()
        };
        assert!(!query.matches(&profile()));
    }

    #[test]
    fn query_deserializes_with_defaults() {
        let query: EmployeeQuery = serde_json::from_str(r#"{"role":"engineer"}"#).unwrap();
        assert_eq!(query.role.as_deref(), Some("engineer"));
        assert!(!query.include_history);
    }
}
