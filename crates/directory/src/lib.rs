//! Directory domain module (companies, departments, employees, role history).
//!
//! Entities here are plain data plus the rules that keep them consistent
//! (single current role, department name matching, upload log lifecycle).
//! No IO, no encryption, no storage: sensitive attributes are carried as
//! [`talentverify_core::SensitiveValue`] and encoded by the storage mapping layer.

pub mod company;
pub mod department;
pub mod employee;
pub mod role;
pub mod search;
pub mod upload_log;

pub use company::{Company, CompanyDraft, business_key};
pub use department::{Department, department_key};
pub use employee::{Employee, EmployeeDraft};
pub use role::{EmployeeRole, RoleAssignment};
pub use search::{EmployeeProfile, EmployeeQuery, RoleSummary};
pub use upload_log::{BulkUploadLog, UploadCounts, UploadKind, UploadStatus};
