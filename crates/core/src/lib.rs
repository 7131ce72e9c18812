//! `talentverify-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and the sensitive-value wrapper shared by
//! the codec and the entity model.

pub mod entity;
pub mod error;
pub mod id;
pub mod sensitive;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, DepartmentId, EmployeeId, RoleId, UploadId, UserId};
pub use sensitive::{DECRYPTION_FAILED, SensitiveValue};
pub use value_object::ValueObject;
