//! `talentverify-auth`: pure authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP, tokens and storage: callers
//! resolve a [`Principal`] however they like and ask it questions here.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, ensure_company_access};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::UserRole;
