//! Infrastructure layer: configuration, storage, and the directory repository.
//!
//! Entities from `talentverify-directory` never reach storage directly. The
//! [`mapping`] module seals their sensitive attributes into storage
//! [`records`] through the shared [`FieldCodec`](talentverify_crypto::FieldCodec)
//! and opens them again on the way out; stores only ever see tokens.

pub mod config;
pub mod mapping;
pub mod records;
pub mod reports;
pub mod repository;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use records::{CompanyRecord, EmployeeRecord};
pub use reports::{ActivityEntry, CompanyStats, DepartmentHeadcount, DirectoryStats, RoleActivity};
pub use repository::{Directory, RepositoryError, UnitOfWork};
pub use services::ScrubReport;
pub use store::{
    Change, ChangeSet, DirectoryStore, InMemoryDirectoryStore, PostgresDirectoryStore, StoreError,
    UploadAuditSink,
};
