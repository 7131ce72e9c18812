//! `talentverify-ingest`: bulk upload of companies and employees.
//!
//! [`BulkEngine`] turns an uploaded CSV, text or spreadsheet file into
//! directory changes. Each kind of upload has a [`reconcile::Reconciler`]
//! that decides, row by row, whether to create, update or skip; the engine
//! drives it and keeps the upload log.

pub mod engine;
pub mod fields;
pub mod outcome;
pub mod reconcile;
pub mod source;

pub use engine::{BulkEngine, Upload};
pub use outcome::{BatchReport, FileError, IngestError, RowError, RowOutcome};
pub use source::{FileFormat, Row, RowSource};
