//! Postgres-backed directory store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | unique violation | `23505` | `Conflict` |
//! | foreign key violation | `23503` | `Integrity` |
//! | check violation | `23514` | `Integrity` |
//! | anything else | | `Storage` |
//!
//! ## Sync bridge
//!
//! The store traits are synchronous. Each call runs its future on the runtime
//! handle captured at construction, so callers must not invoke the store from
//! inside that runtime's async context.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{Span, instrument};

use talentverify_core::{CompanyId, DepartmentId, EmployeeId, RoleId, UploadId, UserId};
use talentverify_directory::{BulkUploadLog, Department, EmployeeRole, UploadCounts, UploadStatus};

use super::{Change, ChangeSet, DirectoryStore, StoreError, UploadAuditSink};
use crate::records::{CompanyRecord, EmployeeRecord};

/// Schema for the directory tables.
///
/// The partial unique index on `employee_roles` enforces at most one current
/// role per employee; the expression index on `departments` enforces
/// case-insensitive department names per company.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    registration_number TEXT NOT NULL,
    registration_date DATE NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    employee_count INTEGER NOT NULL DEFAULT 0 CHECK (employee_count >= 0),
    contact_person TEXT NOT NULL DEFAULT '',
    contact_phone TEXT,
    email TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS departments (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK (btrim(name) <> ''),
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS departments_company_name_key
    ON departments (company_id, lower(btrim(name)));

CREATE TABLE IF NOT EXISTS employees (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    employee_code TEXT,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    department_id UUID REFERENCES departments(id) ON DELETE SET NULL,
    current_role TEXT NOT NULL,
    join_date DATE NOT NULL,
    leave_date DATE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS employee_roles (
    id UUID PRIMARY KEY,
    employee_id UUID NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    department_id UUID REFERENCES departments(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE,
    duties TEXT NOT NULL DEFAULT '',
    is_current BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CHECK (end_date IS NULL OR end_date >= start_date)
);

CREATE UNIQUE INDEX IF NOT EXISTS employee_roles_one_current
    ON employee_roles (employee_id) WHERE is_current;

CREATE TABLE IF NOT EXISTS bulk_upload_logs (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    file_name TEXT NOT NULL,
    file_size BIGINT NOT NULL,
    upload_kind TEXT NOT NULL,
    records_processed INTEGER NOT NULL DEFAULT 0,
    records_created INTEGER NOT NULL DEFAULT 0,
    records_updated INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    error_details TEXT,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ
);
"#;

/// Postgres-backed directory store and upload audit sink.
///
/// Each `commit` runs in one SQL transaction; any failing statement rolls the
/// whole change set back.
#[derive(Debug, Clone)]
pub struct PostgresDirectoryStore {
    pool: Arc<PgPool>,
    handle: Handle,
}

impl PostgresDirectoryStore {
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            handle,
        }
    }

    /// Connect with a small pool on the given runtime.
    pub fn connect(database_url: &str, handle: Handle) -> Result<Self, StoreError> {
        let pool = handle
            .block_on(
                sqlx::postgres::PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url),
            )
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, handle))
    }

    /// Create tables and indexes if missing.
    #[instrument(skip(self), err)]
    pub fn migrate(&self) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            sqlx::raw_sql(SCHEMA)
                .execute(&*pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
            Ok(())
        })
    }
}

fn to_i32(value: u32, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Integrity(format!("{column} out of range: {value}")))
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Storage(format!("negative {column} in storage: {value}")))
}

fn decode_err(what: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Storage(format!("failed to decode {what} row: {e}"))
}

fn company_from_row(row: &PgRow) -> Result<CompanyRecord, StoreError> {
    let err = decode_err("company");
    Ok(CompanyRecord {
        id: CompanyId::from_uuid(row.try_get("id").map_err(&err)?),
        name: row.try_get("name").map_err(&err)?,
        registration_number: row.try_get("registration_number").map_err(&err)?,
        registration_date: row.try_get("registration_date").map_err(&err)?,
        address: row.try_get("address").map_err(&err)?,
        employee_count: to_u32(row.try_get("employee_count").map_err(&err)?, "employee_count")?,
        contact_person: row.try_get("contact_person").map_err(&err)?,
        contact_phone: row.try_get("contact_phone").map_err(&err)?,
        email: row.try_get("email").map_err(&err)?,
        created_at: row.try_get("created_at").map_err(&err)?,
        updated_at: row.try_get("updated_at").map_err(&err)?,
    })
}

fn department_from_row(row: &PgRow) -> Result<Department, StoreError> {
    let err = decode_err("department");
    Ok(Department {
        id: DepartmentId::from_uuid(row.try_get("id").map_err(&err)?),
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(&err)?),
        name: row.try_get("name").map_err(&err)?,
        created_at: row.try_get("created_at").map_err(&err)?,
        updated_at: row.try_get("updated_at").map_err(&err)?,
    })
}

fn employee_from_row(row: &PgRow) -> Result<EmployeeRecord, StoreError> {
    let err = decode_err("employee");
    let department: Option<uuid::Uuid> = row.try_get("department_id").map_err(&err)?;
    Ok(EmployeeRecord {
        id: EmployeeId::from_uuid(row.try_get("id").map_err(&err)?),
        name: row.try_get("name").map_err(&err)?,
        employee_code: row.try_get("employee_code").map_err(&err)?,
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(&err)?),
        department_id: department.map(DepartmentId::from_uuid),
        current_role: row.try_get("current_role").map_err(&err)?,
        join_date: row.try_get("join_date").map_err(&err)?,
        leave_date: row.try_get("leave_date").map_err(&err)?,
        is_active: row.try_get("is_active").map_err(&err)?,
        created_at: row.try_get("created_at").map_err(&err)?,
        updated_at: row.try_get("updated_at").map_err(&err)?,
    })
}

fn role_from_row(row: &PgRow) -> Result<EmployeeRole, StoreError> {
    let err = decode_err("employee role");
    let department: Option<uuid::Uuid> = row.try_get("department_id").map_err(&err)?;
    Ok(EmployeeRole {
        id: RoleId::from_uuid(row.try_get("id").map_err(&err)?),
        employee_id: EmployeeId::from_uuid(row.try_get("employee_id").map_err(&err)?),
        company_id: CompanyId::from_uuid(row.try_get("company_id").map_err(&err)?),
        department_id: department.map(DepartmentId::from_uuid),
        title: row.try_get("title").map_err(&err)?,
        start_date: row.try_get("start_date").map_err(&err)?,
        end_date: row.try_get("end_date").map_err(&err)?,
        duties: row.try_get("duties").map_err(&err)?,
        is_current: row.try_get("is_current").map_err(&err)?,
        created_at: row.try_get("created_at").map_err(&err)?,
        updated_at: row.try_get("updated_at").map_err(&err)?,
    })
}

fn upload_from_row(row: &PgRow) -> Result<BulkUploadLog, StoreError> {
    let err = decode_err("upload log");
    let kind: String = row.try_get("upload_kind").map_err(&err)?;
    let status: String = row.try_get("status").map_err(&err)?;
    let file_size: i64 = row.try_get("file_size").map_err(&err)?;
    Ok(BulkUploadLog {
        id: UploadId::from_uuid(row.try_get("id").map_err(&err)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(&err)?),
        file_name: row.try_get("file_name").map_err(&err)?,
        file_size: u64::try_from(file_size).unwrap_or_default(),
        kind: kind.parse().map_err(|e| StoreError::Storage(format!("{e}")))?,
        counts: UploadCounts {
            processed: to_u32(row.try_get("records_processed").map_err(&err)?, "records_processed")?,
            created: to_u32(row.try_get("records_created").map_err(&err)?, "records_created")?,
            updated: to_u32(row.try_get("records_updated").map_err(&err)?, "records_updated")?,
            errors: to_u32(row.try_get("errors").map_err(&err)?, "errors")?,
        },
        error_details: row.try_get("error_details").map_err(&err)?,
        status: status.parse().map_err(|e| StoreError::Storage(format!("{e}")))?,
        created_at: row.try_get("created_at").map_err(&err)?,
        completed_at: row.try_get("completed_at").map_err(&err)?,
    })
}

async fn upsert_company(
    tx: &mut Transaction<'_, Postgres>,
    record: &CompanyRecord,
    insert: bool,
) -> Result<(), StoreError> {
    let sql = if insert {
        r#"
        INSERT INTO companies (
            id, name, registration_number, registration_date, address, employee_count,
            contact_person, contact_phone, email, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#
    } else {
        r#"
        UPDATE companies SET
            name = $2, registration_number = $3, registration_date = $4, address = $5,
            employee_count = $6, contact_person = $7, contact_phone = $8, email = $9,
            created_at = $10, updated_at = $11
        WHERE id = $1
        "#
    };
    let result = sqlx::query(sql)
        .bind(record.id.as_uuid())
        .bind(&record.name)
        .bind(&record.registration_number)
        .bind(record.registration_date)
        .bind(&record.address)
        .bind(to_i32(record.employee_count, "employee_count")?)
        .bind(&record.contact_person)
        .bind(&record.contact_phone)
        .bind(&record.email)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_company", e))?;
    if !insert && result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("company {}", record.id)));
    }
    Ok(())
}

async fn upsert_employee(
    tx: &mut Transaction<'_, Postgres>,
    record: &EmployeeRecord,
    insert: bool,
) -> Result<(), StoreError> {
    check_department(tx, record.company_id, record.department_id).await?;
    let sql = if insert {
        r#"
        INSERT INTO employees (
            id, name, employee_code, company_id, department_id, current_role,
            join_date, leave_date, is_active, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#
    } else {
        r#"
        UPDATE employees SET
            name = $2, employee_code = $3, company_id = $4, department_id = $5,
            current_role = $6, join_date = $7, leave_date = $8, is_active = $9,
            created_at = $10, updated_at = $11
        WHERE id = $1
        "#
    };
    let result = sqlx::query(sql)
        .bind(record.id.as_uuid())
        .bind(&record.name)
        .bind(&record.employee_code)
        .bind(record.company_id.as_uuid())
        .bind(record.department_id.map(|d| *d.as_uuid()))
        .bind(&record.current_role)
        .bind(record.join_date)
        .bind(record.leave_date)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_employee", e))?;
    if !insert && result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("employee {}", record.id)));
    }
    Ok(())
}

/// Foreign keys don't see that a department belongs to the same company.
async fn check_department(
    tx: &mut Transaction<'_, Postgres>,
    company_id: CompanyId,
    department_id: Option<DepartmentId>,
) -> Result<(), StoreError> {
    let Some(department_id) = department_id else {
        return Ok(());
    };
    let owner: Option<uuid::Uuid> = sqlx::query_scalar("SELECT company_id FROM departments WHERE id = $1")
        .bind(department_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("check_department", e))?;
    match owner {
        Some(owner) if owner == *company_id.as_uuid() => Ok(()),
        Some(_) => Err(StoreError::Integrity(format!(
            "department {department_id} belongs to another company"
        ))),
        None => Err(StoreError::Integrity(format!("department {department_id} does not exist"))),
    }
}

async fn close_current_roles(
    tx: &mut Transaction<'_, Postgres>,
    employee_id: EmployeeId,
    end_date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE employee_roles SET
            is_current = FALSE,
            end_date = COALESCE(end_date, GREATEST(start_date, $2)),
            updated_at = $3
        WHERE employee_id = $1 AND is_current
        "#,
    )
    .bind(employee_id.as_uuid())
    .bind(end_date)
    .bind(at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("close_current_roles", e))?;
    Ok(result.rows_affected())
}

async fn delete_by_id(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
    id: uuid::Uuid,
    what: String,
) -> Result<(), StoreError> {
    let result = sqlx::query(sql)
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(what));
    }
    Ok(())
}

async fn apply(tx: &mut Transaction<'_, Postgres>, change: &Change) -> Result<(), StoreError> {
    match change {
        Change::InsertCompany(record) => upsert_company(tx, record, true).await,
        Change::UpdateCompany(record) => upsert_company(tx, record, false).await,
        Change::DeleteCompany(id) => {
            delete_by_id(tx, "DELETE FROM companies WHERE id = $1", *id.as_uuid(), format!("company {id}")).await
        }
        Change::InsertDepartment(department) => {
            sqlx::query(
                r#"
                INSERT INTO departments (id, company_id, name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(department.id.as_uuid())
            .bind(department.company_id.as_uuid())
            .bind(&department.name)
            .bind(department.created_at)
            .bind(department.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_department", e))?;
            Ok(())
        }
        Change::DeleteDepartment(id) => {
            delete_by_id(tx, "DELETE FROM departments WHERE id = $1", *id.as_uuid(), format!("department {id}")).await
        }
        Change::InsertEmployee(record) => upsert_employee(tx, record, true).await,
        Change::UpdateEmployee(record) => upsert_employee(tx, record, false).await,
        Change::DeleteEmployee(id) => {
            delete_by_id(tx, "DELETE FROM employees WHERE id = $1", *id.as_uuid(), format!("employee {id}")).await
        }
        Change::CloseCurrentRoles { employee_id, end_date, at } => {
            close_current_roles(tx, *employee_id, *end_date, *at).await.map(|_| ())
        }
        Change::InsertRole(role) => {
            check_department(tx, role.company_id, role.department_id).await?;
            if role.is_current {
                close_current_roles(tx, role.employee_id, role.start_date, role.created_at).await?;
            }
            sqlx::query(
                r#"
                INSERT INTO employee_roles (
                    id, employee_id, company_id, department_id, title, start_date,
                    end_date, duties, is_current, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(role.id.as_uuid())
            .bind(role.employee_id.as_uuid())
            .bind(role.company_id.as_uuid())
            .bind(role.department_id.map(|d| *d.as_uuid()))
            .bind(&role.title)
            .bind(role.start_date)
            .bind(role.end_date)
            .bind(&role.duties)
            .bind(role.is_current)
            .bind(role.created_at)
            .bind(role.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;
            Ok(())
        }
        Change::RefreshEmployeeCount(company_id) => {
            sqlx::query(
                r#"
                UPDATE companies SET employee_count = (
                    SELECT COUNT(*) FROM employees WHERE company_id = $1 AND is_active
                )
                WHERE id = $1
                "#,
            )
            .bind(company_id.as_uuid())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("refresh_employee_count", e))?;
            Ok(())
        }
    }
}

impl DirectoryStore for PostgresDirectoryStore {
    fn companies(&self) -> Result<Vec<CompanyRecord>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query("SELECT * FROM companies ORDER BY created_at, id")
                .fetch_all(&*pool)
                .await
                .map_err(|e| map_sqlx_error("companies", e))?;
            rows.iter().map(company_from_row).collect()
        })
    }

    fn company(&self, id: CompanyId) -> Result<Option<CompanyRecord>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let row = sqlx::query("SELECT * FROM companies WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*pool)
                .await
                .map_err(|e| map_sqlx_error("company", e))?;
            row.as_ref().map(company_from_row).transpose()
        })
    }

    fn departments(&self, company_id: Option<CompanyId>) -> Result<Vec<Department>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query(
                "SELECT * FROM departments WHERE ($1::uuid IS NULL OR company_id = $1) ORDER BY created_at, id",
            )
            .bind(company_id.map(|c| *c.as_uuid()))
            .fetch_all(&*pool)
            .await
            .map_err(|e| map_sqlx_error("departments", e))?;
            rows.iter().map(department_from_row).collect()
        })
    }

    fn employees(&self, company_id: Option<CompanyId>) -> Result<Vec<EmployeeRecord>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query(
                "SELECT * FROM employees WHERE ($1::uuid IS NULL OR company_id = $1) ORDER BY created_at, id",
            )
            .bind(company_id.map(|c| *c.as_uuid()))
            .fetch_all(&*pool)
            .await
            .map_err(|e| map_sqlx_error("employees", e))?;
            rows.iter().map(employee_from_row).collect()
        })
    }

    fn employee(&self, id: EmployeeId) -> Result<Option<EmployeeRecord>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let row = sqlx::query("SELECT * FROM employees WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*pool)
                .await
                .map_err(|e| map_sqlx_error("employee", e))?;
            row.as_ref().map(employee_from_row).transpose()
        })
    }

    fn roles(&self, employee_id: EmployeeId) -> Result<Vec<EmployeeRole>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query(
                "SELECT * FROM employee_roles WHERE employee_id = $1 ORDER BY start_date DESC, created_at DESC",
            )
            .bind(employee_id.as_uuid())
            .fetch_all(&*pool)
            .await
            .map_err(|e| map_sqlx_error("roles", e))?;
            rows.iter().map(role_from_row).collect()
        })
    }

    fn company_roles(&self, company_id: CompanyId) -> Result<Vec<EmployeeRole>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query("SELECT * FROM employee_roles WHERE company_id = $1 ORDER BY updated_at DESC")
                .bind(company_id.as_uuid())
                .fetch_all(&*pool)
                .await
                .map_err(|e| map_sqlx_error("company_roles", e))?;
            rows.iter().map(role_from_row).collect()
        })
    }

    #[instrument(skip(self, changes), fields(change_count = changes.len()), err)]
    fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let span = Span::current();
            span.record("operation", "commit");

            let mut tx = pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", e))?;

            for change in changes.iter() {
                if let Err(err) = apply(&mut tx, change).await {
                    tx.rollback()
                        .await
                        .map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(err);
                }
            }

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))
        })
    }
}

impl UploadAuditSink for PostgresDirectoryStore {
    #[instrument(skip(self, log), fields(upload_id = %log.id, kind = %log.kind), err)]
    fn open(&self, log: BulkUploadLog) -> Result<UploadId, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            sqlx::query(
                r#"
                INSERT INTO bulk_upload_logs (
                    id, user_id, file_name, file_size, upload_kind, status, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(log.id.as_uuid())
            .bind(log.user_id.as_uuid())
            .bind(&log.file_name)
            .bind(i64::try_from(log.file_size).unwrap_or(i64::MAX))
            .bind(log.kind.as_str())
            .bind(log.status.as_str())
            .bind(log.created_at)
            .execute(&*pool)
            .await
            .map_err(|e| map_sqlx_error("open_upload", e))?;
            Ok(log.id)
        })
    }

    fn mark_completed(
        &self,
        id: UploadId,
        counts: UploadCounts,
        error_details: Option<String>,
    ) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let error_details = error_details.filter(|d| !d.is_empty());
        let affected = self.handle.block_on(async move {
            let result = sqlx::query(
                r#"
                UPDATE bulk_upload_logs SET
                    records_processed = $2, records_created = $3, records_updated = $4,
                    errors = $5, error_details = $6, status = $7, completed_at = $8
                WHERE id = $1 AND status = 'processing'
                "#,
            )
            .bind(id.as_uuid())
            .bind(to_i32(counts.processed, "records_processed")?)
            .bind(to_i32(counts.created, "records_created")?)
            .bind(to_i32(counts.updated, "records_updated")?)
            .bind(to_i32(counts.errors, "errors")?)
            .bind(error_details)
            .bind(UploadStatus::Completed.as_str())
            .bind(Utc::now())
            .execute(&*pool)
            .await
            .map_err(|e| map_sqlx_error("complete_upload", e))?;
            Ok::<_, StoreError>(result.rows_affected())
        })?;
        self.terminal_outcome(id, affected)
    }

    fn mark_failed(&self, id: UploadId, detail: &str) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let detail = detail.to_string();
        let affected = self.handle.block_on(async move {
            let result = sqlx::query(
                r#"
                UPDATE bulk_upload_logs SET error_details = $2, status = $3, completed_at = $4
                WHERE id = $1 AND status = 'processing'
                "#,
            )
            .bind(id.as_uuid())
            .bind(detail)
            .bind(UploadStatus::Failed.as_str())
            .bind(Utc::now())
            .execute(&*pool)
            .await
            .map_err(|e| map_sqlx_error("fail_upload", e))?;
            Ok::<_, StoreError>(result.rows_affected())
        })?;
        self.terminal_outcome(id, affected)
    }

    fn upload(&self, id: UploadId) -> Result<Option<BulkUploadLog>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let row = sqlx::query("SELECT * FROM bulk_upload_logs WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*pool)
                .await
                .map_err(|e| map_sqlx_error("upload", e))?;
            row.as_ref().map(upload_from_row).transpose()
        })
    }

    fn uploads(&self, user_id: Option<UserId>) -> Result<Vec<BulkUploadLog>, StoreError> {
        let pool = self.pool.clone();
        self.handle.block_on(async move {
            let rows = sqlx::query(
                r#"
                SELECT * FROM bulk_upload_logs
                WHERE $1::uuid IS NULL OR user_id = $1
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(user_id.map(|u| *u.as_uuid()))
            .fetch_all(&*pool)
            .await
            .map_err(|e| map_sqlx_error("uploads", e))?;
            rows.iter().map(upload_from_row).collect()
        })
    }
}

impl PostgresDirectoryStore {
    /// Zero rows updated means the log is missing or already terminal.
    fn terminal_outcome(&self, id: UploadId, affected: u64) -> Result<(), StoreError> {
        if affected > 0 {
            return Ok(());
        }
        match self.upload(id)? {
            Some(log) => Err(StoreError::Conflict(format!(
                "upload {id} is already {}",
                log.status.as_str()
            ))),
            None => Err(StoreError::NotFound(format!("upload {id}"))),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Integrity(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {operation}")),
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
