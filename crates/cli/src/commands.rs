use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::Serialize;

use talentverify_auth::{Principal, UserRole};
use talentverify_core::{CompanyId, UserId};
use talentverify_crypto::FieldCodec;
use talentverify_directory::EmployeeQuery;
use talentverify_infra::{AppConfig, Directory, DirectoryStore, UploadAuditSink};
use talentverify_ingest::{BulkEngine, Upload};

use crate::{ActorArgs, Commands, RoleArg};

impl RoleArg {
    fn user_role(self) -> UserRole {
        match self {
            RoleArg::Admin => UserRole::Admin,
            RoleArg::Staff => UserRole::TalentVerifyStaff,
            RoleArg::CompanyAdmin => UserRole::CompanyAdmin,
            RoleArg::CompanyStaff => UserRole::CompanyStaff,
        }
    }
}

impl ActorArgs {
    fn principal<S: DirectoryStore>(&self, directory: &Directory<S>) -> Result<Principal> {
        let user_id = self.user.unwrap_or_else(UserId::new);
        let role = self.role.user_role();
        if !role.is_company_role() {
            return Ok(Principal {
                user_id,
                role,
                company_id: None,
            });
        }

        let registration = self
            .company
            .as_deref()
            .ok_or_else(|| anyhow!("--company is required for role {}", role.as_str()))?;
        Ok(Principal::company_user(user_id, role, company_id(directory, registration)?))
    }
}

fn company_id<S: DirectoryStore>(directory: &Directory<S>, registration: &str) -> Result<CompanyId> {
    directory
        .company_index()?
        .get(registration.trim())
        .copied()
        .ok_or_else(|| anyhow!("no company with registration number '{registration}'"))
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload::new(file_name, bytes))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn run<S>(
    store: Arc<S>,
    codec: Arc<FieldCodec>,
    config: &AppConfig,
    actor: &ActorArgs,
    command: Commands,
) -> Result<()>
where
    S: DirectoryStore + UploadAuditSink,
{
    let directory = Directory::new(Arc::clone(&store), codec);
    let principal = actor.principal(&directory)?;
    let engine = BulkEngine::from_config(directory.clone(), Arc::clone(&store), config);
    let now = Utc::now();

    match command {
        Commands::Migrate => tracing::info!("in-memory store needs no migration"),
        Commands::UploadCompanies { file } => print(&engine.upload_companies(&principal, read_upload(&file)?)?)?,
        Commands::EditCompanies { file } => print(&engine.edit_companies(&principal, read_upload(&file)?)?)?,
        Commands::UploadEmployees { file } => print(&engine.upload_employees(&principal, read_upload(&file)?)?)?,
        Commands::EditEmployees { file } => print(&engine.edit_employees(&principal, read_upload(&file)?)?)?,
        Commands::Search {
            text,
            name,
            employer,
            department,
            job,
            start_year,
            end_year,
            active,
            history,
        } => {
            let query = EmployeeQuery {
                text,
                name,
                company: employer,
                department,
                role: job,
                start_year,
                end_year,
                active,
                include_history: history,
                ..EmployeeQuery::default()
            };
            print(&directory.search_employees(&principal, &query)?)?
        }
        Commands::History { employee } => print(&directory.role_history(&principal, employee)?)?,
        Commands::Stats { of: None } => print(&directory.directory_stats(&principal, now)?)?,
        Commands::Stats { of: Some(registration) } => {
            let id = company_id(&directory, &registration)?;
            print(&directory.company_stats(&principal, id, now)?)?
        }
        Commands::Uploads { mine } => print(&directory.upload_history(&principal, mine)?)?,
        Commands::Scrub => print(&directory.scrub_undecryptable(&principal, now)?)?,
    }
    Ok(())
}
