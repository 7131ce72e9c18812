mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use talentverify_core::{EmployeeId, UserId};
use talentverify_crypto::FieldCodec;
use talentverify_infra::{AppConfig, InMemoryDirectoryStore, PostgresDirectoryStore};
use talentverify_observability::LogFormat;

#[derive(Parser)]
#[command(name = "talentverify")]
#[command(about = "Talent Verify directory: bulk uploads, search and maintenance")]
struct Cli {
    /// Log output on stderr: json or compact
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(flatten)]
    actor: ActorArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Who the command runs as.
#[derive(Args)]
struct ActorArgs {
    #[arg(long, value_enum, global = true, default_value = "staff")]
    role: RoleArg,

    /// Registration number of the acting user's company (company roles)
    #[arg(long, global = true)]
    company: Option<String>,

    /// User id recorded in upload logs; random when omitted
    #[arg(long, global = true)]
    user: Option<UserId>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Admin,
    Staff,
    CompanyAdmin,
    CompanyStaff,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the database schema
    Migrate,

    /// Create companies from a CSV, TXT or Excel file
    UploadCompanies { file: PathBuf },

    /// Update companies matched by registration number
    EditCompanies { file: PathBuf },

    /// Create employees with their first role
    UploadEmployees { file: PathBuf },

    /// Update employees matched by employee ID
    EditEmployees { file: PathBuf },

    /// Search employees
    Search {
        /// Free text across name, employee ID, company, department and role
        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        name: Option<String>,

        /// Company name
        #[arg(long)]
        employer: Option<String>,

        #[arg(long)]
        department: Option<String>,

        /// Job title
        #[arg(long)]
        job: Option<String>,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        #[arg(long)]
        active: Option<bool>,

        /// Match company, department and role against past roles too
        #[arg(long)]
        history: bool,
    },

    /// Role history of one employee, newest first
    History { employee: EmployeeId },

    /// Dashboard figures, directory-wide or for one company
    Stats {
        /// Registration number of the company
        #[arg(long)]
        of: Option<String>,
    },

    /// Bulk upload history
    Uploads {
        /// Only uploads by --user
        #[arg(long)]
        mine: bool,
    },

    /// Blank sensitive fields that no longer decrypt
    Scrub,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    talentverify_observability::init_with(cli.log_format, "info");

    let config = AppConfig::from_env()?;
    let codec = Arc::new(FieldCodec::new(config.key_source()));

    match config.database_url.clone() {
        Some(url) => {
            // The store drives sqlx on this runtime from the calling thread.
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the async runtime")?;
            let store = Arc::new(PostgresDirectoryStore::connect(&url, runtime.handle().clone())?);
            if matches!(cli.command, Commands::Migrate) {
                store.migrate()?;
                tracing::info!("schema is up to date");
                return Ok(());
            }
            commands::run(store, codec, &config, &cli.actor, cli.command)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using an in-memory store, nothing will persist");
            let store = Arc::new(InMemoryDirectoryStore::new());
            commands::run(store, codec, &config, &cli.actor, cli.command)
        }
    }
}
