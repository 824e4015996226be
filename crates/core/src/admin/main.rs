//! Palisade administrative CLI.
//!
//! Operational tasks for a palisade database: schema provisioning, demo
//! seed data, and aggregate stats.
//!
//! # Usage
//!
//! ```bash
//! # Install schema, principals, and policies
//! palisade-admin provision
//!
//! # Create demo companies, users, and projects
//! palisade-admin seed
//!
//! # Per-company project counts
//! palisade-admin stats
//!
//! # Configuration and connectivity check
//! palisade-admin check
//! ```
//!
//! # Environment Variables
//!
//! Connection settings come from `PALISADE_DATABASE_URL` or the
//! `PALISADE_PG_*` variables (`HOST`, `PORT`, `DBNAME`, `USER`,
//! `PASSWORD`, `POOL_SIZE`, `STATEMENT_TIMEOUT`).

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use palisade_core::bus::ChangeBus;
use palisade_core::config::DatabaseConfig;
use palisade_core::db::{Database, SCHEMA_VERSION};
use palisade_core::identity::{Directory, NewCompany, NewUser, ScopeSource};
use palisade_core::projects::{ProjectDraft, Projects};
use palisade_core::scope::Role;

#[derive(Debug, Parser)]
#[command(name = "palisade-admin")]
#[command(about = "Administrative tasks for the palisade storage core")]
struct Cli {
    /// Database connection URL; overrides the PALISADE_PG_* variables.
    #[arg(long, env = "PALISADE_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Initialize schema, principals, and row-level-security policies.
    Provision,
    /// Create demo companies, users, and projects.
    Seed,
    /// Print per-company project counts.
    Stats,
    /// Verify configuration and connectivity.
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,palisade_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match &cli.database_url {
        Some(url) => DatabaseConfig::from_url(url),
        None => DatabaseConfig::from_env(),
    };

    match cli.command {
        Command::Provision => provision(config).await,
        Command::Seed => seed(config).await,
        Command::Stats => stats(config).await,
        Command::Check => check(config).await,
    }
}

async fn provision(config: DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::connect(config).await?;
    db.initialize_schema().await?;
    println!(
        "Schema version {} ready; principals and policies installed.",
        SCHEMA_VERSION
    );
    Ok(())
}

async fn seed(config: DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::connect(config).await?;
    db.initialize_schema().await?;

    let directory = Directory::new(db.clone());
    if directory.user_by_email("admin@acme.test").await?.is_some() {
        println!("Seed data already present, nothing to do.");
        return Ok(());
    }

    let projects = Projects::new(db, ChangeBus::new());

    let acme = directory
        .create_company(NewCompany::new("Acme Manufacturing"))
        .await?;
    let globex = directory
        .create_company(NewCompany::new("Globex Logistics"))
        .await?;

    let admin = directory
        .create_user(NewUser::new("admin@acme.test", Role::Admin, acme.id))
        .await?;
    let engineer = directory
        .create_user(NewUser::new("eng@acme.test", Role::User, acme.id))
        .await?;
    let viewer = directory
        .create_user(NewUser::new("viewer@acme.test", Role::Readonly, acme.id))
        .await?;
    let ops = directory
        .create_user(NewUser::new("ops@globex.test", Role::User, globex.id))
        .await?;

    let acme_scope = directory
        .scope_for_user(engineer.id)
        .await?
        .ok_or("seeded user has no resolvable scope")?;
    projects
        .create(&acme_scope, ProjectDraft::new("Assembly line refresh"))
        .await?;
    projects
        .create(
            &acme_scope,
            ProjectDraft::new("Warehouse audit").with_description("Initial pass"),
        )
        .await?;

    let globex_scope = directory
        .scope_for_user(ops.id)
        .await?
        .ok_or("seeded user has no resolvable scope")?;
    projects
        .create(&globex_scope, ProjectDraft::new("Fleet tracking"))
        .await?;

    println!("Seeded 2 companies and 3 projects. Users:");
    for user in [&admin, &engineer, &viewer, &ops] {
        println!("  {:<22} {}", user.email, user.role);
    }
    Ok(())
}

async fn stats(config: DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::connect(config).await?;
    let projects = Projects::new(db, ChangeBus::new());
    let stats = projects.stats().await?;

    println!("Projects by company:");
    for company in &stats.companies {
        println!(
            "  {:<30} {:>6}  ({})",
            company.company_name, company.projects, company.company_id
        );
    }
    println!("  {:<30} {:>6}", "total", stats.total_projects);
    Ok(())
}

async fn check(config: DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let target = format!("{}:{}/{}", config.host, config.port, config.dbname);
    let db = Database::connect(config).await?;
    db.health_check().await?;
    println!("Connection to {} ok.", target);
    Ok(())
}
