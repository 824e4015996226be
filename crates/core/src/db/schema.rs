//! Schema definitions and versioned initialization.

use crate::config::DatabaseConfig;
use crate::error::{BackendError, StorageError, StorageResult};

use super::policy;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initializes the database schema.
///
/// Creates the tables and indexes when the database is fresh, records the
/// schema version, and re-applies principals and row-level-security
/// policies on every run so they follow the configured principal names.
pub(crate) async fn initialize(
    client: &deadpool_postgres::Client,
    config: &DatabaseConfig,
) -> StorageResult<()> {
    let current_version = get_schema_version(client).await?;

    if current_version == 0 {
        create_schema_v1(client).await?;
        set_schema_version(client, SCHEMA_VERSION).await?;
    } else if current_version > SCHEMA_VERSION {
        return Err(pg_error(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    policy::install(client, &config.principals).await?;

    tracing::info!(version = SCHEMA_VERSION, "database schema ready");
    Ok(())
}

/// Get the current schema version.
async fn get_schema_version(client: &deadpool_postgres::Client) -> StorageResult<i32> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
            &[],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to create schema_version table: {}", e)))?;

    let row = client
        .query_opt("SELECT version FROM schema_version LIMIT 1", &[])
        .await
        .map_err(|e| pg_error(format!("Failed to query schema version: {}", e)))?;

    Ok(row.map(|r| r.get::<_, i32>(0)).unwrap_or(0))
}

/// Set the schema version.
async fn set_schema_version(client: &deadpool_postgres::Client, version: i32) -> StorageResult<()> {
    client
        .execute("DELETE FROM schema_version", &[])
        .await
        .map_err(|e| pg_error(format!("Failed to clear schema_version: {}", e)))?;

    client
        .execute(
            "INSERT INTO schema_version (version) VALUES ($1)",
            &[&version],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1).
async fn create_schema_v1(client: &deadpool_postgres::Client) -> StorageResult<()> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS companies (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to create companies table: {}", e)))?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to create users table: {}", e)))?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY,
                company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
            &[],
        )
        .await
        .map_err(|e| pg_error(format!("Failed to create projects table: {}", e)))?;

    create_indexes(client).await?;

    Ok(())
}

/// Create indexes for efficient tenant-scoped queries.
async fn create_indexes(client: &deadpool_postgres::Client) -> StorageResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_users_company ON users(company_id)",
        "CREATE INDEX IF NOT EXISTS idx_projects_company ON projects(company_id)",
        "CREATE INDEX IF NOT EXISTS idx_projects_company_name ON projects(company_id, name)",
        "CREATE INDEX IF NOT EXISTS idx_projects_company_created ON projects(company_id, created_at)",
    ];

    for index_sql in indexes {
        client
            .execute(index_sql, &[])
            .await
            .map_err(|e| pg_error(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}

fn pg_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SchemaSetup { message })
}
