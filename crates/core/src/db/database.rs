//! Connection pool handle.

use std::fmt::Debug;
use std::sync::Arc;

use deadpool_postgres::{Client, Config, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::{DatabaseConfig, PrincipalMap};
use crate::error::{BackendError, StorageResult};

use super::schema;

/// Cheap-to-clone handle over the PostgreSQL connection pool.
///
/// The pool connects as a single login account; per-transaction privilege
/// separation happens through `SET LOCAL ROLE` inside the executor, never
/// through separate pools.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    config: Arc<DatabaseConfig>,
}

impl Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("host", &self.config.host)
            .field("dbname", &self.config.dbname)
            .field("pool_size", &self.config.pool_size)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Validates the configuration and builds the pool without touching
    /// the network.
    ///
    /// Connections are established lazily on first checkout; use
    /// [`Database::connect`] to verify connectivity up front.
    pub fn new(config: DatabaseConfig) -> StorageResult<Self> {
        config.validate()?;
        let pool = Self::create_pool(&config)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Builds the pool and verifies connectivity with a round trip.
    pub async fn connect(config: DatabaseConfig) -> StorageResult<Self> {
        let db = Self::new(config)?;
        db.health_check().await?;
        tracing::info!(
            host = %db.config.host,
            dbname = %db.config.dbname,
            pool_size = db.config.pool_size,
            "database pool ready"
        );
        Ok(db)
    }

    /// Builds the pool from a `postgres://` connection string.
    pub async fn connect_url(url: &str) -> StorageResult<Self> {
        Self::connect(DatabaseConfig::from_url(url)).await
    }

    fn create_pool(config: &DatabaseConfig) -> StorageResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.dbname.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = config.password.clone();

        let pool = cfg
            .builder(NoTls)
            .map_err(|e| BackendError::ConnectionFailed {
                message: format!("failed to create pool builder: {}", e),
            })?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| BackendError::ConnectionFailed {
                message: e.to_string(),
            })?;

        Ok(pool)
    }

    /// Checks a client out of the pool.
    pub async fn client(&self) -> StorageResult<Client> {
        Ok(self.pool.get().await.map_err(|e| BackendError::ConnectionFailed {
            message: e.to_string(),
        })?)
    }

    /// Returns the configuration this pool was built from.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns the principal map used for role switching.
    pub fn principals(&self) -> &PrincipalMap {
        &self.config.principals
    }

    /// Verifies connectivity with a `SELECT 1` round trip.
    pub async fn health_check(&self) -> StorageResult<()> {
        let client = self.client().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| BackendError::QueryFailed {
                message: format!("health check failed: {}", e),
            })?;
        Ok(())
    }

    /// Initializes the schema, principals, and row-level-security policies.
    ///
    /// Idempotent; safe to run on every startup.
    pub async fn initialize_schema(&self) -> StorageResult<()> {
        let client = self.client().await?;
        schema::initialize(&client, &self.config).await
    }
}
