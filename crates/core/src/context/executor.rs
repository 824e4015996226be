//! Scoped transaction execution.

use std::future::Future;
use std::sync::Arc;

use crate::db::Database;
use crate::error::{ContextError, StorageResult, TransactionError};
use crate::scope::Scope;

use super::access::AccessContext;
use super::session::{self, Session};

/// Runs operations inside scoped, transaction-bound access contexts.
///
/// Each call owns exactly one transaction. The operation closure receives
/// a [`Session`] and its result is the commit signal: `Ok` commits, `Err`
/// rolls back and the error is returned unchanged. Context setup happens
/// between `BEGIN` and the closure; any failure there rolls back and
/// surfaces as [`ContextError::Setup`].
///
/// # Examples
///
/// ```no_run
/// # use palisade_core::config::DatabaseConfig;
/// # use palisade_core::context::Executor;
/// # use palisade_core::db::Database;
/// # use palisade_core::scope::Scope;
/// # async fn demo(scope: Scope) -> palisade_core::error::StorageResult<()> {
/// let db = Database::connect(DatabaseConfig::from_env()).await?;
/// let executor = Executor::new(db);
///
/// let names: Vec<String> = executor
///     .run_with_user_context(&scope, |session| async move {
///         let rows = session.query("SELECT name FROM projects", &[]).await?;
///         Ok(rows.iter().map(|row| row.get(0)).collect())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    db: Database,
}

impl Executor {
    /// Creates an executor over the given pool handle.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying pool handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs `op` inside a context for the scope's user.
    ///
    /// Fails with [`ContextError::NoUserInScope`] before any connection is
    /// acquired when the scope has no user, and with
    /// [`ContextError::UnknownRole`] when the stored role is not
    /// recognized. The session carries the user id, company id, and role
    /// as transaction-local parameters, with the connection switched to
    /// the principal matching the role.
    pub async fn run_with_user_context<F, Fut, T>(&self, scope: &Scope, op: F) -> StorageResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let user = scope.user().ok_or(ContextError::NoUserInScope)?;
        let context = AccessContext::for_user(user, self.db.principals())?;
        self.run(context, op).await
    }

    /// Runs `op` inside the administrative context.
    ///
    /// No user or company parameters are applied; the connection switches
    /// to the admin principal, whose policies see across companies. The
    /// scope is never consulted.
    pub async fn run_with_admin_context<F, Fut, T>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let context = AccessContext::admin(self.db.principals());
        self.run(context, op).await
    }

    async fn run<F, Fut, T>(&self, context: AccessContext, op: F) -> StorageResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let client = self.db.client().await?;

        client
            .execute("BEGIN", &[])
            .await
            .map_err(|e| TransactionError::BeginFailed {
                message: e.to_string(),
            })?;

        let client = Arc::new(client);

        let script = session::configure_sql(&context, self.db.config().statement_timeout_ms());
        if let Err(e) = client.batch_execute(&script).await {
            tracing::error!(
                principal = %context.principal(),
                role = %context.role(),
                "context setup failed: {}",
                e
            );
            rollback_quietly(&client).await;
            return Err(ContextError::Setup {
                message: e.to_string(),
            }
            .into());
        }

        tracing::debug!(
            role = %context.role(),
            principal = %context.principal(),
            company = ?context.company_id(),
            "context established"
        );

        let result = op(Session::new(Arc::clone(&client), context)).await;

        match result {
            Ok(value) => {
                client
                    .execute("COMMIT", &[])
                    .await
                    .map_err(|e| TransactionError::CommitFailed {
                        message: e.to_string(),
                    })?;
                Ok(value)
            }
            Err(error) => {
                rollback_quietly(&client).await;
                Err(error)
            }
        }
    }
}

/// Rolls back without masking the error that got us here.
async fn rollback_quietly(client: &deadpool_postgres::Client) {
    if let Err(e) = client.execute("ROLLBACK", &[]).await {
        tracing::warn!("rollback failed: {}", e);
    }
}
