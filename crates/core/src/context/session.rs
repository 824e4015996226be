//! Session parameter assembly and the scoped statement surface.

use std::sync::Arc;

use deadpool_postgres::Client;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::error::{BackendError, StorageError, StorageResult};

use super::access::AccessContext;

/// Builds the transaction-local configuration script for a context.
///
/// `SET` statements cannot take bound parameters, so values are
/// interpolated. Every value passes through [`escape_literal`]; principal
/// names were validated against the identifier pattern when the
/// configuration was loaded. `SET LOCAL` keeps all of it scoped to the
/// current transaction.
pub(crate) fn configure_sql(context: &AccessContext, statement_timeout_ms: u64) -> String {
    let mut script = String::new();

    script.push_str(&format!(
        "SET LOCAL statement_timeout = {};\n",
        statement_timeout_ms
    ));

    if let Some(user_id) = context.user_id() {
        script.push_str(&format!(
            "SET LOCAL app.current_user_id = '{}';\n",
            escape_literal(&user_id.to_string())
        ));
    }
    if let Some(company_id) = context.company_id() {
        script.push_str(&format!(
            "SET LOCAL app.current_company_id = '{}';\n",
            escape_literal(&company_id.to_string())
        ));
    }

    script.push_str(&format!(
        "SET LOCAL app.current_user_role = '{}';\n",
        escape_literal(context.role().as_str())
    ));
    script.push_str(&format!("SET LOCAL ROLE {};", context.principal()));

    script
}

/// Escapes a string for inclusion in a single-quoted SQL literal.
pub(crate) fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// A live scoped transaction handed to operation closures.
///
/// All statements issued through a session run inside the transaction the
/// executor opened, under the session parameters and principal it
/// established. Holding a `Session` past the executor call is harmless:
/// the transaction has ended and the connection's local state is gone, so
/// row-level security exposes nothing through a stale handle.
#[derive(Clone)]
pub struct Session {
    client: Arc<Client>,
    context: AccessContext,
}

impl Session {
    pub(crate) fn new(client: Arc<Client>, context: AccessContext) -> Self {
        Self { client, context }
    }

    /// The access context this session was established under.
    pub fn context(&self) -> &AccessContext {
        &self.context
    }

    /// Executes a statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StorageResult<u64> {
        self.client.execute(sql, params).await.map_err(query_error)
    }

    /// Runs a query returning all rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StorageResult<Vec<Row>> {
        self.client.query(sql, params).await.map_err(query_error)
    }

    /// Runs a query returning at most one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StorageResult<Option<Row>> {
        self.client.query_opt(sql, params).await.map_err(query_error)
    }

    /// Runs a query that must return exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StorageResult<Row> {
        self.client.query_one(sql, params).await.map_err(query_error)
    }
}

fn query_error(e: tokio_postgres::Error) -> StorageError {
    StorageError::Backend(BackendError::QueryFailed {
        message: e.to_string(),
    })
}
