//! Database principals and row-level-security policies.
//!
//! The database enforces the tenant boundary even if application-level
//! filtering is bypassed. Three `NOLOGIN` principals carry the privilege
//! tiers, and every tenant-owned table gets forced row-level security with
//! one policy per principal:
//!
//! ```sql
//! ALTER TABLE projects ENABLE ROW LEVEL SECURITY;
//! ALTER TABLE projects FORCE ROW LEVEL SECURITY;
//!
//! CREATE POLICY projects_company_isolation ON projects TO palisade_user
//!     USING (company_id = palisade_current_company_id())
//!     WITH CHECK (company_id = palisade_current_company_id());
//! ```
//!
//! The predicate reads the `app.current_company_id` session parameter with
//! the missing-OK form of `current_setting`, so a connection that never
//! established a context sees zero rows rather than an error. `FORCE`
//! keeps the policies binding even when the pool account owns the tables.

use crate::config::PrincipalMap;
use crate::error::{BackendError, StorageError, StorageResult};

/// Tenant-owned tables, paired with the column policies compare against.
const TENANT_TABLES: [(&str, &str); 3] = [
    ("companies", "id"),
    ("users", "company_id"),
    ("projects", "company_id"),
];

/// Installs principals, helper functions, grants, and policies.
///
/// The generated script is idempotent and is re-run on every schema
/// initialization.
pub(crate) async fn install(
    client: &deadpool_postgres::Client,
    principals: &PrincipalMap,
) -> StorageResult<()> {
    let script = install_script(principals);
    client
        .batch_execute(&script)
        .await
        .map_err(|e| policy_error(format!("Failed to install access policies: {}", e)))?;

    tracing::info!(
        admin = %principals.admin,
        user = %principals.user,
        readonly = %principals.readonly,
        "row-level-security policies installed"
    );
    Ok(())
}

/// Builds the full principal and policy installation script.
///
/// Principal names were validated against the identifier pattern before
/// this runs, so bare interpolation is safe. Roles are created inside
/// duplicate-tolerant blocks and policies are dropped before being
/// recreated, keeping the script re-runnable.
pub(crate) fn install_script(principals: &PrincipalMap) -> String {
    let admin = &principals.admin;
    let user = &principals.user;
    let readonly = &principals.readonly;

    let mut ddl = String::new();

    // Principals. NOLOGIN: the pool account switches into them with
    // SET LOCAL ROLE, nothing connects as them directly. Membership is
    // granted to the connecting account so the switch is permitted.
    for name in [admin, user, readonly] {
        ddl.push_str(&format!(
            "DO $$ BEGIN CREATE ROLE {} NOLOGIN; EXCEPTION WHEN duplicate_object THEN NULL; END $$;\n",
            name
        ));
        ddl.push_str(&format!(
            "DO $$ BEGIN EXECUTE format('GRANT {} TO %I', current_user); END $$;\n",
            name
        ));
    }
    ddl.push('\n');

    ddl.push_str(&format!(
        "GRANT USAGE ON SCHEMA public TO {}, {}, {};\n\n",
        admin, user, readonly
    ));

    // Session parameter lookups used by the policies below and available
    // to SQL consumers for auditing.
    ddl.push_str(
        "CREATE OR REPLACE FUNCTION palisade_current_user_id() RETURNS uuid\n    \
         LANGUAGE sql STABLE AS $$ SELECT NULLIF(current_setting('app.current_user_id', true), '')::uuid $$;\n",
    );
    ddl.push_str(
        "CREATE OR REPLACE FUNCTION palisade_current_company_id() RETURNS uuid\n    \
         LANGUAGE sql STABLE AS $$ SELECT NULLIF(current_setting('app.current_company_id', true), '')::uuid $$;\n",
    );
    ddl.push_str(
        "CREATE OR REPLACE FUNCTION palisade_role_is_admin() RETURNS boolean\n    \
         LANGUAGE sql STABLE AS $$ SELECT current_setting('app.current_user_role', true) = 'admin' $$;\n\n",
    );

    // Table grants. Writes to the directory tables are reserved for the
    // admin principal; the user principal only writes projects.
    ddl.push_str(&format!(
        "GRANT SELECT, INSERT, UPDATE, DELETE ON companies, users, projects TO {};\n",
        admin
    ));
    ddl.push_str(&format!("GRANT SELECT ON companies, users TO {};\n", user));
    ddl.push_str(&format!(
        "GRANT SELECT, INSERT, UPDATE, DELETE ON projects TO {};\n",
        user
    ));
    ddl.push_str(&format!(
        "GRANT SELECT ON companies, users, projects TO {};\n\n",
        readonly
    ));

    for (table, company_column) in TENANT_TABLES {
        ddl.push_str(&format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY;\n", table));
        ddl.push_str(&format!("ALTER TABLE {} FORCE ROW LEVEL SECURITY;\n", table));

        ddl.push_str(&format!(
            "DROP POLICY IF EXISTS {table}_admin_access ON {table};\n\
             CREATE POLICY {table}_admin_access ON {table} TO {admin} USING (true) WITH CHECK (true);\n",
        ));
        ddl.push_str(&format!(
            "DROP POLICY IF EXISTS {table}_company_isolation ON {table};\n\
             CREATE POLICY {table}_company_isolation ON {table} TO {user} \
             USING ({company_column} = palisade_current_company_id()) \
             WITH CHECK ({company_column} = palisade_current_company_id());\n",
        ));
        ddl.push_str(&format!(
            "DROP POLICY IF EXISTS {table}_readonly_access ON {table};\n\
             CREATE POLICY {table}_readonly_access ON {table} FOR SELECT TO {readonly} \
             USING ({company_column} = palisade_current_company_id());\n\n",
        ));
    }

    ddl
}

fn policy_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SchemaSetup { message })
}
