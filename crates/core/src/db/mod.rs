//! PostgreSQL pool, schema, and policy management.
//!
//! The [`Database`] handle owns the connection pool and knows how to
//! provision the schema: tables, the three `NOLOGIN` principals, the
//! session-parameter helper functions, and the row-level-security policies
//! that enforce the tenant boundary inside the database itself.

mod database;
mod policy;
mod schema;

pub use database::Database;
pub use schema::SCHEMA_VERSION;
