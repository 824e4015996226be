//! Company and user directory.
//!
//! Companies and users are provisioned under the administrative context;
//! the admin principal is the only one whose policies allow writing the
//! directory tables across companies. [`Directory::scope_for_user`] is the
//! bridge called after authentication: it either resolves both halves of
//! a scope or yields no scope at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::context::Executor;
use crate::db::Database;
use crate::error::{StorageResult, ValidationError};
use crate::scope::{CompanyId, Role, Scope, ScopeCompany, ScopeUser, UserId};

/// A company record, the unit of tenancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    /// The company's identifier.
    pub id: CompanyId,
    /// The company's display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// The scope half describing this company.
    pub fn scope_company(&self) -> ScopeCompany {
        ScopeCompany::new(self.id, self.name.clone())
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }
}

/// A user record as stored in the directory.
///
/// The role is kept raw here; it is validated against the closed role set
/// when a context is established, not when the row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's identifier.
    pub id: UserId,
    /// The user's email address, unique across the directory.
    pub email: String,
    /// The stored role string.
    pub role: String,
    /// The company the user belongs to.
    pub company_id: CompanyId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The scope half describing this user.
    pub fn scope_user(&self) -> ScopeUser {
        ScopeUser::new(self.id, self.role.clone(), self.company_id)
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            role: row.get("role"),
            company_id: row.get("company_id"),
            created_at: row.get("created_at"),
        }
    }
}

/// Input for provisioning a company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompany {
    /// The company name. Trimmed before storage; must not be blank.
    pub name: String,
}

impl NewCompany {
    /// Creates the input.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Input for provisioning a user.
///
/// Only recognized roles can be provisioned; raw role strings enter the
/// system exclusively through pre-existing rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// The user's email address.
    pub email: String,
    /// The user's role.
    pub role: Role,
    /// The company the user belongs to.
    pub company_id: CompanyId,
}

impl NewUser {
    /// Creates the input.
    pub fn new(email: impl Into<String>, role: Role, company_id: CompanyId) -> Self {
        Self {
            email: email.into(),
            role,
            company_id,
        }
    }
}

/// Resolves authenticated users into access scopes.
#[async_trait]
pub trait ScopeSource: Send + Sync {
    /// Builds the scope for a user.
    ///
    /// Returns `None` when the user or their company cannot be resolved;
    /// a half-populated scope is never produced.
    async fn scope_for_user(&self, user_id: UserId) -> StorageResult<Option<Scope>>;
}

/// PostgreSQL-backed directory of companies and users.
#[derive(Debug, Clone)]
pub struct Directory {
    executor: Executor,
}

impl Directory {
    /// Creates the directory over a pool handle.
    pub fn new(db: Database) -> Self {
        Self {
            executor: Executor::new(db),
        }
    }

    /// Provisions a company. Administrative.
    pub async fn create_company(&self, input: NewCompany) -> StorageResult<Company> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::NameRequired.into());
        }

        let company = self
            .executor
            .run_with_admin_context(|session| async move {
                let id = CompanyId::generate();
                let row = session
                    .query_one(
                        "INSERT INTO companies (id, name) VALUES ($1, $2)
                         RETURNING id, name, created_at",
                        &[&id, &name],
                    )
                    .await?;
                Ok(Company::from_row(&row))
            })
            .await?;

        tracing::debug!(company = %company.id, name = %company.name, "company provisioned");
        Ok(company)
    }

    /// Provisions a user. Administrative.
    pub async fn create_user(&self, input: NewUser) -> StorageResult<User> {
        let email = normalize_email(&input.email)?;
        let role = input.role;
        let company_id = input.company_id;

        let user = self
            .executor
            .run_with_admin_context(|session| async move {
                let id = UserId::generate();
                let row = session
                    .query_one(
                        "INSERT INTO users (id, email, role, company_id) VALUES ($1, $2, $3, $4)
                         RETURNING id, email, role, company_id, created_at",
                        &[&id, &email, &role.as_str(), &company_id],
                    )
                    .await?;
                Ok(User::from_row(&row))
            })
            .await?;

        tracing::debug!(user = %user.id, company = %user.company_id, role = %user.role, "user provisioned");
        Ok(user)
    }

    /// Looks up a company by id. Administrative.
    pub async fn company(&self, id: CompanyId) -> StorageResult<Option<Company>> {
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session
                    .query_opt(
                        "SELECT id, name, created_at FROM companies WHERE id = $1",
                        &[&id],
                    )
                    .await?;
                Ok(row.as_ref().map(Company::from_row))
            })
            .await
    }

    /// Looks up a user by id. Administrative.
    pub async fn user(&self, id: UserId) -> StorageResult<Option<User>> {
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session
                    .query_opt(
                        "SELECT id, email, role, company_id, created_at FROM users WHERE id = $1",
                        &[&id],
                    )
                    .await?;
                Ok(row.as_ref().map(User::from_row))
            })
            .await
    }

    /// Looks up a user by email. Administrative.
    pub async fn user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let email = email.trim().to_string();
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session
                    .query_opt(
                        "SELECT id, email, role, company_id, created_at FROM users WHERE email = $1",
                        &[&email],
                    )
                    .await?;
                Ok(row.as_ref().map(User::from_row))
            })
            .await
    }
}

#[async_trait]
impl ScopeSource for Directory {
    async fn scope_for_user(&self, user_id: UserId) -> StorageResult<Option<Scope>> {
        self.executor
            .run_with_admin_context(|session| async move {
                let row = session
                    .query_opt(
                        "SELECT u.id, u.email, u.role, u.company_id, u.created_at,
                                c.name AS company_name
                         FROM users u
                         JOIN companies c ON c.id = u.company_id
                         WHERE u.id = $1",
                        &[&user_id],
                    )
                    .await?;

                Ok(row.map(|row| {
                    let user = User::from_row(&row);
                    let company = ScopeCompany::new(user.company_id, row.get::<_, String>("company_name"));
                    Scope::for_user(user.scope_user(), company)
                }))
            })
            .await
    }
}

fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ValidationError::InvalidEmail {
            email: email.to_string(),
        });
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_accepts_plain_addresses() {
        assert_eq!(normalize_email("ada@acme.test").unwrap(), "ada@acme.test");
        assert_eq!(normalize_email("  ada@acme.test  ").unwrap(), "ada@acme.test");
    }

    #[test]
    fn test_normalize_email_rejects_malformed() {
        assert!(normalize_email("").is_err());
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@acme.test").is_err());
        assert!(normalize_email("ada@").is_err());
    }

    #[test]
    fn test_scope_halves_mirror_records() {
        let company_id = CompanyId::generate();
        let user = User {
            id: UserId::generate(),
            email: "ada@acme.test".to_string(),
            role: "readonly".to_string(),
            company_id,
            created_at: Utc::now(),
        };

        let half = user.scope_user();
        assert_eq!(half.id, user.id);
        assert_eq!(half.role, "readonly");
        assert_eq!(half.company_id, company_id);
    }
}
