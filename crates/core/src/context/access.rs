//! The access identity materialized into one transaction.

use crate::config::PrincipalMap;
use crate::error::ContextError;
use crate::scope::{CompanyId, Role, ScopeUser, UserId};

/// A validated access identity, ready to be applied to a transaction.
///
/// Building an `AccessContext` is where the raw role string from the
/// directory meets the closed [`Role`] set: an unrecognized role fails
/// here, before any transaction is opened, and is never downgraded to a
/// weaker principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    user_id: Option<UserId>,
    company_id: Option<CompanyId>,
    role: Role,
    principal: String,
}

impl AccessContext {
    /// Builds the context for a scoped user.
    ///
    /// Fails with [`ContextError::UnknownRole`] when the stored role is
    /// not one of the recognized application roles.
    pub fn for_user(user: &ScopeUser, principals: &PrincipalMap) -> Result<Self, ContextError> {
        let role = Role::parse(&user.role).ok_or_else(|| ContextError::UnknownRole {
            role: user.role.clone(),
        })?;

        Ok(Self {
            user_id: Some(user.id),
            company_id: Some(user.company_id),
            role,
            principal: principals.for_role(role).to_string(),
        })
    }

    /// Builds the administrative context.
    ///
    /// Carries no user or company; only the role parameter and the admin
    /// principal are applied.
    pub fn admin(principals: &PrincipalMap) -> Self {
        Self {
            user_id: None,
            company_id: None,
            role: Role::Admin,
            principal: principals.admin.clone(),
        }
    }

    /// The acting user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// The company the context is bound to, if any.
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company_id
    }

    /// The validated application role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The database principal this context switches to.
    pub fn principal(&self) -> &str {
        &self.principal
    }
}
