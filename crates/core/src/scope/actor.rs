//! The access scope carried by every operation.

use serde::{Deserialize, Serialize};

use super::id::{CompanyId, UserId};

/// The user half of a resolved scope.
///
/// The role is kept as the raw string loaded from the directory; it is
/// parsed, and possibly rejected, only when a context is established. The
/// company id is not optional: a user cannot appear in a scope without the
/// company it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeUser {
    /// The user's identifier.
    pub id: UserId,
    /// The stored role string, unvalidated.
    pub role: String,
    /// The company the user belongs to.
    pub company_id: CompanyId,
}

impl ScopeUser {
    /// Creates a scope user.
    pub fn new(id: UserId, role: impl Into<String>, company_id: CompanyId) -> Self {
        Self {
            id,
            role: role.into(),
            company_id,
        }
    }
}

/// The company half of a resolved scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCompany {
    /// The company's identifier.
    pub id: CompanyId,
    /// The company's display name.
    pub name: String,
}

impl ScopeCompany {
    /// Creates a scope company.
    pub fn new(id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The access scope for a sequence of operations.
///
/// A scope carries the acting user and their company. Both halves are
/// optional, but never half-populated on the user side: a present user
/// always knows its company, so [`Scope::company_id`] resolves whenever a
/// user is present. Scopes are cheap to clone and are passed by reference
/// into every repository operation.
///
/// # Examples
///
/// ```
/// use palisade_core::scope::{CompanyId, Scope, ScopeCompany, ScopeUser, UserId};
///
/// let company = ScopeCompany::new(CompanyId::generate(), "Initech");
/// let user = ScopeUser::new(UserId::generate(), "user", company.id);
/// let scope = Scope::for_user(user.clone(), company.clone());
///
/// assert_eq!(scope.company_id(), Some(company.id));
///
/// // A company-only scope can subscribe to change events but cannot
/// // establish a user context.
/// let watcher = Scope::for_company(company);
/// assert!(!watcher.has_user());
/// assert_eq!(watcher.company_id(), Some(user.company_id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scope {
    user: Option<ScopeUser>,
    company: Option<ScopeCompany>,
}

impl Scope {
    /// Creates an empty scope with no user and no company.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a fully resolved scope for a user and their company.
    pub fn for_user(user: ScopeUser, company: ScopeCompany) -> Self {
        Self {
            user: Some(user),
            company: Some(company),
        }
    }

    /// Creates a company-only scope with no acting user.
    pub fn for_company(company: ScopeCompany) -> Self {
        Self {
            user: None,
            company: Some(company),
        }
    }

    /// Returns the user half, if present.
    pub fn user(&self) -> Option<&ScopeUser> {
        self.user.as_ref()
    }

    /// Returns the company half, if present.
    pub fn company(&self) -> Option<&ScopeCompany> {
        self.company.as_ref()
    }

    /// Returns `true` if the scope carries a user.
    pub fn has_user(&self) -> bool {
        self.user.is_some()
    }

    /// Resolves the company id for this scope.
    ///
    /// Prefers the company half, falling back to the user's own company.
    /// `None` only for scopes that carry neither half.
    pub fn company_id(&self) -> Option<CompanyId> {
        self.company
            .as_ref()
            .map(|c| c.id)
            .or_else(|| self.user.as_ref().map(|u| u.company_id))
    }
}
