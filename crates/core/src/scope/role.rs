//! The closed set of application roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A recognized application role.
///
/// Roles are stored as lowercase strings in the directory and carried
/// verbatim into the `app.current_user_role` session parameter. The set is
/// closed: a stored role outside this enum is rejected when the context is
/// established, never coerced to a weaker role.
///
/// # Examples
///
/// ```
/// use palisade_core::scope::Role;
///
/// assert_eq!(Role::parse("readonly"), Some(Role::Readonly));
/// assert_eq!(Role::parse("superuser"), None);
/// assert_eq!(Role::Admin.as_str(), "admin");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access across all companies.
    Admin,
    /// Read and write access within the user's own company.
    User,
    /// Read-only access within the user's own company.
    Readonly,
}

impl Role {
    /// All recognized roles.
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Readonly];

    /// Returns the stored (lowercase) form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Readonly => "readonly",
        }
    }

    /// Parses a stored role string.
    ///
    /// Matching is exact and case-sensitive; anything outside the three
    /// recognized values returns `None`.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "readonly" => Some(Role::Readonly),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
