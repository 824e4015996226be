//! Identity scope types for tenant-isolated storage.
//!
//! This module provides the core types describing *who* is acting: the
//! authenticated user, their company (the tenant), and their application
//! role. Every data access flows through a [`Scope`], and the executor
//! materializes that scope as transaction-local database state before any
//! statement runs.
//!
//! # Core Types
//!
//! - [`UserId`], [`CompanyId`], [`ProjectId`] - UUID-backed identifiers
//! - [`Role`] - the closed set of application roles
//! - [`ScopeUser`], [`ScopeCompany`] - the resolved halves of a scope
//! - [`Scope`] - the access scope carried by every operation
//!
//! # Design Philosophy
//!
//! Tenant isolation is enforced at the type level before it is enforced in
//! the database. A [`ScopeUser`] always carries the company it belongs to,
//! so a populated scope can never describe a user floating outside a
//! tenant. Code that cannot resolve both halves must hand out an anonymous
//! scope instead; the executor then refuses to establish a user context
//! for it.
//!
//! # Examples
//!
//! ```
//! use palisade_core::scope::{CompanyId, Role, Scope, ScopeCompany, ScopeUser, UserId};
//!
//! let company = ScopeCompany::new(CompanyId::generate(), "Initech");
//! let user = ScopeUser::new(UserId::generate(), Role::User.as_str(), company.id);
//!
//! let scope = Scope::for_user(user, company);
//! assert!(scope.has_user());
//! assert!(scope.company_id().is_some());
//!
//! let anonymous = Scope::anonymous();
//! assert!(!anonymous.has_user());
//! assert_eq!(anonymous.company_id(), None);
//! ```

mod actor;
mod id;
mod role;

pub use actor::{Scope, ScopeCompany, ScopeUser};
pub use id::{CompanyId, ProjectId, UserId};
pub use role::Role;
