//! Palisade Core
//!
//! A tenant-isolated storage core for project data on PostgreSQL. Every
//! data access flows through a scoped access context that is materialized
//! per transaction as session-local parameters plus a switch to a
//! role-specific database principal; row-level security inside the
//! database enforces the tenant boundary as defense in depth even when
//! application-level filtering is bypassed.
//!
//! # Architecture
//!
//! - [`scope`] - who is acting: user, company, role
//! - [`context`] - the transactional executor that materializes a scope
//! - [`db`] - pool handle, schema, principals, row-level-security policies
//! - [`projects`] - tenant-scoped CRUD plus administrative counts
//! - [`identity`] - company/user directory and scope resolution
//! - [`bus`] - company-keyed change notifications
//! - [`config`] - pool and principal configuration
//! - [`error`] - error taxonomy
//!
//! # The isolation contract
//!
//! Each executor call owns exactly one transaction. Before the operation
//! closure runs, the executor applies `SET LOCAL` parameters carrying the
//! user id, company id, and role, and switches the connection to the
//! principal matching the role with `SET LOCAL ROLE`. Policies on every
//! tenant-owned table compare rows against those parameters, so even raw
//! SQL issued inside the context only sees the scope's company. Commit or
//! rollback reverts all of it before the connection returns to the pool.
//!
//! # Quick Start
//!
//! ```no_run
//! use palisade_core::bus::ChangeBus;
//! use palisade_core::config::DatabaseConfig;
//! use palisade_core::db::Database;
//! use palisade_core::identity::{Directory, NewCompany, NewUser, ScopeSource};
//! use palisade_core::projects::{ProjectDraft, Projects};
//! use palisade_core::scope::Role;
//!
//! # async fn demo() -> palisade_core::error::StorageResult<()> {
//! let db = Database::connect(DatabaseConfig::from_env()).await?;
//! db.initialize_schema().await?;
//!
//! let directory = Directory::new(db.clone());
//! let company = directory.create_company(NewCompany::new("Initech")).await?;
//! let user = directory
//!     .create_user(NewUser::new("ada@initech.test", Role::User, company.id))
//!     .await?;
//!
//! // After authentication, resolve the scope and work inside it.
//! let scope = directory.scope_for_user(user.id).await?.unwrap();
//!
//! let bus = ChangeBus::new();
//! let projects = Projects::new(db, bus.clone());
//! let mut events = bus.subscribe(&scope)?;
//!
//! let project = projects
//!     .create(&scope, ProjectDraft::new("Migration").with_description("Q3 rollout"))
//!     .await?;
//!
//! assert_eq!(projects.list(&scope).await?, vec![project]);
//! assert!(events.try_recv().is_ok());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod projects;
pub mod scope;

// Re-export commonly used types at the crate root
pub use bus::{ChangeBus, ProjectEvent, ProjectEventKind};
pub use config::{DatabaseConfig, PrincipalMap};
pub use context::{Executor, Session};
pub use db::Database;
pub use error::{StorageError, StorageResult};
pub use identity::{Company, Directory, ScopeSource, User};
pub use projects::{Project, ProjectDraft, ProjectPatch, Projects, SystemStats};
pub use scope::{CompanyId, ProjectId, Role, Scope, ScopeCompany, ScopeUser, UserId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
