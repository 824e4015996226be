//! Error types for the isolation core.
//!
//! This module defines all error types used throughout the crate, following
//! a hierarchy that separates context-establishment errors, transaction
//! control errors, resource state errors, validation errors, and backend
//! errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::scope::ProjectId;

/// The primary error type for all storage operations.
///
/// This enum encompasses all possible errors that can occur while
/// establishing a scoped context or operating inside one, organized by
/// category.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Context establishment errors
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Transaction control errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Resource state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while establishing a scoped access context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// The scope carries no authenticated user.
    #[error("no user in scope")]
    NoUserInScope,

    /// The scope resolves to no company.
    #[error("no company in scope")]
    NoCompanyInScope,

    /// The user's stored role is not one of the recognized application roles.
    #[error("unknown role: '{role}'")]
    UnknownRole { role: String },

    /// Applying the session configuration inside the transaction failed.
    #[error("context setup failed: {message}")]
    Setup { message: String },
}

/// Errors related to transaction control.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Opening the transaction failed.
    #[error("failed to begin transaction: {message}")]
    BeginFailed { message: String },

    /// Committing the transaction failed.
    #[error("failed to commit transaction: {message}")]
    CommitFailed { message: String },

    /// Rolling back the transaction failed.
    #[error("failed to rollback transaction: {message}")]
    RollbackFailed { message: String },
}

/// Errors related to resource state.
///
/// A project outside the caller's company is reported exactly like a
/// project that does not exist, so identifiers cannot be probed across the
/// tenant boundary.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested project was not found (or is not visible).
    #[error("project not found: {id}")]
    NotFound { id: ProjectId },
}

/// Errors related to input validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The project name is missing or blank.
    #[error("project name is required")]
    NameRequired,

    /// The project name length is outside the allowed range.
    #[error("project name must be between {min} and {max} characters, got {length}")]
    NameLength {
        length: usize,
        min: usize,
        max: usize,
    },

    /// The email address is not plausibly valid.
    #[error("invalid email address: '{email}'")]
    InvalidEmail { email: String },
}

/// Errors originating in the PostgreSQL backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Checking a connection out of the pool failed.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryFailed { message: String },

    /// Schema or policy installation error.
    #[error("schema setup failed: {message}")]
    SchemaSetup { message: String },

    /// The configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
