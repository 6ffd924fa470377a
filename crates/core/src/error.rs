// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the store, allocator, and scheduler

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by control-plane operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("access not permitted")]
    AccessNotPermitted,

    #[error("{kind} not found: {id}")]
    ResourceNotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    ResourceAlreadyExists { kind: &'static str, id: String },

    #[error("{kind} {id} is referenced by {referenced_by}")]
    ForeignKeyViolation {
        kind: &'static str,
        id: String,
        referenced_by: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    /// Lost a race for a row; the operation may be retried.
    #[error("conflicting update to {kind} {id}")]
    Conflict { kind: &'static str, id: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::ResourceNotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Error::ResourceAlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(kind: &'static str, id: impl Into<String>) -> Self {
        Error::Conflict {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether the failure is a transient race that should be retried
    /// internally rather than reported to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AccessNotPermitted => ErrorKind::AccessNotPermitted,
            Error::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Error::ResourceAlreadyExists { .. } => ErrorKind::ResourceAlreadyExists,
            Error::ForeignKeyViolation { .. } => ErrorKind::ForeignKeyViolation,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Wire-friendly discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AccessNotPermitted,
    ResourceNotFound,
    ResourceAlreadyExists,
    ForeignKeyViolation,
    Validation,
    Conflict,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::AccessNotPermitted => "access_not_permitted",
            ErrorKind::ResourceNotFound => "resource_not_found",
            ErrorKind::ResourceAlreadyExists => "resource_already_exists",
            ErrorKind::ForeignKeyViolation => "foreign_key_violation",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
