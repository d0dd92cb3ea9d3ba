//! Error taxonomy for tasklink.
//!
//! [`ErrorCode`] is the stable, machine-readable half (`E####` codes plus a
//! short message and optional remediation hint). [`DependencyError`] is what
//! library operations return; every variant maps onto exactly one code.

use std::fmt;

use thiserror::Error;

use crate::graph::cycles::CyclePath;
use crate::lock::LockError;
use crate::model::dependency::EdgeId;
use crate::model::item::ParseEnumError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ItemNotFound,
    InvalidInput,
    CycleDetected,
    InvalidEnumValue,
    InvalidDependency,
    EdgeNotFound,
    DuplicateDependency,
    CorruptStore,
    LockContention,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::InvalidInput => "E2002",
            Self::CycleDetected => "E2003",
            Self::InvalidEnumValue => "E2005",
            Self::InvalidDependency => "E2006",
            Self::EdgeNotFound => "E2007",
            Self::DuplicateDependency => "E2008",
            Self::CorruptStore => "E3003",
            Self::LockContention => "E5002",
            Self::StorageFailure => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Work item not found",
            Self::InvalidInput => "Invalid input",
            Self::CycleDetected => "Cycle would be created",
            Self::InvalidEnumValue => "Invalid status/dependency type value",
            Self::InvalidDependency => "Invalid dependency",
            Self::EdgeNotFound => "Dependency not found",
            Self::DuplicateDependency => "Dependency already exists",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::LockContention => "Lock contention",
            Self::StorageFailure => "Storage failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tl init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .tasklink/config.toml and retry."),
            Self::ItemNotFound => Some("List live items with `tl item list --project <id>`."),
            Self::EdgeNotFound => Some("List an item's edges with `tl dep list <item>`."),
            Self::InvalidInput => Some("Titles and project ids must be non-empty; end on or after start."),
            Self::CycleDetected => Some("Remove/adjust dependency links to keep the graph acyclic."),
            Self::InvalidEnumValue => Some(
                "Statuses: not-started, in-progress, in-review, done, cancelled. Types: FS, SS, FF, SF.",
            ),
            Self::InvalidDependency => {
                Some("Link two distinct work items that belong to the same project.")
            }
            Self::DuplicateDependency => {
                Some("Update the existing dependency instead of adding it again.")
            }
            Self::CorruptStore => Some("Restore .tasklink/tasklink.db from a backup."),
            Self::LockContention => Some("Retry after the other writer releases the project lock."),
            Self::StorageFailure => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// What a `NotFound` error failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Item(String),
    Edge(EdgeId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(id) => write!(f, "work item '{id}'"),
            Self::Edge(id) => write!(f, "dependency {id}"),
        }
    }
}

/// Errors returned by [`DependencyService`](crate::service::DependencyService).
///
/// Validation variants are deterministic outcomes. They are
/// detected before any write and retrying them cannot change the result.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("invalid dependency: {reason}")]
    InvalidDependency { reason: String },

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error(
        "dependency '{predecessor}' -> '{successor}' already exists as {existing}"
    )]
    DuplicateDependency {
        predecessor: String,
        successor: String,
        existing: EdgeId,
    },

    #[error("{0}")]
    CyclicDependency(CyclePath),

    #[error(transparent)]
    InvalidEnumValue(#[from] ParseEnumError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl DependencyError {
    pub(crate) fn item_not_found(id: impl Into<String>) -> Self {
        Self::NotFound(Missing::Item(id.into()))
    }

    pub(crate) const fn edge_not_found(id: EdgeId) -> Self {
        Self::NotFound(Missing::Edge(id))
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDependency { .. } => ErrorCode::InvalidDependency,
            Self::NotFound(Missing::Item(_)) => ErrorCode::ItemNotFound,
            Self::NotFound(Missing::Edge(_)) => ErrorCode::EdgeNotFound,
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::DuplicateDependency { .. } => ErrorCode::DuplicateDependency,
            Self::CyclicDependency(_) => ErrorCode::CycleDetected,
            Self::InvalidEnumValue(_) => ErrorCode::InvalidEnumValue,
            Self::Lock(err) => err.code(),
            Self::Storage(_) => ErrorCode::StorageFailure,
            Self::Corrupt(_) => ErrorCode::CorruptStore,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Returns `true` for structural validation failures (never worth a retry).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDependency { .. }
                | Self::NotFound(_)
                | Self::InvalidInput { .. }
                | Self::DuplicateDependency { .. }
                | Self::CyclicDependency(_)
                | Self::InvalidEnumValue(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DependencyError>;
