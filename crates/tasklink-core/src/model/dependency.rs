//! Dependency edges between work items.
//!
//! An edge is stored as `(successor, predecessor)`: the successor depends on
//! the predecessor. In graph terms the edge points `predecessor -> successor`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::item::{ParseEnumError, normalize};

/// Row identifier of a persisted dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub i64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for EdgeId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ParseEnumError {
                expected: "dependency id",
                got: s.to_string(),
            })
    }
}

/// How the successor's dates relate to the predecessor's.
///
/// The type only matters for schedule arithmetic; cycle detection ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub const ALL: [Self; 4] = [
        Self::FinishToStart,
        Self::StartToStart,
        Self::FinishToFinish,
        Self::StartToFinish,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FinishToStart => "finish_to_start",
            Self::StartToStart => "start_to_start",
            Self::FinishToFinish => "finish_to_finish",
            Self::StartToFinish => "start_to_finish",
        }
    }

    /// Two-letter scheduling abbreviation (`FS`, `SS`, `FF`, `SF`).
    #[must_use]
    pub const fn short(self) -> &'static str {
        match self {
            Self::FinishToStart => "FS",
            Self::StartToStart => "SS",
            Self::FinishToFinish => "FF",
            Self::StartToFinish => "SF",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "fs" | "finish_to_start" => Ok(Self::FinishToStart),
            "ss" | "start_to_start" => Ok(Self::StartToStart),
            "ff" | "finish_to_finish" => Ok(Self::FinishToFinish),
            "sf" | "start_to_finish" => Ok(Self::StartToFinish),
            _ => Err(ParseEnumError {
                expected: "dependency type",
                got: s.to_string(),
            }),
        }
    }
}

/// A persisted dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: EdgeId,
    pub successor_id: String,
    pub predecessor_id: String,
    pub dependency_type: DependencyType,
    /// Offset in days. Positive delays the successor, negative overlaps it.
    pub lag: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for [`add_dependency`](crate::service::DependencyService::add_dependency).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDependency {
    pub successor_id: String,
    pub predecessor_id: String,
    pub dependency_type: DependencyType,
    pub lag: i32,
}

impl NewDependency {
    /// `successor` depends on `predecessor`, finish-to-start, no lag.
    #[must_use]
    pub fn new(successor: impl Into<String>, predecessor: impl Into<String>) -> Self {
        Self {
            successor_id: successor.into(),
            predecessor_id: predecessor.into(),
            dependency_type: DependencyType::default(),
            lag: 0,
        }
    }

    #[must_use]
    pub const fn with_type(mut self, dependency_type: DependencyType) -> Self {
        self.dependency_type = dependency_type;
        self
    }

    #[must_use]
    pub const fn with_lag(mut self, lag: i32) -> Self {
        self.lag = lag;
        self
    }
}

/// In-place edit of an edge's type and/or lag. Topology never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DependencyPatch {
    pub dependency_type: Option<DependencyType>,
    pub lag: Option<i32>,
}

impl DependencyPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.dependency_type.is_none() && self.lag.is_none()
    }
}
