//! Read-only schedule constraint checks.
//!
//! Each dependency type ties one date of the successor to one date of the
//! predecessor, shifted by `lag` days:
//!
//! | Type | Constraint |
//! |------|------------|
//! | FS   | `successor.start >= predecessor.end + lag`   |
//! | SS   | `successor.start >= predecessor.start + lag` |
//! | FF   | `successor.end >= predecessor.end + lag`     |
//! | SF   | `successor.end >= predecessor.start + lag`   |
//!
//! Nothing here rewrites dates. Edges whose relevant dates are unset are
//! skipped.

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use crate::model::dependency::{Dependency, DependencyType, EdgeId};
use crate::model::item::WorkItem;

/// Which planned date of an item a constraint reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Start,
    End,
}

impl Anchor {
    const fn pick(self, item: &WorkItem) -> Option<NaiveDate> {
        match self {
            Self::Start => item.planned_start,
            Self::End => item.planned_end,
        }
    }
}

/// `(predecessor anchor, successor anchor)` for a dependency type.
#[must_use]
pub const fn anchors(kind: DependencyType) -> (Anchor, Anchor) {
    match kind {
        DependencyType::FinishToStart => (Anchor::End, Anchor::Start),
        DependencyType::StartToStart => (Anchor::Start, Anchor::Start),
        DependencyType::FinishToFinish => (Anchor::End, Anchor::End),
        DependencyType::StartToFinish => (Anchor::Start, Anchor::End),
    }
}

/// Earliest date the successor's anchored date may take.
///
/// Returns `None` if the shifted date falls outside chrono's range.
#[must_use]
pub fn earliest_allowed(predecessor_date: NaiveDate, lag: i32) -> Option<NaiveDate> {
    predecessor_date.checked_add_signed(TimeDelta::days(i64::from(lag)))
}

/// One edge whose planned dates break its constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleViolation {
    pub edge_id: EdgeId,
    pub predecessor_id: String,
    pub successor_id: String,
    pub dependency_type: DependencyType,
    pub lag: i32,
    /// Successor date the constraint applies to.
    pub anchor: Anchor,
    pub required: NaiveDate,
    pub actual: NaiveDate,
    /// How many days the successor date would have to move later.
    pub slip_days: i64,
}

/// Check one edge against its endpoints' planned dates.
#[must_use]
pub fn check_dependency(
    dep: &Dependency,
    predecessor: &WorkItem,
    successor: &WorkItem,
) -> Option<ScheduleViolation> {
    let (from, to) = anchors(dep.dependency_type);
    let required = earliest_allowed(from.pick(predecessor)?, dep.lag)?;
    let actual = to.pick(successor)?;

    (actual < required).then(|| ScheduleViolation {
        edge_id: dep.id,
        predecessor_id: dep.predecessor_id.clone(),
        successor_id: dep.successor_id.clone(),
        dependency_type: dep.dependency_type,
        lag: dep.lag,
        anchor: to,
        required,
        actual,
        slip_days: (required - actual).num_days(),
    })
}
