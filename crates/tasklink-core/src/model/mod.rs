//! Work items and the dependency edges between them.

pub mod dependency;
pub mod item;
