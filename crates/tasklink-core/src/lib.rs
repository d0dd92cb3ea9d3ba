//! tasklink-core library.
//!
//! Work items, typed dependency edges between them, and a
//! [`DependencyService`](service::DependencyService) that keeps the edge set
//! acyclic under concurrent writers.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::Result`]; store plumbing
//!   uses `anyhow::Result` with context.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod lock;
pub mod model;
pub mod service;

pub use error::{DependencyError, ErrorCode};
pub use model::dependency::{Dependency, DependencyPatch, DependencyType, EdgeId, NewDependency};
pub use model::item::{NewWorkItem, Status, WorkItem};
pub use service::{DeleteMode, DependencyService, Scope};
