//! Per-project exclusive advisory locks.
//!
//! Every mutation of a project's dependency edges runs its read-check-write
//! sequence while holding that project's lock, so two concurrent inserts
//! cannot each validate against a stale edge set. Locks are plain files under
//! `.tasklink/locks/` locked with `flock`-style advisory locks via `fs2`.
//! Multiple projects are always locked in sorted order.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    collections::BTreeSet,
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Polling interval while waiting for a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Advisory lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "{code}: lock timed out after {waited:?} at {location}",
        code = ErrorCode::LockContention,
        location = .path.display()
    )]
    Timeout { path: PathBuf, waited: Duration },

    #[error("{code}: {0}", code = ErrorCode::StorageFailure)]
    Io(#[from] io::Error),
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire(path: &Path, deadline: Instant, started: Instant) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        loop {
            if file.try_lock_exclusive().is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: started.elapsed(),
                });
            }

            thread::sleep(RETRY_INTERVAL);
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Lock file path for one project inside `lock_dir`.
///
/// Project ids are hashed so arbitrary ids map to safe, fixed-length names.
#[must_use]
pub fn project_lock_path(lock_dir: &Path, project_id: &str) -> PathBuf {
    let digest = blake3::hash(project_id.as_bytes()).to_hex();
    lock_dir.join(format!("project-{}.lock", &digest[..16]))
}

/// RAII guard holding exclusive locks on one or more projects.
///
/// Released on drop, after the surrounding transaction has committed or
/// rolled back.
#[derive(Debug)]
pub struct ProjectLock {
    guards: Vec<FileGuard>,
    projects: Vec<String>,
}

impl ProjectLock {
    /// Acquire exclusive locks for every project in `project_ids`.
    ///
    /// Duplicates are collapsed and locks are taken in sorted order. The
    /// `timeout` bounds the total wait across all projects.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when another holder keeps a lock past
    /// the deadline, or [`LockError::Io`] if a lock file cannot be opened.
    pub fn acquire<'a>(
        lock_dir: &Path,
        project_ids: impl IntoIterator<Item = &'a str>,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let projects: BTreeSet<&str> = project_ids.into_iter().collect();
        let started = Instant::now();
        let deadline = started + timeout;

        let mut guards = Vec::with_capacity(projects.len());
        for project in &projects {
            let path = project_lock_path(lock_dir, project);
            // Earlier guards drop (and unlock) if a later one times out.
            guards.push(FileGuard::acquire(&path, deadline, started)?);
        }

        tracing::trace!(projects = ?projects, waited = ?started.elapsed(), "project lock acquired");

        Ok(Self {
            guards,
            projects: projects.into_iter().map(str::to_string).collect(),
        })
    }

    /// Projects covered by this lock, sorted.
    #[must_use]
    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Lock file paths held, in acquisition order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.guards.iter().map(|guard| guard.path.as_path())
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        drop(self);
    }
}
