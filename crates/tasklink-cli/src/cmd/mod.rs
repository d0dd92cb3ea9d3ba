pub mod completions;
pub mod dep;
pub mod init;
pub mod item;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tasklink_core::config::{EffectiveConfig, STATE_DIR};
use tasklink_core::{DependencyService, ErrorCode};

use crate::output::{CliError, OutputMode, render_error};

/// Walk up from `start` to the first directory holding `.tasklink/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(STATE_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Resolved project location and settings, if the invocation is inside one.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: EffectiveConfig,
}

/// Open the store of the enclosing project, or report `E1001`.
///
/// # Errors
///
/// Returns an error if no project was found or the store cannot be opened.
pub fn open_service(project: Option<&Project>, output: OutputMode) -> anyhow::Result<DependencyService> {
    let Some(project) = project else {
        let code = ErrorCode::NotInitialized;
        render_error(
            output,
            &CliError::with_details(
                format!("{} (no {STATE_DIR}/ found)", code.message()),
                code.hint().unwrap_or_default(),
                code.code(),
            ),
        )?;
        anyhow::bail!("not a tasklink project");
    };

    DependencyService::open(&project.root, &project.config).with_context(|| {
        format!(
            "Failed to open store under {}",
            project.root.join(STATE_DIR).display()
        )
    })
}
