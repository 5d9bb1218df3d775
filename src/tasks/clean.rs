//! Output directory removal.

use crate::error::{PipelineError, PipelineResult};
use crate::paths::{ProjectPaths, normalize_path_components};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Check that `dir` may be deleted: it must be inside the project root and
/// must not hold the source tree.
pub fn check_deletable(paths: &ProjectPaths, dir: &Path) -> PipelineResult<()> {
    let dir = normalize_path_components(dir);
    let reason = if dir == paths.root() {
        Some("it is the project root")
    } else if !paths.is_inside_root(&dir) {
        Some("it is outside the project root")
    } else if paths.src().starts_with(&dir) {
        Some("it contains the source directory")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PipelineError::UnsafeDelete { path: dir, reason }),
        None => Ok(()),
    }
}

/// Remove a directory tree. A missing directory is not an error.
///
/// Returns whether anything was removed.
pub async fn remove_dir(paths: &ProjectPaths, dir: &Path) -> PipelineResult<bool> {
    check_deletable(paths, dir)?;
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            info!("Deleted {}", dir.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to delete at {}", dir.display());
            Ok(false)
        }
        Err(source) => Err(PipelineError::Delete {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Remove several directories. Every path is checked before anything is
/// deleted.
pub async fn remove_dirs(paths: &ProjectPaths, dirs: &[&Path]) -> PipelineResult<()> {
    for dir in dirs {
        check_deletable(paths, dir)?;
    }
    for dir in dirs {
        remove_dir(paths, dir).await?;
    }
    Ok(())
}
