//! File-set transform tasks.
//!
//! Style, script, page, image, font and extra all share one shape: select
//! files by glob under a base directory, pass each through one transform, and
//! write the result under a destination directory at the same relative path.

pub mod clean;

use crate::dev::ReloadHub;
use crate::error::PipelineError;
use crate::fileset::{FileSet, SourceFile};
use crate::paths::to_slash;
use crate::transform::{Asset, Transform};
use anyhow::Context;
use futures::{StreamExt, TryStreamExt, stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Files transformed concurrently within one task.
pub const FILE_CONCURRENCY: usize = 8;

/// A glob-selected, per-file transformation into a destination directory.
#[derive(Clone)]
pub struct FileTask {
    pub name: String,
    /// Base directory; globs match paths relative to it.
    pub base: PathBuf,
    pub pattern: String,
    pub dest: PathBuf,
    pub transform: Arc<dyn Transform>,
    /// Where to announce written files, for live reload.
    pub reload: Option<ReloadHub>,
}

impl FileTask {
    /// Run the task, returning the destination-relative paths written.
    pub async fn run(&self) -> anyhow::Result<Vec<PathBuf>> {
        let files = FileSet::collect(&self.base, &self.pattern)?;
        let selected: Vec<SourceFile> = files
            .into_iter()
            .filter(|f| self.transform.accepts(&f.relative))
            .collect();
        debug!(
            task = %self.name,
            files = selected.len(),
            "{} matched {} file(s) under {}",
            self.pattern,
            selected.len(),
            self.base.display()
        );

        let mut written: Vec<PathBuf> = stream::iter(selected)
            .map(|file| self.process(file))
            .buffer_unordered(FILE_CONCURRENCY)
            .try_collect()
            .await?;
        written.sort();

        if let Some(ref hub) = self.reload {
            let changed: Vec<String> = written.iter().map(|p| to_slash(p)).collect();
            hub.changed(&changed);
        }
        Ok(written)
    }

    async fn process(&self, file: SourceFile) -> anyhow::Result<PathBuf> {
        let contents = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("cannot read {}", file.path.display()))?;
        let asset = Asset {
            path: file.path,
            relative: file.relative.clone(),
            contents,
        };

        let output = self
            .transform
            .apply(asset)
            .await
            .map_err(|e| PipelineError::transform(&self.name, &file.relative, format!("{:#}", e)))?;

        write_asset(&self.dest, &output).await?;
        Ok(output.relative)
    }
}

/// Write an asset under `dest`, creating parent directories.
pub async fn write_asset(dest: &Path, asset: &Asset) -> anyhow::Result<PathBuf> {
    let target = dest.join(&asset.relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    tokio::fs::write(&target, &asset.contents)
        .await
        .with_context(|| format!("cannot write {}", target.display()))?;
    Ok(target)
}
