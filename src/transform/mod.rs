//! Transformation capabilities.
//!
//! A [`Transform`] turns one input file into one output file. The pipeline
//! never looks inside the bytes: preprocessing, transpiling, rendering,
//! optimizing and minifying all happen behind this trait, normally in an
//! external tool (see [`CommandTransform`]).

mod command;

pub use command::{
    CommandTransform, DATA_ENV, DATA_FILE_NAME, TemplateData, ToolVars, expand_arg, run_tool,
    spawn_tool,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File extensions the image optimizer understands. Anything else passes
/// through untouched.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

/// A file flowing through a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute path of the original input file.
    pub path: PathBuf,
    /// Destination path relative to the output directory.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

/// One file-to-file transformation capability.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether a matched file should be processed at all.
    fn accepts(&self, _relative: &Path) -> bool {
        true
    }

    async fn apply(&self, asset: Asset) -> anyhow::Result<Asset>;
}

/// Copies files unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[async_trait]
impl Transform for Identity {
    fn name(&self) -> &str {
        "copy"
    }

    async fn apply(&self, asset: Asset) -> anyhow::Result<Asset> {
        Ok(asset)
    }
}

/// Runs the inner optimizer on images only; other files (fonts, for
/// instance) pass through unchanged.
#[derive(Clone)]
pub struct ImageOptimizer {
    inner: Arc<dyn Transform>,
}

impl ImageOptimizer {
    pub fn new(inner: Arc<dyn Transform>) -> Self {
        Self { inner }
    }

    pub fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    }
}

#[async_trait]
impl Transform for ImageOptimizer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn apply(&self, asset: Asset) -> anyhow::Result<Asset> {
        if Self::is_image(&asset.relative) {
            self.inner.apply(asset).await
        } else {
            Ok(asset)
        }
    }
}

/// Dispatches to a transform by file extension; unknown extensions pass
/// through. Used to minify aggregated output (`.js`, `.css`, `.html`).
#[derive(Clone, Default)]
pub struct ByExtension {
    routes: HashMap<String, Arc<dyn Transform>>,
}

impl ByExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, extension: &str, transform: Arc<dyn Transform>) -> Self {
        self.routes.insert(extension.to_ascii_lowercase(), transform);
        self
    }

    fn lookup(&self, path: &Path) -> Option<&Arc<dyn Transform>> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.routes.get(&extension)
    }
}

#[async_trait]
impl Transform for ByExtension {
    fn name(&self) -> &str {
        "minify"
    }

    async fn apply(&self, asset: Asset) -> anyhow::Result<Asset> {
        match self.lookup(&asset.relative) {
            Some(transform) => transform.apply(asset).await,
            None => Ok(asset),
        }
    }
}
