//! Reference aggregation for compiled pages.
//!
//! Pages mark groups of assets with build blocks:
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/bootstrap/dist/css/bootstrap.css">
//! <!-- endbuild -->
//! ```
//!
//! Every `build:js` / `build:css` block is replaced by a single tag pointing at
//! the target, and the referenced files are concatenated into that target.
//! `build:remove` blocks are dropped. An optional alternate search path may
//! follow the type, e.g. `build:js(vendor,lib) app.js`.

use crate::error::PipelineError;
use crate::fileset::FileSet;
use crate::paths::{normalize_path_components, to_slash};
use crate::tasks::write_asset;
use crate::transform::{Asset, Transform};
use anyhow::{Context, Result};
use regex_lite::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BLOCK_PATTERN: &str =
    r"(?s)<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+([^\s>]+?))?\s*-->(.*?)<!--\s*endbuild\s*-->";
const SCRIPT_REF_PATTERN: &str = r#"(?i)<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#;
const STYLE_REF_PATTERN: &str = r#"(?i)<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#;

/// Kind of build block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Js,
    Css,
    Remove,
}

impl BlockKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "js" => Some(BlockKind::Js),
            "css" => Some(BlockKind::Css),
            "remove" => Some(BlockKind::Remove),
            _ => None,
        }
    }

    fn needs_target(self) -> bool {
        !matches!(self, BlockKind::Remove)
    }
}

/// One parsed build block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Target as written in the page; always present for `js` and `css`.
    pub target: Option<String>,
    /// Alternate search roots given in parentheses, if any.
    pub search_path: Option<Vec<String>>,
    /// Referenced URLs, in document order.
    pub references: Vec<String>,
}

impl Block {
    /// Output path of the bundle, relative to the output directory.
    pub fn target_path(&self) -> Option<PathBuf> {
        self.target
            .as_deref()
            .map(|target| PathBuf::from(reference_path(target)))
    }

    /// Tag replacing the block in the page.
    pub fn tag(&self) -> String {
        let target = self.target.as_deref().unwrap_or_default();
        match self.kind {
            BlockKind::Js => format!(r#"<script src="{}"></script>"#, target),
            BlockKind::Css => format!(r#"<link rel="stylesheet" href="{}">"#, target),
            BlockKind::Remove => String::new(),
        }
    }
}

/// Build-block parser.
#[derive(Debug, Clone)]
pub struct Parser {
    block: Regex,
    script: Regex,
    style: Regex,
}

impl Parser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            block: Regex::new(BLOCK_PATTERN)?,
            script: Regex::new(SCRIPT_REF_PATTERN)?,
            style: Regex::new(STYLE_REF_PATTERN)?,
        })
    }

    /// All recognized blocks of a page, in document order.
    pub fn blocks(&self, html: &str) -> Vec<Block> {
        self.block
            .captures_iter(html)
            .filter_map(|caps| self.block_from(&caps))
            .collect()
    }

    /// Replace every recognized block using `replace`; unknown block types and
    /// bundles without a target are left in place.
    pub fn rewrite(&self, html: &str, mut replace: impl FnMut(&Block) -> String) -> String {
        self.block
            .replace_all(html, |caps: &Captures<'_>| match self.block_from(caps) {
                Some(block) => replace(&block),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn block_from(&self, caps: &Captures<'_>) -> Option<Block> {
        let Some(kind) = BlockKind::parse(&caps[1]) else {
            warn!("Ignoring unknown build block type '{}'", &caps[1]);
            return None;
        };
        let target = caps.get(3).map(|m| m.as_str().to_string());
        if kind.needs_target() && target.is_none() {
            warn!("Ignoring build:{} block without a target", &caps[1]);
            return None;
        }
        let body = &caps[4];
        let references = match kind {
            BlockKind::Js => self.references(&self.script, body),
            BlockKind::Css => self.references(&self.style, body),
            BlockKind::Remove => Vec::new(),
        };
        let search_path = caps.get(2).map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        });
        Some(Block {
            kind,
            target,
            search_path,
            references,
        })
    }

    fn references(&self, pattern: &Regex, body: &str) -> Vec<String> {
        pattern
            .captures_iter(body)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

/// Turn a referenced URL into a root-relative file path: the query string and
/// fragment are stripped, percent-escapes decoded and leading `/` removed.
pub fn reference_path(url: &str) -> String {
    let bare = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(bare)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| bare.to_string());
    decoded.trim_start_matches('/').to_string()
}

/// The aggregation task: rewrites pages from the intermediate directory into
/// the output directory and writes the bundles they reference.
#[derive(Clone)]
pub struct Aggregator {
    /// Project root; search roots are relative to it.
    pub root: PathBuf,
    /// Directory holding the compiled pages.
    pub base: PathBuf,
    pub pattern: String,
    pub dest: PathBuf,
    pub search_roots: Vec<String>,
    /// Minifier applied to pages and bundles.
    pub minifier: Arc<dyn Transform>,
}

impl Aggregator {
    /// Process every page; returns the output-relative paths written.
    pub async fn run(&self) -> Result<Vec<PathBuf>> {
        let parser = Parser::new()?;
        let pages = FileSet::collect(&self.base, &self.pattern)?;
        // bundle target -> references it was built from
        let mut bundled: HashMap<PathBuf, Vec<String>> = HashMap::new();
        let mut written = Vec::new();

        for page in pages.iter() {
            let html = tokio::fs::read_to_string(&page.path)
                .await
                .with_context(|| format!("cannot read {}", page.path.display()))?;

            for block in parser.blocks(&html) {
                let Some(target) = block.target_path() else {
                    continue;
                };
                if let Some(previous) = bundled.get(&target) {
                    if previous == &block.references {
                        debug!("Bundle {} already written", target.display());
                    } else {
                        warn!(
                            page = %to_slash(&page.relative),
                            "Bundle {} already written from different references; keeping the first",
                            target.display()
                        );
                    }
                    continue;
                }
                bundled.insert(target.clone(), block.references.clone());
                let contents = self.concat(&page.relative, &block).await?;
                let bundle = Asset {
                    path: self.dest.join(&target),
                    relative: target,
                    contents,
                };
                written.push(self.emit(bundle).await?);
            }

            let rewritten = parser.rewrite(&html, Block::tag);
            let asset = Asset {
                path: page.path.clone(),
                relative: page.relative.clone(),
                contents: rewritten.into_bytes(),
            };
            written.push(self.emit(asset).await?);
        }

        info!(
            "Aggregated {} page(s) into {} bundle(s)",
            pages.len(),
            bundled.len()
        );
        Ok(written)
    }

    /// Locate a referenced file in the first search root that has it.
    pub fn resolve(&self, reference: &str, search_path: Option<&[String]>) -> Option<PathBuf> {
        let relative = reference_path(reference);
        if relative.is_empty() {
            return None;
        }
        let roots = search_path.unwrap_or(self.search_roots.as_slice());
        roots
            .iter()
            .map(|root| normalize_path_components(&self.root.join(root).join(&relative)))
            .find(|candidate| candidate.is_file())
    }

    async fn concat(&self, page: &Path, block: &Block) -> Result<Vec<u8>> {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(block.references.len());
        for reference in &block.references {
            let file = self
                .resolve(reference, block.search_path.as_deref())
                .ok_or_else(|| PipelineError::MissingReference {
                    page: page.to_path_buf(),
                    reference: reference.clone(),
                })?;
            debug!("{} <- {}", block.target.as_deref().unwrap_or_default(), file.display());
            parts.push(
                tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("cannot read {}", file.display()))?,
            );
        }
        Ok(parts.join(&b'\n'))
    }

    async fn emit(&self, asset: Asset) -> Result<PathBuf> {
        let relative = asset.relative.clone();
        let minified = self
            .minifier
            .apply(asset)
            .await
            .map_err(|e| PipelineError::transform("useref", &relative, format!("{:#}", e)))?;
        write_asset(&self.dest, &minified).await?;
        debug!("Wrote {}", to_slash(&minified.relative));
        Ok(minified.relative)
    }
}
