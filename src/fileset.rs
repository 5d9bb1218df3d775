//! Glob-selected file sets.
//!
//! A [`FileSet`] is the ordered list of files under a working directory whose
//! working-directory-relative path matches one or more glob patterns. The
//! working directory doubles as the base: the relative path of each file is
//! what destination paths are built from.
//!
//! Matching rules follow the usual shell conventions:
//! - `*` and `?` never cross a `/`
//! - `**` as a whole component matches any number of directories
//! - names starting with `.` are only matched by a literal leading dot

use crate::error::{PipelineError, PipelineResult};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A compiled glob pattern matched against base-relative paths.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    pattern: Pattern,
}

impl Glob {
    pub fn new(pattern: &str) -> PipelineResult<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| PipelineError::pattern(pattern, e))?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a path relative to the pattern's base directory.
    pub fn matches(&self, relative: &Path) -> bool {
        self.pattern.matches_path_with(relative, MATCH_OPTIONS)
    }
}

/// A matched source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the file set's base directory.
    pub relative: PathBuf,
}

/// Ordered set of files selected by glob patterns.
#[derive(Debug, Clone)]
pub struct FileSet {
    base: PathBuf,
    files: Vec<SourceFile>,
}

impl FileSet {
    /// Select files under `base` matching `pattern`.
    pub fn collect(base: &Path, pattern: &str) -> PipelineResult<Self> {
        Self::collect_any(base, &[pattern])
    }

    /// Select files under `base` matching any of `patterns`.
    ///
    /// A missing base directory yields an empty set.
    pub fn collect_any(base: &Path, patterns: &[&str]) -> PipelineResult<Self> {
        let globs = patterns
            .iter()
            .map(|p| Glob::new(p))
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut files = Vec::new();
        if base.is_dir() {
            for entry in WalkDir::new(base).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|e| match e.into_io_error() {
                    Some(io) => PipelineError::Io(io),
                    None => PipelineError::Io(std::io::Error::other("filesystem loop detected")),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(base) else {
                    continue;
                };
                if globs.iter().any(|g| g.matches(relative)) {
                    files.push(SourceFile {
                        path: entry.path().to_path_buf(),
                        relative: relative.to_path_buf(),
                    });
                }
            }
        }

        Ok(Self {
            base: base.to_path_buf(),
            files,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }
}

impl IntoIterator for FileSet {
    type Item = SourceFile;
    type IntoIter = std::vec::IntoIter<SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
