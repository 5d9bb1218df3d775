//! Script linting.
//!
//! The rule set is fixed: blocking calls and empty blocks are errors, naming,
//! quoting and console usage are warnings. Only error-severity findings fail
//! the task.

mod eslint;

pub use eslint::EslintLinter;

use crate::error::PipelineError;
use crate::fileset::{FileSet, SourceFile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pattern selecting script files under the source directory.
pub const SCRIPT_GLOB: &str = "**/*.js";

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    /// Numeric level understood by the linter CLI.
    pub fn level(self) -> u8 {
        match self {
            Severity::Warning => 1,
            Severity::Error => 2,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Severity::Warning),
            2 => Some(Severity::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The fixed rule set.
pub const RULES: &[(&str, Severity)] = &[
    ("no-alert", Severity::Error),
    ("no-empty", Severity::Error),
    ("camelcase", Severity::Warning),
    ("quotes", Severity::Warning),
    ("no-console", Severity::Warning),
];

/// Environments assumed by the rule set: browser globals, modern syntax,
/// node globals and the jQuery namespace.
pub const ENVIRONMENTS: &[&str] = &["browser", "es6", "node", "jquery"];

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintMessage {
    pub rule: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Findings for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub messages: Vec<LintMessage>,
}

/// Findings for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub files: Vec<FileReport>,
}

impl LintReport {
    fn count(&self, severity: Severity) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.messages)
            .filter(|m| m.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Render the report for a terminal: findings grouped per file, then totals.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for file in self.files.iter().filter(|f| !f.messages.is_empty()) {
            let _ = writeln!(out, "{}", file.path.display());
            for m in &file.messages {
                let location = format!("{}:{}", m.line, m.column);
                let _ = writeln!(
                    out,
                    "  {:<8} {:<8} {}  {}",
                    location,
                    m.severity,
                    m.message,
                    m.rule.as_deref().unwrap_or("")
                );
            }
            out.push('\n');
        }

        let errors = self.error_count();
        let warnings = self.warning_count();
        let total = errors + warnings;
        if total > 0 {
            let _ = writeln!(
                out,
                "x {} problem{} ({} error{}, {} warning{})",
                total,
                plural(total),
                errors,
                plural(errors),
                warnings,
                plural(warnings)
            );
        }
        out
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// A linting capability.
#[async_trait]
pub trait Linter: Send + Sync {
    /// Lint `files`, all located under `base`.
    async fn lint(&self, base: &Path, files: &[SourceFile]) -> anyhow::Result<LintReport>;
}

/// Lint every script under `src`, print the report, and fail on errors.
pub async fn lint_sources(linter: &dyn Linter, src: &Path) -> anyhow::Result<LintReport> {
    let files = FileSet::collect(src, SCRIPT_GLOB)?;
    if files.is_empty() {
        info!("No scripts to lint under {}", src.display());
        return Ok(LintReport::default());
    }

    let report = linter.lint(src, files.files()).await?;
    let rendered = report.format();
    if !rendered.is_empty() {
        println!("{}", rendered.trim_end());
    }

    if report.has_errors() {
        return Err(PipelineError::LintFailed {
            errors: report.error_count(),
            warnings: report.warning_count(),
        }
        .into());
    }
    Ok(report)
}
