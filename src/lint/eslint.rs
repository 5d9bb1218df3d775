//! ESLint-backed linter.

use super::{ENVIRONMENTS, FileReport, LintMessage, LintReport, Linter, RULES, Severity};
use crate::config::ToolCommand;
use crate::error::PipelineError;
use crate::fileset::SourceFile;
use crate::transform::{ToolVars, spawn_tool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Selects the eslintrc configuration mode, in which `--env`, `--rule` and
/// `--no-eslintrc` are accepted. ESLint 9 defaults to flat config and rejects
/// them otherwise.
pub const CONFIG_MODE_ENV: (&str, &str) = ("ESLINT_USE_FLAT_CONFIG", "false");

/// Runs ESLint with the fixed rule set and parses its JSON output.
#[derive(Debug, Clone)]
pub struct EslintLinter {
    command: ToolCommand,
}

impl EslintLinter {
    pub fn new(mut command: ToolCommand) -> Self {
        let (key, value) = CONFIG_MODE_ENV;
        command
            .env
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        Self { command }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// Arguments selecting the rule set, environments and JSON output.
    pub fn rule_args() -> Vec<String> {
        let mut args = vec![
            "--no-eslintrc".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--env".to_string(),
            ENVIRONMENTS.join(","),
        ];
        for (rule, severity) in RULES {
            args.push("--rule".to_string());
            args.push(format!("{}: {}", rule, severity.level()));
        }
        args
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFileResult {
    file_path: PathBuf,
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    rule_id: Option<String>,
    severity: u8,
    message: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
}

/// Convert ESLint's `--format json` output into a report.
pub fn parse_report(json: &str) -> Result<LintReport> {
    let results: Vec<EslintFileResult> =
        serde_json::from_str(json).context("unexpected linter output")?;
    let files = results
        .into_iter()
        .map(|result| FileReport {
            path: result.file_path,
            messages: result
                .messages
                .into_iter()
                .map(|m| LintMessage {
                    rule: m.rule_id,
                    // Parse failures are reported with severity 2 and no rule
                    severity: Severity::from_level(m.severity).unwrap_or(Severity::Error),
                    message: m.message,
                    line: m.line,
                    column: m.column,
                })
                .collect(),
        })
        .collect();
    Ok(LintReport { files })
}

#[async_trait]
impl Linter for EslintLinter {
    async fn lint(&self, base: &Path, files: &[SourceFile]) -> Result<LintReport> {
        let mut args = Self::rule_args();
        args.extend(files.iter().map(|f| f.relative.to_string_lossy().into_owned()));

        let output = spawn_tool(&self.command, &args, &ToolVars::default(), base, b"").await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // Exit status 1 only means findings were reported; the JSON decides.
        parse_report(&stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            anyhow::Error::new(PipelineError::ToolFailed {
                program: self.command.program.clone(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() { e.to_string() } else { stderr },
            })
        })
    }
}
