//! In-process stand-ins for the external tools, and project tree helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use pages_pipeline::config::Config;
use pages_pipeline::deploy::Publisher;
use pages_pipeline::fileset::SourceFile;
use pages_pipeline::lint::{FileReport, LintMessage, LintReport, Linter, Severity};
use pages_pipeline::pipeline::{Context, Pipeline};
use pages_pipeline::toolbox::Toolbox;
use pages_pipeline::transform::{Asset, Identity, Transform};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Write `contents` at `relative` under `root`, creating directories.
pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("cannot read {relative}: {e}"))
}

/// Every file under `dir`, relative, with forward slashes, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

/// Prefixes contents with a marker and optionally renames the extension,
/// the way a compiler would.
pub struct Compile {
    pub label: &'static str,
    pub extension: Option<&'static str>,
    pub skip_partials: bool,
}

#[async_trait]
impl Transform for Compile {
    fn name(&self) -> &str {
        self.label
    }

    fn accepts(&self, relative: &Path) -> bool {
        !self.skip_partials
            || !relative
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'))
    }

    async fn apply(&self, mut asset: Asset) -> anyhow::Result<Asset> {
        let mut contents = format!("/* {} */\n", self.label).into_bytes();
        contents.extend_from_slice(&asset.contents);
        asset.contents = contents;
        if let Some(extension) = self.extension {
            asset.relative.set_extension(extension);
        }
        Ok(asset)
    }
}

/// Collapses all whitespace runs into single spaces.
pub struct Collapse;

#[async_trait]
impl Transform for Collapse {
    fn name(&self) -> &str {
        "collapse"
    }

    async fn apply(&self, mut asset: Asset) -> anyhow::Result<Asset> {
        let text = String::from_utf8_lossy(&asset.contents);
        asset.contents = text.split_whitespace().collect::<Vec<_>>().join(" ").into_bytes();
        Ok(asset)
    }
}

/// Always fails.
pub struct Broken;

#[async_trait]
impl Transform for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn apply(&self, _asset: Asset) -> anyhow::Result<Asset> {
        anyhow::bail!("unexpected token")
    }
}

/// Flags `alert(` as an error and single-quoted strings as warnings.
pub struct PatternLinter;

#[async_trait]
impl Linter for PatternLinter {
    async fn lint(&self, _base: &Path, files: &[SourceFile]) -> anyhow::Result<LintReport> {
        let mut reports = Vec::new();
        for file in files {
            let text = std::fs::read_to_string(&file.path)?;
            let mut messages = Vec::new();
            for (index, line) in text.lines().enumerate() {
                let line_no = index as u32 + 1;
                if let Some(column) = line.find("alert(") {
                    messages.push(LintMessage {
                        rule: Some("no-alert".to_string()),
                        severity: Severity::Error,
                        message: "Unexpected alert.".to_string(),
                        line: line_no,
                        column: column as u32 + 1,
                    });
                }
                if let Some(column) = line.find('\'') {
                    messages.push(LintMessage {
                        rule: Some("quotes".to_string()),
                        severity: Severity::Warning,
                        message: "Strings must use doublequote.".to_string(),
                        line: line_no,
                        column: column as u32 + 1,
                    });
                }
            }
            reports.push(FileReport {
                path: file.path.clone(),
                messages,
            });
        }
        Ok(LintReport { files: reports })
    }
}

/// Records what it was asked to publish.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(PathBuf, Vec<PathBuf>)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, dir: &Path, files: &[SourceFile]) -> anyhow::Result<()> {
        let relative = files.iter().map(|f| f.relative.clone()).collect();
        self.published
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), relative));
        Ok(())
    }
}

/// Toolbox of in-process doubles.
pub fn toolbox(config: &Config, root: &Path, publisher: Arc<RecordingPublisher>) -> Toolbox {
    let paths = pages_pipeline::paths::ProjectPaths::resolve(root, &config.build);
    Toolbox {
        style: Arc::new(Compile {
            label: "style",
            extension: Some("css"),
            skip_partials: true,
        }),
        script: Arc::new(Compile {
            label: "script",
            extension: None,
            skip_partials: false,
        }),
        page: Arc::new(Compile {
            label: "page",
            extension: None,
            skip_partials: false,
        }),
        image: Arc::new(Identity),
        minifier: Arc::new(Collapse),
        linter: Arc::new(PatternLinter),
        publisher,
        ..Toolbox::from_config(config, &paths)
    }
}

/// Pipeline over `root` with default configuration and in-process tools.
pub fn pipeline(root: &Path) -> (Pipeline, Arc<RecordingPublisher>) {
    pipeline_with(root, Config::default())
}

pub fn pipeline_with(root: &Path, config: Config) -> (Pipeline, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let tools = toolbox(&config, root, Arc::clone(&publisher));
    (
        Pipeline::new(Context::with_tools(config, root, tools)),
        publisher,
    )
}
