//! External command-line tools.
//!
//! Tools read the input on stdin and write the result to stdout. Arguments may
//! reference the input through `{file}` and `{dir}`, and the template data
//! through `{data}` (inline JSON) or `{data_file}` (a JSON file written on
//! first use); the data is also exported as `PAGES_DATA`.

use super::{Asset, Transform};
use crate::config::ToolCommand;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

/// Environment variable carrying the template data to every tool.
pub const DATA_ENV: &str = "PAGES_DATA";

/// Placeholder for the path of the template data file.
pub const DATA_FILE_PLACEHOLDER: &str = "{data_file}";

/// Name of the template data file inside the intermediate directory.
pub const DATA_FILE_NAME: &str = ".pages-data.json";

/// Values substituted into tool arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolVars<'a> {
    pub file: Option<&'a Path>,
    pub data: Option<&'a str>,
    pub data_file: Option<&'a Path>,
}

/// Expand `{file}`, `{dir}`, `{data}` and `{data_file}` in one argument.
pub fn expand_arg(arg: &str, vars: &ToolVars<'_>) -> String {
    let mut out = arg.to_string();
    if let Some(file) = vars.file {
        out = out.replace("{file}", &file.to_string_lossy());
        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        out = out.replace("{dir}", &dir.to_string_lossy());
    }
    if let Some(data) = vars.data {
        out = out.replace("{data}", data);
    }
    if let Some(data_file) = vars.data_file {
        out = out.replace(DATA_FILE_PLACEHOLDER, &data_file.to_string_lossy());
    }
    out
}

/// Template data shared by the tools of one run.
#[derive(Debug)]
pub struct TemplateData {
    json: String,
    file: PathBuf,
    written: OnceCell<()>,
}

impl TemplateData {
    pub fn new(json: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            json: json.into(),
            file: file.into(),
            written: OnceCell::new(),
        }
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    /// Path of the data file, written the first time it is asked for.
    pub async fn file(&self) -> PipelineResult<&Path> {
        self.written
            .get_or_try_init(|| async {
                if let Some(parent) = self.file.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&self.file, self.json.as_bytes()).await?;
                debug!(path = %self.file.display(), "Wrote template data");
                Ok::<(), PipelineError>(())
            })
            .await?;
        Ok(&self.file)
    }
}

/// Run a tool with `input` on stdin and return its stdout.
pub async fn run_tool(
    command: &ToolCommand,
    extra_args: &[String],
    vars: &ToolVars<'_>,
    cwd: &Path,
    input: &[u8],
) -> PipelineResult<Vec<u8>> {
    let output = spawn_tool(command, extra_args, vars, cwd, input).await?;
    if !output.status.success() {
        return Err(PipelineError::ToolFailed {
            program: command.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Run a tool and return its raw output regardless of exit status.
pub async fn spawn_tool(
    command: &ToolCommand,
    extra_args: &[String],
    vars: &ToolVars<'_>,
    cwd: &Path,
    input: &[u8],
) -> PipelineResult<std::process::Output> {
    let args: Vec<String> = command
        .args
        .iter()
        .map(|a| expand_arg(a, vars))
        .chain(extra_args.iter().cloned())
        .collect();
    debug!(program = %command.program, ?args, "Running tool");

    let mut cmd = Command::new(&command.program);
    cmd.args(&args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd.envs(&command.env);
    if let Some(data) = vars.data {
        cmd.env(DATA_ENV, data);
    }

    let mut child = cmd.spawn().map_err(|source| PipelineError::ToolSpawn {
        program: command.program.clone(),
        source,
    })?;

    // Feed stdin concurrently with reading stdout so large outputs cannot
    // fill the pipe and stall the child.
    let stdin = child.stdin.take();
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            // A tool that ignores stdin may close it early
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        }
    });

    let output = child.wait_with_output().await?;
    let _ = writer.await;
    Ok(output)
}

/// A [`Transform`] backed by an external tool.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    name: String,
    command: ToolCommand,
    data: Option<Arc<TemplateData>>,
    skip_partials: bool,
}

impl CommandTransform {
    pub fn new(name: &str, command: ToolCommand) -> Self {
        Self {
            name: name.to_string(),
            command,
            data: None,
            skip_partials: false,
        }
    }

    /// Make the template data available as `{data}`, `{data_file}` and
    /// `PAGES_DATA`.
    pub fn with_data(mut self, data: Arc<TemplateData>) -> Self {
        self.data = Some(data);
        self
    }

    /// Skip files whose name starts with `_` (style partials).
    pub fn skip_partials(mut self) -> Self {
        self.skip_partials = true;
        self
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    fn uses_data_file(&self) -> bool {
        self.command
            .args
            .iter()
            .any(|arg| arg.contains(DATA_FILE_PLACEHOLDER))
    }
}

#[async_trait]
impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, relative: &Path) -> bool {
        if !self.skip_partials {
            return true;
        }
        relative
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| !n.starts_with('_'))
    }

    async fn apply(&self, asset: Asset) -> anyhow::Result<Asset> {
        let data_file = match &self.data {
            Some(data) if self.uses_data_file() => Some(data.file().await?),
            _ => None,
        };
        let vars = ToolVars {
            file: Some(&asset.path),
            data: self.data.as_deref().map(TemplateData::json),
            data_file,
        };
        let cwd = asset.path.parent().unwrap_or_else(|| Path::new("."));
        let contents = run_tool(&self.command, &[], &vars, cwd, &asset.contents).await?;

        let mut relative = asset.relative;
        if let Some(ref extension) = self.command.extension {
            relative.set_extension(extension);
        }
        Ok(Asset {
            path: asset.path,
            relative,
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_expand_arg() {
        let vars = ToolVars {
            file: Some(Path::new("/site/src/assets/main.scss")),
            data: Some(r#"{"a":1}"#),
            data_file: Some(Path::new("/site/temp/.pages-data.json")),
        };
        assert_eq!(expand_arg("--filename={file}", &vars), "--filename=/site/src/assets/main.scss");
        assert_eq!(expand_arg("--load-path={dir}", &vars), "--load-path=/site/src/assets");
        assert_eq!(expand_arg("{data}", &vars), r#"{"a":1}"#);
        assert_eq!(expand_arg("{data_file}", &vars), "/site/temp/.pages-data.json");
        assert_eq!(expand_arg("--plain", &vars), "--plain");
    }

    #[test]
    fn test_expand_without_vars_leaves_placeholders() {
        assert_eq!(expand_arg("{file}", &ToolVars::default()), "{file}");
    }

    #[test]
    fn test_partials_skipped() {
        let transform = CommandTransform::new("style", ToolCommand::new("sass", &[])).skip_partials();
        assert!(transform.accepts(Path::new("assets/styles/main.scss")));
        assert!(!transform.accepts(Path::new("assets/styles/_vars.scss")));

        let plain = CommandTransform::new("script", ToolCommand::new("babel", &[]));
        assert!(plain.accepts(Path::new("assets/scripts/_x.js")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_pipes_stdin_to_stdout() {
        let command = ToolCommand::new("cat", &[]);
        let out = run_tool(&command, &[], &ToolVars::default(), Path::new("."), b"hello")
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_reports_failure() {
        let command = ToolCommand::new("sh", &["-c", "echo broken >&2; exit 3"]);
        let err = run_tool(&command, &[], &ToolVars::default(), Path::new("."), b"")
            .await
            .unwrap_err();
        match err {
            PipelineError::ToolFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let command = ToolCommand::new("definitely-not-a-real-tool-4821", &[]);
        let err = run_tool(&command, &[], &ToolVars::default(), Path::new("."), b"")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_transform_renames_extension() {
        let transform =
            CommandTransform::new("style", ToolCommand::new("cat", &[]).with_extension("css"));
        let asset = Asset {
            path: PathBuf::from("/tmp/main.scss"),
            relative: PathBuf::from("assets/styles/main.scss"),
            contents: b"a { b: c }".to_vec(),
        };
        // cwd is the input's parent; /tmp exists on unix hosts
        let out = transform.apply(asset).await.unwrap();
        assert_eq!(out.relative, PathBuf::from("assets/styles/main.css"));
        assert_eq!(out.contents, b"a { b: c }");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_data_file_holds_template_data() {
        let temp = tempfile::TempDir::new().unwrap();
        let data_path = temp.path().join("temp").join(DATA_FILE_NAME);
        let data = Arc::new(TemplateData::new(r#"{"site":"docs"}"#, &data_path));
        // the tool prints the file named by the placeholder
        let transform = CommandTransform::new("page", ToolCommand::new("cat", &["{data_file}"]))
            .with_data(Arc::clone(&data));
        let asset = Asset {
            path: temp.path().join("index.html"),
            relative: PathBuf::from("index.html"),
            contents: Vec::new(),
        };

        let out = transform.apply(asset).await.unwrap();
        assert_eq!(out.contents, br#"{"site":"docs"}"#);
        assert_eq!(std::fs::read_to_string(&data_path).unwrap(), r#"{"site":"docs"}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_data_file_not_written_unless_referenced() {
        let temp = tempfile::TempDir::new().unwrap();
        let data_path = temp.path().join(DATA_FILE_NAME);
        let data = Arc::new(TemplateData::new("{}", &data_path));
        let transform =
            CommandTransform::new("script", ToolCommand::new("cat", &[])).with_data(data);
        let asset = Asset {
            path: temp.path().join("main.js"),
            relative: PathBuf::from("main.js"),
            contents: b"x".to_vec(),
        };

        transform.apply(asset).await.unwrap();
        assert!(!data_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_environment() {
        let mut command = ToolCommand::new("sh", &["-c", "printf %s \"$GREETING\""]);
        command.env.insert("GREETING".to_string(), "hi".to_string());
        let out = run_tool(&command, &[], &ToolVars::default(), Path::new("."), b"")
            .await
            .unwrap();
        assert_eq!(out, b"hi");
    }
}
