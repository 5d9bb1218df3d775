//! Configuration types and structures.
//!
//! Every field carries a serde default, so a partial record (for example a
//! `build` section that only sets `src`) deserializes with the remaining fields
//! taken from the built-in defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default port for the development server.
pub const DEFAULT_PORT: u16 = 2000;

/// Default branch the deploy task publishes to.
pub const DEFAULT_GIT_BRANCH: &str = "master";

/// Effective pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub build: BuildConfig,

    /// Port of the development server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Branch of the remote repository that `deploy` publishes to.
    #[serde(rename = "gitBranch", default = "default_git_branch")]
    pub git_branch: String,

    /// Context passed to the template renderer.
    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub useref: UserefConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            port: default_port(),
            git_branch: default_git_branch(),
            data: Map::new(),
            tools: ToolsConfig::default(),
            server: ServerConfig::default(),
            deploy: DeployConfig::default(),
            useref: UserefConfig::default(),
        }
    }
}

impl Config {
    /// Template data rendered as JSON text, as handed to external tools.
    pub fn data_json(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_git_branch() -> String {
    DEFAULT_GIT_BRANCH.to_string()
}

/// Directory layout of the project, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Source tree.
    #[serde(default = "default_src")]
    pub src: String,

    /// Final output directory.
    #[serde(default = "default_dist")]
    pub dist: String,

    /// Intermediate directory for compiled, not yet aggregated files.
    #[serde(default = "default_temp")]
    pub temp: String,

    /// Static files copied verbatim into the output.
    #[serde(default = "default_public")]
    pub public: String,

    #[serde(default)]
    pub paths: BuildPaths,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
            temp: default_temp(),
            public: default_public(),
            paths: BuildPaths::default(),
        }
    }
}

fn default_src() -> String {
    "src".to_string()
}

fn default_dist() -> String {
    "dist".to_string()
}

fn default_temp() -> String {
    "temp".to_string()
}

fn default_public() -> String {
    "public".to_string()
}

/// Glob patterns selecting each asset class, relative to `build.src`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPaths {
    #[serde(default = "default_style_glob")]
    pub style: String,

    #[serde(default = "default_script_glob")]
    pub script: String,

    #[serde(default = "default_page_glob")]
    pub page: String,

    #[serde(default = "default_image_glob")]
    pub image: String,

    #[serde(default = "default_font_glob")]
    pub font: String,
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self {
            style: default_style_glob(),
            script: default_script_glob(),
            page: default_page_glob(),
            image: default_image_glob(),
            font: default_font_glob(),
        }
    }
}

fn default_style_glob() -> String {
    "assets/styles/*.scss".to_string()
}

fn default_script_glob() -> String {
    "assets/scripts/*.js".to_string()
}

fn default_page_glob() -> String {
    "*.html".to_string()
}

fn default_image_glob() -> String {
    "assets/images/**".to_string()
}

fn default_font_glob() -> String {
    "assets/fonts/**".to_string()
}

/// An external command-line tool.
///
/// The file contents are written to the tool's stdin and its stdout is taken
/// as the transformed output. Arguments may use the placeholders `{file}`
/// (absolute input path), `{dir}` (directory of the input), `{data}`
/// (template data as JSON) and `{data_file}` (path of a JSON file holding the
/// template data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extension given to output files (e.g. `css` for a style preprocessor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Extra environment variables for the tool process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            extension: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }
}

/// External tools backing each transformation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_style_tool")]
    pub style: ToolCommand,

    #[serde(default = "default_script_tool")]
    pub script: ToolCommand,

    #[serde(default = "default_page_tool")]
    pub page: ToolCommand,

    #[serde(default = "default_image_tool")]
    pub image: ToolCommand,

    #[serde(default = "default_minify_js_tool")]
    pub minify_js: ToolCommand,

    #[serde(default = "default_minify_css_tool")]
    pub minify_css: ToolCommand,

    #[serde(default = "default_minify_html_tool")]
    pub minify_html: ToolCommand,

    /// Linter executable; rule arguments are appended by the lint task.
    #[serde(default = "default_lint_tool")]
    pub lint: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            style: default_style_tool(),
            script: default_script_tool(),
            page: default_page_tool(),
            image: default_image_tool(),
            minify_js: default_minify_js_tool(),
            minify_css: default_minify_css_tool(),
            minify_html: default_minify_html_tool(),
            lint: default_lint_tool(),
        }
    }
}

fn default_style_tool() -> ToolCommand {
    ToolCommand::new("sass", &["--stdin", "--style=expanded", "--load-path={dir}"])
        .with_extension("css")
}

fn default_script_tool() -> ToolCommand {
    ToolCommand::new(
        "npx",
        &["babel", "--presets=@babel/preset-env", "--filename={file}"],
    )
}

fn default_page_tool() -> ToolCommand {
    ToolCommand::new("npx", &["swig", "render", "{file}", "--json", "{data_file}"])
}

fn default_image_tool() -> ToolCommand {
    ToolCommand::new("npx", &["imagemin"])
}

fn default_minify_js_tool() -> ToolCommand {
    ToolCommand::new("npx", &["terser", "--compress", "--mangle"])
}

fn default_minify_css_tool() -> ToolCommand {
    ToolCommand::new("npx", &["cleancss"])
}

fn default_minify_html_tool() -> ToolCommand {
    ToolCommand::new(
        "npx",
        &[
            "html-minifier",
            "--collapse-whitespace",
            "--minify-css",
            "true",
            "--minify-js",
            "true",
        ],
    )
}

fn default_lint_tool() -> ToolCommand {
    ToolCommand::new("npx", &["eslint"])
}

/// Development server options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Show an in-page banner when the browser is updated.
    #[serde(default)]
    pub notify: bool,

    /// URL prefix to root-relative directory rewrites, served ahead of the
    /// regular roots.
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            notify: false,
            routes: default_routes(),
        }
    }
}

fn default_routes() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "/node_modules".to_string(),
        crate::paths::NODE_MODULES_DIR.to_string(),
    )])
}

/// Deploy task options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Git remote of the project whose URL receives the published branch.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Commit message of the published commit.
    #[serde(default = "default_message")]
    pub message: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            message: default_message(),
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_message() -> String {
    "Updates".to_string()
}

/// Reference aggregation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserefConfig {
    /// Root-relative directories searched for referenced files, in order.
    /// Unset means `[<build.temp>, ".", ".."]`.
    #[serde(rename = "searchPath", default, skip_serializing_if = "Option::is_none")]
    pub search_path: Option<Vec<String>>,
}

impl UserefConfig {
    /// Effective search roots for a given intermediate directory name.
    pub fn search_roots(&self, temp: &str) -> Vec<String> {
        match &self.search_path {
            Some(roots) => roots.clone(),
            None => vec![temp.to_string(), ".".to_string(), "..".to_string()],
        }
    }
}
