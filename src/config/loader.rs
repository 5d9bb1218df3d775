//! Configuration loader.
//!
//! Starts from the built-in defaults and overlays the project override file,
//! if one exists and loads cleanly. A missing or broken override is a normal
//! outcome reported through [`OverrideStatus`], never an error.

use super::merge::shallow_merge;
use super::types::Config;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Conventional override file names, tried in order in the project root.
pub const OVERRIDE_FILE_NAMES: [&str; 3] =
    ["pages.config.yaml", "pages.config.yml", "pages.config.json"];

/// Environment variable naming an explicit override file.
pub const CONFIG_PATH_ENV: &str = "PAGES_CONFIG_PATH";

/// What happened to the project override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideStatus {
    /// No override file was found; defaults are in effect.
    Absent,
    /// The override at this path was merged onto the defaults.
    Loaded(PathBuf),
    /// The override exists but could not be used; defaults are in effect.
    Invalid { path: PathBuf, reason: String },
}

impl OverrideStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, OverrideStatus::Loaded(_))
    }
}

/// Where to look for the override file.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project root the conventional names are resolved against.
    pub root: PathBuf,
    /// Explicit override file, bypassing the conventional names.
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover the override location for `root`, honoring `PAGES_CONFIG_PATH`.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self {
            root: root.into(),
            explicit,
        }
    }

    /// Use an explicit override file.
    pub fn with_explicit(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            explicit: Some(path.into()),
        }
    }

    /// Look only for the conventional names under `root`.
    pub fn conventional(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            explicit: None,
        }
    }

    /// The override file to load, if any exists.
    pub fn override_file(&self) -> Option<PathBuf> {
        if let Some(ref explicit) = self.explicit {
            let path = if explicit.is_absolute() {
                explicit.clone()
            } else {
                self.root.join(explicit)
            };
            return Some(path);
        }

        OVERRIDE_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.exists())
    }
}

/// Configuration loader holding the effective configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    paths: ConfigPaths,
    config: Config,
    merged: Value,
    status: OverrideStatus,
}

impl ConfigLoader {
    /// Load the configuration for a project root.
    pub fn load(root: impl Into<PathBuf>) -> Self {
        Self::load_with_paths(ConfigPaths::discover(root))
    }

    /// Load the configuration with explicit lookup paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Self {
        let defaults = Config::default();
        let default_value =
            serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Default::default()));

        let Some(path) = paths.override_file() else {
            debug!("No project override found; using defaults");
            return Self {
                paths,
                config: defaults,
                merged: default_value,
                status: OverrideStatus::Absent,
            };
        };

        match Self::apply_override(default_value.clone(), &path) {
            Ok((config, merged)) => {
                info!("Loaded project override: {}", path.display());
                Self {
                    paths,
                    config,
                    merged,
                    status: OverrideStatus::Loaded(path),
                }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(
                    "Ignoring project override {}: {}. Using defaults.",
                    path.display(),
                    reason
                );
                Self {
                    paths,
                    config: defaults,
                    merged: default_value,
                    status: OverrideStatus::Invalid { path, reason },
                }
            }
        }
    }

    fn apply_override(defaults: Value, path: &Path) -> Result<(Config, Value)> {
        let overlay = read_override(path)?;
        let merged = shallow_merge(defaults, overlay);
        let config: Config =
            serde_json::from_value(merged.clone()).context("override has invalid field values")?;
        Ok((config, merged))
    }

    /// Get the effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// The merged configuration document before typing.
    pub fn merged_value(&self) -> &Value {
        &self.merged
    }

    pub fn status(&self) -> &OverrideStatus {
        &self.status
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Log the effective configuration for diagnostics.
    pub fn log_effective(&self) {
        match serde_yaml::to_string(&self.config) {
            Ok(yaml) => info!("Effective configuration:\n{}", yaml.trim_end()),
            Err(e) => warn!("Could not render effective configuration: {}", e),
        }
    }
}

/// Read an override document. YAML is a superset of JSON, so both parse here.
fn read_override(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_yaml::from_str(&content).context("not valid YAML or JSON")?;
    match value {
        Value::Object(_) => Ok(value),
        // A document holding only comments parses as null
        Value::Null => Ok(Value::Object(Default::default())),
        other => bail!("expected a mapping at the top level, found {}", kind_of(&other)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
