//! Configuration resolution.
//!
//! The effective configuration is computed once at startup:
//! 1. **Defaults** - Built into the binary (see [`Config::default`])
//! 2. **Project** - `pages.config.yaml` (or `.yml` / `.json`) in the project root
//!
//! ## Merge Strategy
//! Shallow: each top-level key of the project file replaces the default value
//! for that key. Fields omitted inside a replaced record fall back to their
//! own defaults.
//!
//! ## Environment Variables
//! - `PAGES_CONFIG_PATH` - Explicit override file (instead of the conventional names)

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_PATH_ENV, ConfigLoader, ConfigPaths, OVERRIDE_FILE_NAMES, OverrideStatus};
pub use merge::shallow_merge;
pub use types::*;
