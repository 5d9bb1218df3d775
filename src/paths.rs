//! Project path resolution.
//!
//! Every directory named in the configuration (`build.src`, `build.dist`, ...)
//! is relative to the project root. `ProjectPaths` resolves them once so that
//! tasks never consult the process working directory.
//!
//! Resolution is purely lexical (no filesystem I/O): `.` and `..` components
//! are folded, symlinks are not followed.

use crate::config::BuildConfig;
use std::path::{Component, Path, PathBuf};

/// Directory holding installed front-end dependencies, relative to the root.
pub const NODE_MODULES_DIR: &str = "node_modules";

/// Resolved absolute directories of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    src: PathBuf,
    dist: PathBuf,
    temp: PathBuf,
    public: PathBuf,
}

impl ProjectPaths {
    /// Resolve the build directories of `build` against `root`.
    ///
    /// A relative `root` is made absolute against the current directory.
    pub fn resolve(root: &Path, build: &BuildConfig) -> Self {
        let root = absolutize(root);
        Self {
            src: join_normalized(&root, &build.src),
            dist: join_normalized(&root, &build.dist),
            temp: join_normalized(&root, &build.temp),
            public: join_normalized(&root, &build.public),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn dist(&self) -> &Path {
        &self.dist
    }

    pub fn temp(&self) -> &Path {
        &self.temp
    }

    pub fn public(&self) -> &Path {
        &self.public
    }

    /// Resolve an arbitrary root-relative (or absolute) path.
    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        join_normalized(&self.root, path.as_ref())
    }

    /// Whether `path` lies strictly inside the project root.
    pub fn is_inside_root(&self, path: &Path) -> bool {
        let path = normalize_path_components(path);
        path != self.root && path.starts_with(&self.root)
    }
}

/// Make `path` absolute against the current directory and normalize it.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path_components(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        normalize_path_components(&cwd.join(path))
    }
}

fn join_normalized(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    normalize_path_components(&root.join(path))
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => components.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    // `/..` or a leading `..` on a relative path is kept as-is
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(name) => components.push(Component::Normal(name)),
        }
    }

    components.iter().collect()
}

/// Render a relative path with forward slashes, the form used in URLs,
/// glob matching and reload notifications.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(src: &str, dist: &str) -> BuildConfig {
        BuildConfig {
            src: src.into(),
            dist: dist.into(),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let paths = ProjectPaths::resolve(Path::new("/project"), &BuildConfig::default());
        assert_eq!(paths.root(), Path::new("/project"));
        assert_eq!(paths.src(), Path::new("/project/src"));
        assert_eq!(paths.dist(), Path::new("/project/dist"));
        assert_eq!(paths.temp(), Path::new("/project/temp"));
        assert_eq!(paths.public(), Path::new("/project/public"));
    }

    #[test]
    fn test_resolve_folds_dot_components() {
        let paths = ProjectPaths::resolve(Path::new("/project"), &build("./app/../site", "out/."));
        assert_eq!(paths.src(), Path::new("/project/site"));
        assert_eq!(paths.dist(), Path::new("/project/out"));
    }

    #[test]
    fn test_relative_root_is_absolutized() {
        let paths = ProjectPaths::resolve(Path::new("."), &BuildConfig::default());
        assert!(paths.root().is_absolute());
        assert!(paths.src().ends_with("src"));
    }

    #[test]
    fn test_is_inside_root() {
        let paths = ProjectPaths::resolve(Path::new("/project"), &BuildConfig::default());
        assert!(paths.is_inside_root(Path::new("/project/dist")));
        assert!(paths.is_inside_root(Path::new("/project/a/b")));
        assert!(!paths.is_inside_root(Path::new("/project")));
        assert!(!paths.is_inside_root(Path::new("/project/dist/../..")));
        assert!(!paths.is_inside_root(Path::new("/elsewhere/dist")));
    }

    #[test]
    fn test_escape_through_config_is_detected() {
        let paths = ProjectPaths::resolve(Path::new("/project"), &build("src", "../dist"));
        assert_eq!(paths.dist(), Path::new("/dist"));
        assert!(!paths.is_inside_root(paths.dist()));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("assets/styles/main.css")), "assets/styles/main.css");
    }
}
