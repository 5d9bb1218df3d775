//! Task composition.
//!
//! [`Pipeline`] turns a resolved configuration and a [`Toolbox`] into the
//! named tasks and the exposed operations:
//!
//! | Operation | Composition |
//! |---|---|
//! | `clean`  | `clean` |
//! | `build`  | `clean`, then `parallel(series(compile, useref), extra, image, font)`, then `cleanTmp` |
//! | `dev`    | `compile`, then `serve` |
//! | `lint`   | `lint` |
//! | `deploy` | `build`, then `publish` |
//!
//! where `compile` is `parallel(style, script, page)`.

use crate::config::Config;
use crate::dev::{DevSession, ReloadHub, ServerOptions, WatchTask, WatcherConfig, bindings_for};
use crate::fileset::FileSet;
use crate::lint::lint_sources;
use crate::paths::ProjectPaths;
use crate::task::Task;
use crate::tasks::{FileTask, clean};
use crate::toolbox::Toolbox;
use crate::transform::Transform;
use crate::useref::Aggregator;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Pattern selecting every file of a directory.
const ALL_FILES: &str = "**";

/// Everything a task needs; passed explicitly, never global.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub paths: ProjectPaths,
    pub tools: Arc<Toolbox>,
    pub reload: ReloadHub,
}

impl Context {
    /// Context with the configured external tools.
    pub fn new(config: Config, root: &Path) -> Self {
        let paths = ProjectPaths::resolve(root, &config.build);
        let tools = Toolbox::from_config(&config, &paths);
        Self::with_tools(config, root, tools)
    }

    pub fn with_tools(config: Config, root: &Path, tools: Toolbox) -> Self {
        Self {
            paths: ProjectPaths::resolve(root, &config.build),
            config: Arc::new(config),
            tools: Arc::new(tools),
            reload: ReloadHub::new(),
        }
    }
}

/// Externally exposed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Clean,
    Build,
    Dev,
    Lint,
    Deploy,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Clean,
        Operation::Build,
        Operation::Dev,
        Operation::Lint,
        Operation::Deploy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Clean => "clean",
            Operation::Build => "build",
            Operation::Dev => "dev",
            Operation::Lint => "lint",
            Operation::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

/// Task factory.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Context,
}

impl Pipeline {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The task behind an exposed operation.
    pub fn operation(&self, operation: Operation) -> Task {
        match operation {
            Operation::Clean => self.clean(),
            Operation::Build => self.build(),
            Operation::Dev => self.dev(),
            Operation::Lint => self.lint(),
            Operation::Deploy => self.deploy(),
        }
    }

    /// Remove the output and intermediate directories.
    pub fn clean(&self) -> Task {
        let paths = self.ctx.paths.clone();
        Task::job("clean", move || {
            let paths = paths.clone();
            async move {
                clean::remove_dirs(&paths, &[paths.dist(), paths.temp()]).await?;
                Ok(())
            }
        })
    }

    /// Remove the intermediate directory.
    pub fn clean_tmp(&self) -> Task {
        let paths = self.ctx.paths.clone();
        Task::job("cleanTmp", move || {
            let paths = paths.clone();
            async move {
                clean::remove_dir(&paths, paths.temp()).await?;
                Ok(())
            }
        })
    }

    pub fn style(&self) -> Task {
        let pattern = &self.ctx.config.build.paths.style;
        self.source_task("style", pattern, &self.ctx.tools.style, true)
    }

    pub fn script(&self) -> Task {
        let pattern = &self.ctx.config.build.paths.script;
        self.source_task("script", pattern, &self.ctx.tools.script, true)
    }

    pub fn page(&self) -> Task {
        let pattern = &self.ctx.config.build.paths.page;
        self.source_task("page", pattern, &self.ctx.tools.page, true)
    }

    pub fn image(&self) -> Task {
        let pattern = &self.ctx.config.build.paths.image;
        self.source_task("image", pattern, &self.ctx.tools.image, false)
    }

    pub fn font(&self) -> Task {
        let pattern = &self.ctx.config.build.paths.font;
        self.source_task("font", pattern, &self.ctx.tools.image, false)
    }

    /// Copy the public directory into the output.
    pub fn extra(&self) -> Task {
        file_job(FileTask {
            name: "extra".to_string(),
            base: self.ctx.paths.public().to_path_buf(),
            pattern: ALL_FILES.to_string(),
            dest: self.ctx.paths.dist().to_path_buf(),
            transform: Arc::clone(&self.ctx.tools.extra),
            reload: None,
        })
    }

    pub fn compile(&self) -> Task {
        Task::parallel([self.style(), self.script(), self.page()])
    }

    /// Aggregate the compiled pages' references into the output.
    pub fn useref(&self) -> Task {
        let config = &self.ctx.config;
        let paths = &self.ctx.paths;
        let aggregator = Aggregator {
            root: paths.root().to_path_buf(),
            base: paths.temp().to_path_buf(),
            pattern: config.build.paths.page.clone(),
            dest: paths.dist().to_path_buf(),
            search_roots: config.useref.search_roots(&config.build.temp),
            minifier: Arc::clone(&self.ctx.tools.minifier),
        };
        Task::job("useref", move || {
            let aggregator = aggregator.clone();
            async move {
                aggregator.run().await?;
                Ok(())
            }
        })
    }

    pub fn lint(&self) -> Task {
        let linter = Arc::clone(&self.ctx.tools.linter);
        let src = self.ctx.paths.src().to_path_buf();
        Task::job("lint", move || {
            let linter = Arc::clone(&linter);
            let src = src.clone();
            async move {
                lint_sources(linter.as_ref(), &src).await?;
                Ok(())
            }
        })
    }

    /// Publish the output directory.
    pub fn publish(&self) -> Task {
        let publisher = Arc::clone(&self.ctx.tools.publisher);
        let dist = self.ctx.paths.dist().to_path_buf();
        Task::job("publish", move || {
            let publisher = Arc::clone(&publisher);
            let dist = dist.clone();
            async move {
                let files = FileSet::collect(&dist, ALL_FILES)?;
                info!("Publishing {} file(s) from {}", files.len(), dist.display());
                publisher.publish(&dist, files.files()).await
            }
        })
    }

    /// Run the dev server and watcher until terminated.
    pub fn serve(&self) -> Task {
        let pipeline = self.clone();
        Task::job("serve", move || {
            let pipeline = pipeline.clone();
            async move { pipeline.dev_session()?.run().await }
        })
    }

    pub fn build(&self) -> Task {
        Task::series([
            self.clean(),
            Task::parallel([
                Task::series([self.compile(), self.useref()]),
                self.extra(),
                self.image(),
                self.font(),
            ]),
            self.clean_tmp(),
        ])
    }

    pub fn dev(&self) -> Task {
        Task::series([self.compile(), self.serve()])
    }

    pub fn deploy(&self) -> Task {
        Task::series([self.build(), self.publish()])
    }

    /// Server options, watch bindings and rerunnable tasks for `dev`.
    pub fn dev_session(&self) -> anyhow::Result<DevSession> {
        let config = &self.ctx.config;
        let tasks = HashMap::from([
            (WatchTask::Style, self.style()),
            (WatchTask::Script, self.script()),
            (WatchTask::Page, self.page()),
        ]);
        Ok(DevSession {
            options: ServerOptions::new(config, &self.ctx.paths),
            hub: self.ctx.reload.clone(),
            src: self.ctx.paths.src().to_path_buf(),
            bindings: bindings_for(&config.build)?,
            tasks,
            watcher: WatcherConfig::default(),
        })
    }

    /// A task transforming files selected under the source directory.
    fn source_task(
        &self,
        name: &str,
        pattern: &str,
        transform: &Arc<dyn Transform>,
        to_temp: bool,
    ) -> Task {
        let paths = &self.ctx.paths;
        let (dest, reload) = if to_temp {
            (paths.temp(), Some(self.ctx.reload.clone()))
        } else {
            (paths.dist(), None)
        };
        file_job(FileTask {
            name: name.to_string(),
            base: paths.src().to_path_buf(),
            pattern: pattern.to_string(),
            dest: dest.to_path_buf(),
            transform: Arc::clone(transform),
            reload,
        })
    }
}

fn file_job(file_task: FileTask) -> Task {
    let name = file_task.name.clone();
    Task::job(name, move || {
        let file_task = file_task.clone();
        async move {
            file_task.run().await?;
            Ok(())
        }
    })
}
