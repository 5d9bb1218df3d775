//! Development mode: static server with live reload, driven by a source watcher.

mod reload;
mod server;
mod watcher;

pub use reload::{
    CLIENT_SCRIPT_PATH, LIVERELOAD_PATH, ReloadEvent, ReloadHub, client_script, client_snippet,
    inject_snippet,
};
pub use server::{ServerOptions, build_router, start_server};
pub use watcher::{
    SourceWatcher, WatchAction, WatchBinding, WatchTask, WatcherConfig, bindings_for, classify,
    plan, watch_sources,
};

use crate::error::PipelineError;
use crate::task::Task;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Server, watcher and the tasks the watcher may rerun.
pub struct DevSession {
    pub options: ServerOptions,
    pub hub: ReloadHub,
    pub src: PathBuf,
    pub bindings: Vec<WatchBinding>,
    pub tasks: HashMap<WatchTask, Task>,
    pub watcher: WatcherConfig,
}

impl DevSession {
    /// Serve until the process is terminated.
    ///
    /// Task failures triggered by the watcher are logged and serving goes on.
    pub async fn run(self) -> anyhow::Result<()> {
        let (_shutdown, addr) = start_server(&self.options, self.hub.clone()).await?;
        info!("Serving at http://localhost:{}", addr.port());

        // Events carry resolved paths; match them against the resolved root
        let src = self.src.canonicalize().unwrap_or_else(|_| self.src.clone());
        let mut watcher = watch_sources(&src, self.watcher.clone()).map_err(PipelineError::from)?;

        while let Some(changed) = watcher.changes.recv().await {
            for action in plan(&self.bindings, &src, &changed) {
                self.dispatch(action);
            }
        }

        warn!("Source watcher stopped; still serving");
        std::future::pending::<()>().await;
        Ok(())
    }

    fn dispatch(&self, action: WatchAction) {
        match action {
            WatchAction::Reload => self.hub.reload(),
            WatchAction::Run(kind) => {
                let Some(task) = self.tasks.get(&kind).cloned() else {
                    warn!("No task bound for '{}'", kind.name());
                    return;
                };
                tokio::spawn(async move {
                    // Already logged by the task itself
                    let _ = task.run().await;
                });
            }
        }
    }
}
