//! Named tasks and their composition.
//!
//! A [`Task`] is either a named job (a zero-argument async operation) or a
//! composite:
//! - [`Task::series`] runs children in order and stops at the first failure
//! - [`Task::parallel`] starts every child at once, waits for all of them to
//!   settle, then reports the first failure (in declaration order)
//!
//! Tasks are cheap to clone; jobs are shared behind `Arc`.

use futures::future::{BoxFuture, FutureExt, join_all};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

type JobFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A unit of work, possibly composed of other tasks.
#[derive(Clone)]
pub enum Task {
    Job { name: String, run: JobFn },
    Series(Vec<Task>),
    Parallel(Vec<Task>),
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl Task {
    /// Wrap an async operation as a named task.
    pub fn job<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Task::Job {
            name: name.into(),
            run: Arc::new(move || f().boxed()),
        }
    }

    pub fn series(tasks: impl IntoIterator<Item = Task>) -> Self {
        Task::Series(tasks.into_iter().collect())
    }

    pub fn parallel(tasks: impl IntoIterator<Item = Task>) -> Self {
        Task::Parallel(tasks.into_iter().collect())
    }

    /// The job name, or `<series>` / `<parallel>` for composites.
    pub fn name(&self) -> &str {
        match self {
            Task::Job { name, .. } => name,
            Task::Series(_) => "<series>",
            Task::Parallel(_) => "<parallel>",
        }
    }

    /// One-line rendering of the task tree, e.g.
    /// `series(clean, parallel(style, script), cleanTmp)`.
    pub fn describe(&self) -> String {
        let join = |tasks: &[Task]| {
            tasks
                .iter()
                .map(Task::describe)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Task::Job { name, .. } => name.clone(),
            Task::Series(tasks) => format!("series({})", join(tasks)),
            Task::Parallel(tasks) => format!("parallel({})", join(tasks)),
        }
    }

    /// Run the task to completion.
    pub fn run(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        async move {
            match self {
                Task::Job { name, run } => run_job(name, run).await,
                Task::Series(tasks) => {
                    for task in tasks {
                        task.run().await?;
                    }
                    Ok(())
                }
                Task::Parallel(tasks) => {
                    let results = join_all(tasks.iter().map(Task::run)).await;
                    results.into_iter().collect::<anyhow::Result<Vec<()>>>()?;
                    Ok(())
                }
            }
        }
        .boxed()
    }
}

async fn run_job(name: &str, run: &JobFn) -> anyhow::Result<()> {
    info!("Starting '{}'...", name);
    let start = Instant::now();
    match run().await {
        Ok(()) => {
            info!(
                task = %name,
                duration_ms = start.elapsed().as_millis() as u64,
                "Finished '{}' after {}",
                name,
                format_elapsed(start)
            );
            Ok(())
        }
        Err(e) => {
            error!(
                task = %name,
                error_code = ?crate::error::error_code(&e),
                "'{}' errored after {}: {:#}",
                name,
                format_elapsed(start),
                e
            );
            Err(e.context(format!("task '{}' failed", name)))
        }
    }
}

fn format_elapsed(start: Instant) -> String {
    let elapsed = start.elapsed();
    if elapsed.as_secs() >= 1 {
        format!("{:.2} s", elapsed.as_secs_f64())
    } else {
        format!("{} ms", elapsed.as_millis())
    }
}
