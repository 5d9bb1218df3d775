//! `pages`: static-site build pipeline.

use anyhow::{Context as _, Result};
use clap::Parser;
use pages_pipeline::cli::{Cli, Command};
use pages_pipeline::config::{ConfigLoader, ConfigPaths, OverrideStatus};
use pages_pipeline::logging::{self, LogTarget};
use pages_pipeline::pipeline::{Context, Pipeline};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let paths = match &cli.config {
        Some(path) => ConfigPaths::with_explicit(&cli.dir, path),
        None => ConfigPaths::discover(&cli.dir),
    };
    let loader = ConfigLoader::load_with_paths(paths);
    if let OverrideStatus::Loaded(path) = loader.status() {
        debug!("Override file: {}", path.display());
    }

    let Some(operation) = cli.command.operation() else {
        // `config`: print and exit
        let yaml = serde_yaml::to_string(loader.config())
            .context("cannot render the effective configuration")?;
        print!("{}", yaml);
        return Ok(());
    };
    loader.log_effective();

    let mut config = loader.into_config();
    if let Command::Dev { port: Some(port) } = cli.command {
        config.port = port;
    }

    let pipeline = Pipeline::new(Context::new(config, &cli.dir));
    let task = pipeline.operation(operation);
    debug!("{} = {}", operation, task.describe());

    task.run()
        .await
        .with_context(|| format!("'{}' failed", operation))?;
    info!("'{}' completed", operation);
    Ok(())
}
