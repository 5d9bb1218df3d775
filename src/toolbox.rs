//! The capabilities a pipeline runs with.

use crate::config::Config;
use crate::deploy::{GitPublisher, Publisher};
use crate::lint::{EslintLinter, Linter};
use crate::paths::ProjectPaths;
use crate::transform::{
    ByExtension, CommandTransform, DATA_FILE_NAME, Identity, ImageOptimizer, TemplateData,
    Transform,
};
use std::sync::Arc;

/// One implementation per capability.
///
/// [`Toolbox::from_config`] wires the configured external tools; tests replace
/// individual fields with in-process implementations.
#[derive(Clone)]
pub struct Toolbox {
    pub style: Arc<dyn Transform>,
    pub script: Arc<dyn Transform>,
    pub page: Arc<dyn Transform>,
    /// Used by both the image and font tasks.
    pub image: Arc<dyn Transform>,
    pub extra: Arc<dyn Transform>,
    /// Applied to aggregated pages and bundles, chosen by extension.
    pub minifier: Arc<dyn Transform>,
    pub linter: Arc<dyn Linter>,
    pub publisher: Arc<dyn Publisher>,
}

impl Toolbox {
    pub fn from_config(config: &Config, paths: &ProjectPaths) -> Self {
        let data = Arc::new(TemplateData::new(
            config.data_json(),
            paths.temp().join(DATA_FILE_NAME),
        ));
        let tools = &config.tools;
        let command = |name: &str, tool: &crate::config::ToolCommand| {
            CommandTransform::new(name, tool.clone()).with_data(Arc::clone(&data))
        };

        let minifier = ByExtension::new()
            .route("js", Arc::new(command("minify-js", &tools.minify_js)))
            .route("css", Arc::new(command("minify-css", &tools.minify_css)))
            .route("html", Arc::new(command("minify-html", &tools.minify_html)));

        Self {
            style: Arc::new(command("style", &tools.style).skip_partials()),
            script: Arc::new(command("script", &tools.script)),
            page: Arc::new(command("page", &tools.page)),
            image: Arc::new(ImageOptimizer::new(Arc::new(command("image", &tools.image)))),
            extra: Arc::new(Identity),
            minifier: Arc::new(minifier),
            linter: Arc::new(EslintLinter::new(tools.lint.clone())),
            publisher: Arc::new(GitPublisher::new(
                paths.root(),
                &config.deploy.remote,
                &config.git_branch,
                &config.deploy.message,
            )),
        }
    }
}
