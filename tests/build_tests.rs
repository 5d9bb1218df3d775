//! Integration tests for the build and clean operations.

mod common;

use common::{Broken, list_files, pipeline, read, write};
use pages_pipeline::config::Config;
use pages_pipeline::error::{ErrorCode, error_code};
use pages_pipeline::pipeline::{Context, Operation, Pipeline};
use std::sync::Arc;
use tempfile::TempDir;

const INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
  <!-- build:css assets/styles/main.css -->
  <link rel="stylesheet" href="assets/styles/main.css">
  <!-- endbuild -->
</head>
<body>
  <h1>Home</h1>
  <!-- build:js assets/scripts/main.js -->
  <script src="assets/scripts/main.js"></script>
  <!-- endbuild -->
</body>
</html>
"#;

fn site(root: &std::path::Path) {
    write(root, "src/index.html", INDEX);
    write(root, "src/assets/styles/main.scss", "body {\n  color: red;\n}\n");
    write(root, "src/assets/styles/_variables.scss", "$red: red;\n");
    write(root, "src/assets/scripts/main.js", "const answer = 42;\n\nconsole.log(answer);\n");
    write(root, "src/assets/images/logo.png", "PNG");
    write(root, "src/assets/fonts/icons.woff", "WOFF");
    write(root, "public/favicon.ico", "ICO");
}

#[tokio::test]
async fn test_build_empty_tree_copies_public_only() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "public/robots.txt", "User-agent: *");
    write(temp.path(), "public/static/logo.svg", "<svg/>");

    // Nothing to compile, so the configured external tools are never spawned
    let pipeline = Pipeline::new(Context::new(Config::default(), temp.path()));
    pipeline.operation(Operation::Build).run().await.unwrap();

    assert_eq!(
        list_files(&temp.path().join("dist")),
        vec!["robots.txt", "static/logo.svg"]
    );
    assert!(!temp.path().join("temp").exists());
}

#[tokio::test]
async fn test_build_style_and_script() {
    let temp = TempDir::new().unwrap();
    site(temp.path());

    let (pipeline, _) = pipeline(temp.path());
    pipeline.build().run().await.unwrap();

    let dist = temp.path().join("dist");
    assert_eq!(
        list_files(&dist),
        vec![
            "assets/fonts/icons.woff",
            "assets/images/logo.png",
            "assets/scripts/main.js",
            "assets/styles/main.css",
            "favicon.ico",
            "index.html",
        ]
    );

    // compiled, then minified
    assert_eq!(
        read(&dist, "assets/styles/main.css"),
        "/* style */ body { color: red; }"
    );
    assert_eq!(
        read(&dist, "assets/scripts/main.js"),
        "/* script */ const answer = 42; console.log(answer);"
    );
    let page = read(&dist, "index.html");
    assert!(!page.contains('\n'));
    assert!(page.contains(r#"<link rel="stylesheet" href="assets/styles/main.css">"#));
    assert!(!page.contains("build:"));

    assert_eq!(read(&dist, "favicon.ico"), "ICO");
    assert!(!temp.path().join("temp").exists());
}

#[tokio::test]
async fn test_build_replaces_previous_output() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dist/stale.html", "old");
    write(temp.path(), "temp/leftover.css", "old");
    write(temp.path(), "public/a.txt", "a");

    let (pipeline, _) = pipeline(temp.path());
    pipeline.build().run().await.unwrap();

    assert_eq!(list_files(&temp.path().join("dist")), vec!["a.txt"]);
    assert!(!temp.path().join("temp").exists());
}

#[tokio::test]
async fn test_build_fails_on_transform_error() {
    let temp = TempDir::new().unwrap();
    site(temp.path());

    let config = Config::default();
    let publisher = Arc::new(common::RecordingPublisher::default());
    let mut tools = common::toolbox(&config, temp.path(), publisher);
    tools.script = Arc::new(Broken);
    let pipeline = Pipeline::new(Context::with_tools(config, temp.path(), tools));

    let err = pipeline.build().run().await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("main.js"), "{message}");
    assert!(message.contains("unexpected token"), "{message}");
    assert_eq!(error_code(&err), Some(ErrorCode::TransformFailed));

    // the failing build never reached cleanTmp
    assert!(temp.path().join("temp").exists());
}

#[tokio::test]
async fn test_build_fails_on_missing_reference() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/index.html",
        r#"<!-- build:js vendor.js --><script src="/node_modules/missing/lib.js"></script><!-- endbuild -->"#,
    );

    let (pipeline, _) = pipeline(temp.path());
    let err = pipeline.build().run().await.unwrap_err();
    assert_eq!(error_code(&err), Some(ErrorCode::MissingReference));
}

#[tokio::test]
async fn test_node_modules_references_bundled() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/index.html",
        r#"<!-- build:css assets/styles/vendor.css -->
<link rel="stylesheet" href="/node_modules/lib/a.css">
<link rel="stylesheet" href="/node_modules/lib/b.css">
<!-- endbuild -->"#,
    );
    write(temp.path(), "node_modules/lib/a.css", ".a {}");
    write(temp.path(), "node_modules/lib/b.css", ".b {}");

    let (pipeline, _) = pipeline(temp.path());
    pipeline.build().run().await.unwrap();

    assert_eq!(
        read(&temp.path().join("dist"), "assets/styles/vendor.css"),
        ".a {} .b {}"
    );
}

#[tokio::test]
async fn test_clean_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dist/index.html", "x");
    write(temp.path(), "temp/index.html", "x");

    let (pipeline, _) = pipeline(temp.path());
    pipeline.clean().run().await.unwrap();
    assert!(!temp.path().join("dist").exists());
    assert!(!temp.path().join("temp").exists());

    pipeline.clean().run().await.unwrap();
}

#[tokio::test]
async fn test_clean_refuses_project_root() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/index.html", "x");

    let mut config = Config::default();
    config.build.dist = ".".to_string();
    let (pipeline, _) = common::pipeline_with(temp.path(), config);

    let err = pipeline.clean().run().await.unwrap_err();
    assert_eq!(error_code(&err), Some(ErrorCode::UnsafeDelete));
    assert!(temp.path().join("src/index.html").exists());
}

#[tokio::test]
async fn test_build_drops_remove_blocks() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/about.html",
        "<head>\n<!-- build:remove -->\n<script src=\"/livereload-dev.js\"></script>\n<!-- endbuild -->\n</head>\n<p>About</p>\n",
    );

    let (pipeline, _) = pipeline(temp.path());
    pipeline.build().run().await.unwrap();

    let page = read(&temp.path().join("dist"), "about.html");
    assert!(page.contains("About"));
    assert!(!page.contains("livereload-dev.js"));
    assert!(!page.contains("build:remove"));
    assert!(!page.contains("endbuild"));
}
