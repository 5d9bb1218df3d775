//! Integration tests for the dev server, over HTTP.

mod common;

use common::{pipeline, pipeline_with, write};
use pages_pipeline::config::Config;
use pages_pipeline::dev::{
    CLIENT_SCRIPT_PATH, LIVERELOAD_PATH, ReloadEvent, ReloadHub, ServerOptions, start_server,
};
use pages_pipeline::paths::ProjectPaths;
use reqwest::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;

fn project(root: &std::path::Path) {
    write(root, "temp/index.html", "<html><body><h1>compiled</h1></body></html>");
    write(root, "src/index.html", "<html><body>{{ raw }}</body></html>");
    write(root, "src/assets/images/logo.svg", "<svg/>");
    write(root, "public/robots.txt", "User-agent: *");
    write(root, "node_modules/lib/lib.js", "window.lib = {};");
}

async fn serve(root: &std::path::Path) -> (tokio::sync::oneshot::Sender<()>, SocketAddr) {
    let config = Config {
        port: 0,
        ..Config::default()
    };
    let paths = ProjectPaths::resolve(root, &config.build);
    start_server(&ServerOptions::new(&config, &paths), ReloadHub::new())
        .await
        .unwrap()
}

async fn get(addr: SocketAddr, path: &str) -> reqwest::Response {
    reqwest::get(format!("http://{}{}", addr, path)).await.unwrap()
}

#[tokio::test]
async fn test_roots_in_order() {
    let temp = TempDir::new().unwrap();
    project(temp.path());
    let (_shutdown, addr) = serve(temp.path()).await;

    // temp wins over src
    let index = get(addr, "/index.html").await.text().await.unwrap();
    assert!(index.contains("compiled"));

    let logo = get(addr, "/assets/images/logo.svg").await;
    assert_eq!(logo.status(), StatusCode::OK);
    assert_eq!(logo.text().await.unwrap(), "<svg/>");

    let robots = get(addr, "/robots.txt").await.text().await.unwrap();
    assert_eq!(robots, "User-agent: *");

    assert_eq!(get(addr, "/missing.css").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_node_modules_route() {
    let temp = TempDir::new().unwrap();
    project(temp.path());
    let (_shutdown, addr) = serve(temp.path()).await;

    let response = get(addr, "/node_modules/lib/lib.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "window.lib = {};");
}

#[tokio::test]
async fn test_client_injected_into_html() {
    let temp = TempDir::new().unwrap();
    project(temp.path());
    let (_shutdown, addr) = serve(temp.path()).await;

    let page = get(addr, "/").await.text().await.unwrap();
    let snippet = format!(r#"<script async src="{}"></script></body>"#, CLIENT_SCRIPT_PATH);
    assert!(page.contains(&snippet), "{page}");

    let script = get(addr, CLIENT_SCRIPT_PATH).await.text().await.unwrap();
    assert!(script.contains(LIVERELOAD_PATH));
    assert!(script.starts_with("var NOTIFY = false;"));

    // other content types are served untouched
    let robots = get(addr, "/robots.txt").await.text().await.unwrap();
    assert!(!robots.contains("<script"));
}

#[tokio::test]
async fn test_binds_configured_port() {
    let temp = TempDir::new().unwrap();
    project(temp.path());

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = Config {
        port,
        ..Config::default()
    };
    let paths = ProjectPaths::resolve(temp.path(), &config.build);
    let (_shutdown, addr) = start_server(&ServerOptions::new(&config, &paths), ReloadHub::new())
        .await
        .unwrap();
    assert_eq!(addr.port(), port);
}

#[tokio::test]
async fn test_style_task_pushes_injection() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/assets/styles/main.scss", "a {}");
    write(temp.path(), "src/index.html", "<p>");

    let (pipeline, _) = pipeline(temp.path());
    let mut events = pipeline.context().reload.subscribe();

    pipeline.style().run().await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        ReloadEvent::Inject {
            paths: vec!["assets/styles/main.css".to_string()]
        }
    );

    pipeline.page().run().await.unwrap();
    assert_eq!(events.recv().await.unwrap(), ReloadEvent::Reload);
}

/// Wait for the first event satisfying `wanted`, skipping others.
async fn next_matching(
    events: &mut tokio::sync::broadcast::Receiver<ReloadEvent>,
    wanted: impl Fn(&ReloadEvent) -> bool,
) -> ReloadEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.unwrap();
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("no matching reload event")
}

#[tokio::test]
async fn test_watched_changes_reach_browsers() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/assets/styles/main.scss", "a {}");
    write(temp.path(), "src/assets/images/logo.svg", "<svg/>");
    write(temp.path(), "src/index.html", "<p>");

    let config = Config {
        port: 0,
        ..Config::default()
    };
    let (pipeline, _) = pipeline_with(temp.path(), config);
    let mut events = pipeline.context().reload.subscribe();
    let session = pipeline.dev_session().unwrap();
    let running = tokio::spawn(session.run());

    // let the watcher settle before editing
    tokio::time::sleep(Duration::from_millis(500)).await;

    write(temp.path(), "src/assets/styles/main.scss", "a { color: red }");
    let event = next_matching(&mut events, |e| matches!(e, ReloadEvent::Inject { .. })).await;
    assert_eq!(
        event,
        ReloadEvent::Inject {
            paths: vec!["assets/styles/main.css".to_string()]
        }
    );
    assert!(temp.path().join("temp/assets/styles/main.css").exists());

    write(temp.path(), "src/assets/images/logo.svg", "<svg></svg>");
    let event = next_matching(&mut events, |e| *e == ReloadEvent::Reload).await;
    assert_eq!(event, ReloadEvent::Reload);
    // images are served from src, never compiled
    assert!(!temp.path().join("temp/assets/images/logo.svg").exists());

    running.abort();
}
