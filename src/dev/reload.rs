//! Live-reload notifications.
//!
//! Tasks report the files they wrote; connected browsers receive either an
//! in-place stylesheet injection (when only CSS changed) or a full reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Path of the websocket endpoint browsers connect to.
pub const LIVERELOAD_PATH: &str = "/__pages/livereload";

/// Path of the client script injected into served pages.
pub const CLIENT_SCRIPT_PATH: &str = "/__pages/client.js";

const CHANNEL_CAPACITY: usize = 64;

/// Message pushed to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadEvent {
    /// Swap these stylesheets in place.
    Inject { paths: Vec<String> },
    /// Reload the whole page.
    Reload,
}

impl ReloadEvent {
    /// Decide how browsers should pick up a set of written files.
    pub fn for_changes(paths: &[String]) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        if paths.iter().all(|p| p.ends_with(".css")) {
            Some(ReloadEvent::Inject {
                paths: paths.to_vec(),
            })
        } else {
            Some(ReloadEvent::Reload)
        }
    }
}

/// Fan-out of reload events to every connected browser.
///
/// Cloning shares the same channel. Sending with no browser connected is a
/// no-op, so tasks publish unconditionally.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: ReloadEvent) {
        debug!(?event, receivers = self.tx.receiver_count(), "Live reload");
        let _ = self.tx.send(event);
    }

    /// Announce written files (output-relative, forward slashes).
    pub fn changed(&self, paths: &[String]) {
        if let Some(event) = ReloadEvent::for_changes(paths) {
            self.send(event);
        }
    }

    /// Ask every browser to reload the page.
    pub fn reload(&self) {
        self.send(ReloadEvent::Reload);
    }
}

/// Script tag inserted into served HTML pages.
pub fn client_snippet() -> String {
    format!(r#"<script async src="{}"></script>"#, CLIENT_SCRIPT_PATH)
}

/// Insert the client snippet before the closing `</body>` tag, or append it
/// when the page has none.
pub fn inject_snippet(html: &str, snippet: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..index]);
            out.push_str(snippet);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, snippet),
    }
}

/// Browser-side client. `NOTIFY` is prepended by the server.
const CLIENT_SCRIPT: &str = r#"
(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "__LIVERELOAD_PATH__";

  function notify(text) {
    if (!NOTIFY) return;
    var el = document.createElement("div");
    el.textContent = text;
    el.style.cssText = "position:fixed;top:0;right:0;z-index:99999;padding:6px 12px;" +
      "background:#1b2032;color:#fff;font:13px sans-serif;";
    document.body.appendChild(el);
    setTimeout(function () { el.remove(); }, 1500);
  }

  function injectStyles(paths) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = 0;
    links.forEach(function (link) {
      var href = link.getAttribute("href") || "";
      var bare = href.split("?")[0];
      var hit = paths.some(function (p) { return bare === "/" + p || bare.endsWith(p); });
      if (hit) {
        link.setAttribute("href", bare + "?pages=" + Date.now());
        swapped++;
      }
    });
    if (swapped === 0) { location.reload(); return; }
    notify("Injected: " + paths.join(", "));
  }

  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (msg) {
      var event = JSON.parse(msg.data);
      if (event.type === "inject") {
        injectStyles(event.paths);
      } else {
        location.reload();
      }
    };
    socket.onclose = function () { setTimeout(connect, 1000); };
  }

  connect();
})();
"#;

/// Client script with the notification flag baked in.
pub fn client_script(notify: bool) -> String {
    format!(
        "var NOTIFY = {};{}",
        notify,
        CLIENT_SCRIPT.replace("__LIVERELOAD_PATH__", LIVERELOAD_PATH)
    )
}
