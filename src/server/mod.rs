//! Development server with live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::Site;

/// Snippet appended before `</body>` on served HTML. Reconnecting after
/// a dropped socket reloads the page, which picks up whatever was
/// regenerated while the server was away.
const RELOAD_SNIPPET: &str = "\
<script>\n\
(() => {\n\
  const sock = new WebSocket(`ws://${location.host}/__reload`);\n\
  sock.onmessage = (ev) => { if (ev.data === 'reload') location.reload(); };\n\
  sock.onclose = () => setTimeout(() => location.reload(), 1000);\n\
})();\n\
</script>\n\
</body>";

struct DevState {
    public_dir: PathBuf,
    notify: broadcast::Sender<()>,
    inject: bool,
}

/// Serve the generated site, regenerating and pushing reloads on change
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool) -> Result<()> {
    let (notify, _) = broadcast::channel::<()>(16);

    let state = Arc::new(DevState {
        public_dir: site.public_dir.clone(),
        notify: notify.clone(),
        inject: watch,
    });

    let app = Router::new()
        .route("/__reload", get(reload_socket))
        .fallback(serve_file)
        .with_state(state);

    let host = match ip {
        "localhost" => "127.0.0.1",
        other => other,
    };
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if watch {
        println!("Live reload enabled. Watching for changes...");
        let site = site.clone();
        tokio::spawn(async move {
            if let Err(e) = regenerate_on_change(site, notify).await {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Events from editors and VCS noise that should not trigger a rebuild
fn is_noise(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.contains(".git") || s.contains(".DS_Store") || s.ends_with('~')
}

/// Watch the source tree and config, regenerate, notify clients
async fn regenerate_on_change(site: Site, notify: broadcast::Sender<()>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    if site.source_dir.exists() {
        debouncer
            .watcher()
            .watch(&site.source_dir, RecursiveMode::Recursive)?;
    }
    let config_path = site.base_dir.join("_config.yml");
    if config_path.exists() {
        debouncer
            .watcher()
            .watch(&config_path, RecursiveMode::NonRecursive)?;
    }

    while let Ok(batch) = rx.recv() {
        let events = match batch {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
        };
        if events.iter().all(|e| is_noise(&e.path)) {
            continue;
        }
        for event in events.iter().filter(|e| !is_noise(&e.path)) {
            tracing::info!("File changed: {}", event.path.display());
        }

        match site.generate() {
            Ok(()) => {
                tracing::info!("Regenerated successfully");
                let _ = notify.send(());
            }
            Err(e) => tracing::error!("Generation failed: {}", e),
        }
    }

    Ok(())
}

async fn reload_socket(
    upgrade: WebSocketUpgrade,
    State(state): State<Arc<DevState>>,
) -> impl IntoResponse {
    let rx = state.notify.subscribe();
    upgrade.on_upgrade(move |socket| reload_client(socket, rx))
}

/// Push one "reload" text frame per regeneration until the client goes away
async fn reload_client(mut socket: WebSocket, mut rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            signal = rx.recv() => match signal {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if socket.send(Message::Text("reload".to_string())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Map a request path to a file under `public/`, directory-style routes
/// landing on their `index.html`
fn resolve_file(public_dir: &Path, uri_path: &str) -> PathBuf {
    let relative = uri_path.trim_start_matches('/');
    if relative.is_empty() {
        return public_dir.join("index.html");
    }

    let candidate = public_dir.join(relative);
    if candidate.is_dir() {
        return candidate.join("index.html");
    }
    if candidate.exists() {
        return candidate;
    }
    let with_html = public_dir.join(format!("{}.html", relative));
    if with_html.exists() {
        with_html
    } else {
        candidate
    }
}

/// Serve files from `public/`, injecting the reload snippet into HTML
async fn serve_file(State(state): State<Arc<DevState>>, request: Request<Body>) -> Response {
    let file_path = resolve_file(&state.public_dir, request.uri().path());

    let is_html = matches!(
        file_path.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    );

    if is_html && state.inject {
        return match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => Html(inject_reload_snippet(&content)).into_response(),
            Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        };
    }

    let mut service = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

fn inject_reload_snippet(html: &str) -> String {
    match html.find("</body>") {
        Some(_) => html.replace("</body>", RELOAD_SNIPPET),
        None => format!("{}{}", html, RELOAD_SNIPPET),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_inject_reload_snippet() {
        let html = "<html><body><p>hi</p></body></html>";
        let injected = inject_reload_snippet(html);
        assert!(injected.contains("__reload"));
        assert!(injected.contains("</body>"));
        // Appended even when the page has no closing body tag
        assert!(inject_reload_snippet("<p>bare</p>").contains("__reload"));
    }

    #[test]
    fn test_resolve_file_routes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("about")).unwrap();
        fs::write(dir.path().join("about/index.html"), "x").unwrap();
        fs::write(dir.path().join("extra.html"), "x").unwrap();

        assert_eq!(
            resolve_file(dir.path(), "/"),
            dir.path().join("index.html")
        );
        assert_eq!(
            resolve_file(dir.path(), "/about/"),
            dir.path().join("about/index.html")
        );
        assert_eq!(
            resolve_file(dir.path(), "/extra"),
            dir.path().join("extra.html")
        );
    }
}
