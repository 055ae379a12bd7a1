use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Default)]
struct Hits(AtomicU64);

impl Hits {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub hits: u64,
}

pub fn router() -> Router {
    let hits = Arc::new(Hits::default());
    Router::new()
        .route("/", get(root))
        .route("/delay/:ms", get(delay))
        .route("/status/:code", get(status))
        .route("/stats", get(stats))
        .with_state(hits)
}

async fn root(State(hits): State<Arc<Hits>>) -> &'static str {
    hits.bump();
    "ok"
}

// waits `ms` milliseconds before answering
async fn delay(State(hits): State<Arc<Hits>>, Path(ms): Path<u64>) -> String {
    hits.bump();
    sleep(Duration::from_millis(ms)).await;
    format!("waited {}ms", ms)
}

async fn status(State(hits): State<Arc<Hits>>, Path(code): Path<u16>) -> StatusCode {
    hits.bump();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn stats(State(hits): State<Arc<Hits>>) -> Json<Stats> {
    Json(Stats {
        hits: hits.0.load(Ordering::Relaxed),
    })
}

/// A running target server.
pub struct TargetServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TargetServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stops accepting connections and waits for the server task to end.
    pub async fn shutdown(self) -> std::io::Result<()> {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

/// Binds `addr` (port 0 picks a free port) and serves [`router`] in the background.
pub async fn spawn(addr: SocketAddr) -> std::io::Result<TargetServer> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        axum::serve(listener, router())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    tracing::info!(%addr, "target listening");

    Ok(TargetServer {
        addr,
        shutdown,
        handle,
    })
}
