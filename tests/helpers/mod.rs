#![allow(dead_code)] // Test helpers appear unused when compiled independently

use async_trait::async_trait;
use futures::{stream, SinkExt, StreamExt};
use proxywatch::connection::{
    SourceError, SourceKind, UpdateHandler, UpdateSource, UpdateStream,
};
use proxywatch::fleet::UpdateEnvelope;
use proxywatch::native::{build_router, AppState};
use reqwest::Client;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

pub async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

/// Serve the proxywatch router on a free port, return (server task, base URL)
pub async fn spawn_app(state: AppState) -> (JoinHandle<()>, String) {
    let port = free_port().await;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind app listener");
    let handle = tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    (handle, format!("http://127.0.0.1:{}", port))
}

/// WebSocket server that sends a fixed list of envelopes to every client, then
/// holds the connection open until stopped.
pub struct MockFleet {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    connections: Arc<AtomicUsize>,
}

impl MockFleet {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Stop accepting and drop every open connection.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Spawn the mock fleet channel, return (server handle, ws URL)
pub async fn spawn_mock_fleet(port: u16, envelopes: Vec<UpdateEnvelope>) -> (MockFleet, String) {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind mock fleet listener");
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let mut clients = Vec::new();
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                accepted = listener.accept() => {
                    let Ok((tcp, _)) = accepted else { continue };
                    counter.fetch_add(1, Ordering::SeqCst);
                    let envelopes = envelopes.clone();
                    clients.push(tokio::spawn(async move {
                        let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                            return;
                        };
                        for envelope in envelopes {
                            let text = serde_json::to_string(&envelope).unwrap();
                            if ws.send(Message::Text(text)).await.is_err() {
                                return;
                            }
                        }
                        // Drain until the client goes away.
                        while let Some(Ok(_)) = ws.next().await {}
                    }));
                }
            }
        }
        for client in clients {
            client.abort();
        }
    });

    (
        MockFleet {
            shutdown_tx,
            handle,
            connections,
        },
        format!("ws://127.0.0.1:{}/v1/fleet/updates", port),
    )
}

/// Live source whose every open attempt fails.
pub struct RefusingSource {
    pub attempts: AtomicUsize,
}

impl RefusingSource {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UpdateSource for RefusingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WebSocket
    }

    async fn open(&self) -> Result<UpdateStream, SourceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Connect("connection refused".to_string()))
    }
}

/// Live source that delivers a fixed list of envelopes, then stays open.
pub struct ScriptedSource {
    envelopes: Vec<UpdateEnvelope>,
}

impl ScriptedSource {
    pub fn new(envelopes: Vec<UpdateEnvelope>) -> Self {
        Self { envelopes }
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WebSocket
    }

    async fn open(&self) -> Result<UpdateStream, SourceError> {
        let items: Vec<_> = self.envelopes.iter().cloned().map(Ok).collect();
        Ok(stream::iter(items).chain(stream::pending()).boxed())
    }
}

/// Handler that records every envelope it is given.
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<UpdateEnvelope>>,
}

impl Recorder {
    pub async fn count(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn timestamps(&self) -> Vec<u64> {
        self.seen.lock().await.iter().map(|e| e.timestamp).collect()
    }
}

#[async_trait]
impl UpdateHandler for Recorder {
    async fn handle_update(&self, envelope: &UpdateEnvelope) {
        self.seen.lock().await.push(envelope.clone());
    }
}
