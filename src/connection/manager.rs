//! Connection manager: keeps a live-update feed available and degrades to the
//! synthetic source instead of failing.
//!
//! ```text
//! Disconnected --connect()--> Connecting
//! Connecting   --ok---------> Connected      (attempts reset)
//! Connecting   --fail-------> Reconnecting   (attempts += 1)
//! Reconnecting --ok---------> Connected
//! Reconnecting --attempts > max--> Failed --fallback_to_mock--> UsingFallback
//! any          --disconnect()--> Disconnected
//! ```
//!
//! All channel work runs on one driver task per manager. `disconnect()` and
//! `retry()` abort that task and wait for it, so no reconnect timer or
//! fallback tick outlives them. Lifecycle calls are serialized, so at most one
//! driver exists at a time.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::backoff::IsRetryable;
use super::config::ConnectionConfig;
use super::source::{SourceError, UpdateHandler, UpdateSource, UpdateStream};
use super::state::{ConnectionInfo, ConnectionState, SourceKind};
use super::synthetic::SyntheticSource;
use super::websocket::WebSocketSource;
use crate::clock::current_time_ms;
use crate::fleet::UpdateEnvelope;

struct Status {
    reconnect_attempts: u32,
    last_connected: Option<u64>,
    is_online: bool,
    update_count: u64,
    last_update: Option<UpdateEnvelope>,
    active_source: Option<SourceKind>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            reconnect_attempts: 0,
            last_connected: None,
            is_online: true,
            update_count: 0,
            last_update: None,
            active_source: None,
        }
    }
}

/// State shared between the manager handle and its driver task.
struct Shared {
    config: ConnectionConfig,
    live: Arc<dyn UpdateSource>,
    fallback: Arc<dyn UpdateSource>,
    status: Mutex<Status>,
    handlers: Mutex<Vec<Arc<dyn UpdateHandler>>>,
    state_tx: watch::Sender<ConnectionState>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ConnectionState>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn transition(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        let attempts = self.status.lock().reconnect_attempts;
        info!(from = %prev, to = %next, attempts, "connection state changed");
        self.listeners.lock().retain(|tx| tx.send(next).is_ok());
    }

    fn mark_connected(&self, kind: SourceKind) {
        {
            let mut status = self.status.lock();
            status.reconnect_attempts = 0;
            status.last_connected = Some(current_time_ms());
            status.active_source = Some(kind);
        }
        self.transition(ConnectionState::Connected);
    }

    fn record_failed_attempt(&self) -> u32 {
        let mut status = self.status.lock();
        status.reconnect_attempts += 1;
        status.reconnect_attempts
    }

    async fn deliver(&self, envelope: UpdateEnvelope) {
        let handlers = {
            let mut status = self.status.lock();
            status.update_count += 1;
            status.last_update = Some(envelope.clone());
            self.handlers.lock().clone()
        };
        debug!(kind = envelope.kind.as_str(), timestamp = envelope.timestamp, "update received");

        for handler in handlers {
            handler.handle_update(&envelope).await;
        }
    }

    /// Forward envelopes until the stream errors or ends. Returns why it stopped.
    async fn pump(&self, mut stream: UpdateStream) -> SourceError {
        while let Some(item) = stream.next().await {
            match item {
                Ok(envelope) => self.deliver(envelope).await,
                Err(e) => return e,
            }
        }
        SourceError::Closed
    }

    async fn open_live(&self) -> Result<UpdateStream, SourceError> {
        match timeout(self.config.connect_timeout(), self.live.open()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout),
        }
    }
}

/// Driver task body: reconnect loop, then fallback.
async fn drive(shared: Arc<Shared>) {
    let policy = shared.config.reconnect_policy();
    let max_attempts = shared.config.reconnect_attempts;

    loop {
        match shared.open_live().await {
            Ok(stream) => {
                shared.mark_connected(shared.live.kind());
                let reason = shared.pump(stream).await;
                warn!(reason = %reason, "live channel lost");
            }
            Err(e) if !e.is_retryable() => {
                error!(error = %e, "live channel cannot be opened, not retrying");
                shared.transition(ConnectionState::Failed);
                break;
            }
            Err(e) => {
                warn!(error = %e, "live channel open failed");
            }
        }

        let attempts = shared.record_failed_attempt();
        if attempts > max_attempts {
            shared.transition(ConnectionState::Failed);
            break;
        }
        shared.transition(ConnectionState::Reconnecting);
        let delay = policy.delay_for_attempt(attempts - 1);
        debug!(attempt = attempts, max = max_attempts, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        sleep(delay).await;
    }

    if shared.config.fallback_to_mock {
        run_fallback(&shared).await;
    }
}

async fn run_fallback(shared: &Shared) {
    match shared.fallback.open().await {
        Ok(stream) => {
            shared.status.lock().active_source = Some(shared.fallback.kind());
            shared.transition(ConnectionState::UsingFallback);
            let reason = shared.pump(stream).await;
            warn!(reason = %reason, "fallback generator stopped");
            shared.status.lock().active_source = None;
            shared.transition(ConnectionState::Failed);
        }
        Err(e) => {
            error!(error = %e, "fallback generator could not start");
        }
    }
}

/// Owns the live-update channel lifecycle for one dashboard.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
    lifecycle: AsyncMutex<()>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        live: Arc<dyn UpdateSource>,
        fallback: Arc<dyn UpdateSource>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                live,
                fallback,
                status: Mutex::new(Status::default()),
                handlers: Mutex::new(Vec::new()),
                state_tx,
                listeners: Mutex::new(Vec::new()),
            }),
            driver: Mutex::new(None),
            lifecycle: AsyncMutex::new(()),
        }
    }

    /// WebSocket live channel at `config.url`, synthetic fallback at `config.mock_interval_ms`.
    pub fn with_default_sources(config: ConnectionConfig) -> Self {
        let live = Arc::new(WebSocketSource::new(config.url.clone()));
        let fallback = Arc::new(SyntheticSource::new(config.mock_interval()));
        Self::new(config, live, fallback)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Connect if `auto_connect` is set. Must be called inside a tokio runtime.
    pub fn start(&self) -> bool {
        if self.shared.config.auto_connect {
            self.connect()
        } else {
            debug!("auto_connect disabled, waiting for explicit connect");
            false
        }
    }

    /// Register a consumer for every delivered envelope.
    pub fn subscribe(&self, handler: Arc<dyn UpdateHandler>) {
        self.shared.handlers.lock().push(handler);
    }

    /// Every state transition from now on, in order.
    pub fn state_changes(&self) -> mpsc::UnboundedReceiver<ConnectionState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.listeners.lock().push(tx);
        rx
    }

    /// Latest state only.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn info(&self) -> ConnectionInfo {
        let state = self.shared.state();
        let status = self.shared.status.lock();
        ConnectionInfo {
            kind: status.active_source.unwrap_or_else(|| self.shared.live.kind()),
            status: state,
            last_connected: status.last_connected,
            reconnect_attempts: status.reconnect_attempts,
            is_connected: state == ConnectionState::Connected,
            is_using_mock_data: state == ConnectionState::UsingFallback,
            is_online: status.is_online,
            update_count: status.update_count,
            last_update: status.last_update.clone(),
        }
    }

    /// Start connecting. Only valid from `Disconnected`; returns whether a connect began.
    pub fn connect(&self) -> bool {
        let Ok(_lifecycle) = self.lifecycle.try_lock() else {
            debug!("connect ignored, retry or disconnect in progress");
            return false;
        };
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("connect ignored, driver already running");
            return false;
        }
        if self.shared.state() != ConnectionState::Disconnected {
            debug!(state = %self.shared.state(), "connect ignored, use retry()");
            return false;
        }
        self.spawn_driver(&mut driver);
        true
    }

    /// Force an immediate reconnect attempt from any state but `Connected`,
    /// resetting the attempt counter.
    pub async fn retry(&self) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        if self.shared.state() == ConnectionState::Connected {
            return false;
        }
        self.stop_driver().await;
        {
            let mut status = self.shared.status.lock();
            status.reconnect_attempts = 0;
            status.active_source = None;
        }
        info!("manual reconnect requested");

        let mut driver = self.driver.lock();
        self.spawn_driver(&mut driver);
        true
    }

    /// Tear down the channel, cancel pending reconnects and stop the fallback generator.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_driver().await;
        {
            let mut status = self.shared.status.lock();
            status.reconnect_attempts = 0;
            status.active_source = None;
        }
        if self.shared.state() != ConnectionState::Disconnected {
            self.shared.transition(ConnectionState::Disconnected);
        }
    }

    /// Record host reachability. Coming back online while degraded triggers `retry()`.
    pub async fn set_online(&self, online: bool) {
        let was_online = std::mem::replace(&mut self.shared.status.lock().is_online, online);
        if was_online == online {
            return;
        }
        info!(online, "network reachability changed");
        if online
            && matches!(
                self.shared.state(),
                ConnectionState::Failed | ConnectionState::UsingFallback
            )
        {
            self.retry().await;
        }
    }

    fn spawn_driver(&self, driver: &mut Option<JoinHandle<()>>) {
        self.shared.transition(ConnectionState::Connecting);
        if let Some(stale) = driver.replace(tokio::spawn(drive(self.shared.clone()))) {
            warn!("replacing a running driver");
            stale.abort();
        }
    }

    async fn stop_driver(&self) {
        let task = self.driver.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.driver.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use futures::stream;

    use crate::fleet::{UpdateKind, UpdatePayload};

    /// Fails the first `failures` opens, then serves `envelopes` and stays open.
    struct ScriptedSource {
        failures: u32,
        opens: AtomicU32,
        envelopes: Vec<UpdateEnvelope>,
    }

    impl ScriptedSource {
        fn new(failures: u32, envelopes: Vec<UpdateEnvelope>) -> Self {
            Self {
                failures,
                opens: AtomicU32::new(0),
                envelopes,
            }
        }
    }

    #[async_trait::async_trait]
    impl UpdateSource for ScriptedSource {
        fn kind(&self) -> SourceKind {
            SourceKind::WebSocket
        }

        async fn open(&self) -> Result<UpdateStream, SourceError> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(SourceError::Connect("refused".into()));
            }
            let items: Vec<_> = self.envelopes.iter().cloned().map(Ok).collect();
            Ok(stream::iter(items).chain(stream::pending()).boxed())
        }
    }

    struct InvalidSource;

    #[async_trait::async_trait]
    impl UpdateSource for InvalidSource {
        fn kind(&self) -> SourceKind {
            SourceKind::WebSocket
        }

        async fn open(&self) -> Result<UpdateStream, SourceError> {
            Err(SourceError::InvalidUrl("bogus".into()))
        }
    }

    fn envelope(timestamp: u64) -> UpdateEnvelope {
        UpdateEnvelope {
            kind: UpdateKind::StatsUpdate,
            timestamp,
            payload: UpdatePayload::default(),
        }
    }

    fn fast_config(attempts: u32, fallback: bool) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_attempts: attempts,
            reconnect_interval_ms: 5,
            fallback_to_mock: fallback,
            connect_timeout_ms: 200,
            mock_interval_ms: 5,
            ..Default::default()
        }
    }

    async fn wait_for(manager: &ConnectionManager, state: ConnectionState) {
        let mut rx = manager.watch_state();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn connects_after_transient_failures_and_resets_attempts() {
        let live = Arc::new(ScriptedSource::new(2, vec![envelope(1), envelope(2)]));
        let manager = ConnectionManager::new(
            fast_config(5, false),
            live.clone(),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        let mut changes = manager.state_changes();

        assert!(manager.connect());
        wait_for(&manager, ConnectionState::Connected).await;

        let mut seen = Vec::new();
        while let Ok(state) = changes.try_recv() {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Reconnecting,
                ConnectionState::Reconnecting,
                ConnectionState::Connected,
            ]
        );

        // Deliveries happen after the transition; give the driver a moment.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let info = manager.info();
        assert_eq!(info.reconnect_attempts, 0);
        assert!(info.is_connected);
        assert!(info.last_connected.is_some());
        assert_eq!(info.update_count, 2);
        assert_eq!(info.last_update.unwrap().timestamp, 2);
        assert_eq!(live.opens.load(Ordering::SeqCst), 3);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn exhausted_attempts_without_fallback_stay_failed() {
        let manager = ConnectionManager::new(
            fast_config(1, false),
            Arc::new(ScriptedSource::new(u32::MAX, vec![])),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        manager.connect();
        wait_for(&manager, ConnectionState::Failed).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(manager.info().update_count, 0);
        assert_eq!(manager.info().reconnect_attempts, 2);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_retrying() {
        let manager = ConnectionManager::new(
            fast_config(5, false),
            Arc::new(InvalidSource),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        let mut changes = manager.state_changes();
        manager.connect();
        wait_for(&manager, ConnectionState::Failed).await;

        assert_eq!(changes.recv().await, Some(ConnectionState::Connecting));
        assert_eq!(changes.recv().await, Some(ConnectionState::Failed));
        assert_eq!(manager.info().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn connect_is_ignored_unless_disconnected() {
        let manager = ConnectionManager::new(
            fast_config(0, false),
            Arc::new(ScriptedSource::new(u32::MAX, vec![])),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        assert!(manager.connect());
        assert!(!manager.connect());
        wait_for(&manager, ConnectionState::Failed).await;
        assert!(!manager.connect());
    }

    #[tokio::test]
    async fn retry_resets_attempts_and_reconnects() {
        let live = Arc::new(ScriptedSource::new(2, vec![envelope(9)]));
        let manager = ConnectionManager::new(
            fast_config(0, false),
            live,
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        manager.connect();
        wait_for(&manager, ConnectionState::Failed).await;
        assert_eq!(manager.info().reconnect_attempts, 1);

        // Second open also fails; third succeeds.
        assert!(manager.retry().await);
        wait_for(&manager, ConnectionState::Failed).await;
        assert!(manager.retry().await);
        wait_for(&manager, ConnectionState::Connected).await;
        assert_eq!(manager.info().reconnect_attempts, 0);

        assert!(!manager.retry().await);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn auto_connect_controls_start() {
        let config = ConnectionConfig {
            auto_connect: false,
            ..fast_config(0, false)
        };
        let manager = ConnectionManager::new(
            config,
            Arc::new(ScriptedSource::new(0, vec![])),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        assert!(!manager.start());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn concurrent_retries_leave_a_single_driver() {
        let manager = ConnectionManager::new(
            fast_config(0, true),
            Arc::new(ScriptedSource::new(u32::MAX, vec![])),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        manager.connect();
        wait_for(&manager, ConnectionState::UsingFallback).await;

        let (first, second) = tokio::join!(manager.retry(), manager.retry());
        assert!(first && second);
        wait_for(&manager, ConnectionState::UsingFallback).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        manager.disconnect().await;
        let at_disconnect = manager.info().update_count;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.info().update_count, at_disconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let live = Arc::new(ScriptedSource::new(u32::MAX, vec![]));
        let config = ConnectionConfig {
            reconnect_interval_ms: 10_000,
            ..fast_config(5, false)
        };
        let manager = ConnectionManager::new(
            config,
            live.clone(),
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        manager.connect();
        wait_for(&manager, ConnectionState::Reconnecting).await;
        assert_eq!(live.opens.load(Ordering::SeqCst), 1);

        manager.disconnect().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(live.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn coming_back_online_retries_from_fallback() {
        let live = Arc::new(ScriptedSource::new(1, vec![]));
        let manager = ConnectionManager::new(
            fast_config(0, true),
            live,
            Arc::new(SyntheticSource::new(Duration::from_millis(5))),
        );
        manager.set_online(false).await;
        manager.connect();
        wait_for(&manager, ConnectionState::UsingFallback).await;
        assert!(!manager.info().is_online);
        assert!(manager.info().is_using_mock_data);

        manager.set_online(true).await;
        wait_for(&manager, ConnectionState::Connected).await;
        assert_eq!(manager.info().kind, SourceKind::WebSocket);
        manager.disconnect().await;
    }
}
