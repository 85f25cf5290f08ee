//! Upstream feed connector: owns the WebSocket to the report source,
//! reconnects forever on a fixed interval, and publishes debounced
//! change notifications as reports land in the live store.

use crate::normalize::{NormalizeError, Normalizer};
use crate::store::LiveStore;
use crate::types::RawReport;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Why a single inbound frame was dropped. Neither case touches the
/// connection or the live store.
#[derive(Debug, Error)]
enum IngestError {
    #[error("unparseable frame: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unusable frame: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Configuration for the feed connector.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream WebSocket URL.
    pub url: String,
    /// Fixed wait between reconnection attempts.
    pub retry_interval: Duration,
    /// Window within which store writes coalesce into one notification.
    pub debounce: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8085".to_string(),
            retry_interval: Duration::from_secs(5),
            debounce: Duration::from_millis(10),
        }
    }
}

/// Ingestion counters.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub messages: AtomicU64,
    pub upserts: AtomicU64,
    pub parse_errors: AtomicU64,
    pub normalize_errors: AtomicU64,
    pub connects: AtomicU64,
    pub disconnects: AtomicU64,
}

impl FeedStats {
    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            normalize_errors: self.normalize_errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedStatsSnapshot {
    pub messages: u64,
    pub upserts: u64,
    pub parse_errors: u64,
    pub normalize_errors: u64,
    pub connects: u64,
    pub disconnects: u64,
}

/// The feed connector. One instance owns one upstream connection and is
/// the only writer of its live store.
pub struct FeedConnector {
    config: FeedConfig,
    normalizer: Normalizer,
    store: Arc<LiveStore>,
    stats: Arc<FeedStats>,
    running: Arc<AtomicBool>,
    state: AtomicU8,
    dirty: Arc<Notify>,
    updates: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
}

impl FeedConnector {
    pub fn new(config: FeedConfig, normalizer: Normalizer, store: Arc<LiveStore>) -> Self {
        let (updates, _) = watch::channel(0u64);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            normalizer,
            store,
            stats: Arc::new(FeedStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            dirty: Arc::new(Notify::new()),
            updates,
            shutdown,
        }
    }

    /// Revision channel bumped at most once per debounce window.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::Relaxed))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the connector: close the active connection and cancel the
    /// retry and debounce timers.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
    }

    /// Run until [`stop`](Self::stop). Reconnection is perpetual; no error
    /// on this path is fatal.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        let publisher = self.spawn_publisher();
        let mut shutdown = self.shutdown.subscribe();

        while self.running.load(Ordering::Relaxed) {
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(url = %self.config.url, "connecting to feed");

            tokio::select! {
                result = connect_async(self.config.url.as_str()) => match result {
                    Ok((socket, _)) => {
                        self.set_state(ConnectionState::Connected);
                        self.stats.connects.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(url = %self.config.url, "feed connected");

                        self.read_messages(socket, &mut shutdown).await;

                        self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
                        tracing::info!("feed disconnected");
                    }
                    Err(err) => {
                        tracing::warn!("feed connection failed: {err}");
                    }
                },
                _ = shutdown.changed() => break,
            }

            self.set_state(ConnectionState::Disconnected);
            if !self.running.load(Ordering::Relaxed) {
                break;
            }

            tracing::debug!(
                "retrying in {} ms",
                self.config.retry_interval.as_millis()
            );
            tokio::select! {
                _ = sleep(self.config.retry_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        publisher.abort();
    }

    /// Debounced publisher: the first store write arms the window; writes
    /// landing inside it coalesce, and one revision bump fires at window
    /// close.
    fn spawn_publisher(&self) -> tokio::task::JoinHandle<()> {
        let dirty = Arc::clone(&self.dirty);
        let updates = self.updates.clone();
        let window = self.config.debounce;
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = dirty.notified() => {}
                    _ = shutdown.changed() => break,
                }
                sleep(window).await;
                updates.send_modify(|revision| *revision += 1);
            }
        })
    }

    async fn read_messages(
        &self,
        mut socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                message = socket.next() => match message {
                    Some(Ok(Message::Text(text))) => self.ingest(text.as_str()),
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("feed closed by upstream");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!("feed transport error: {err}");
                        break;
                    }
                    None => break,
                },
                // Dropping the socket here closes the connection.
                _ = shutdown.changed() => break,
            }
        }
    }

    fn ingest(&self, text: &str) {
        self.stats.messages.fetch_add(1, Ordering::Relaxed);
        match self.handle_frame(text) {
            Ok(()) => self.dirty.notify_one(),
            Err(IngestError::Parse(err)) => {
                self.stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("dropping frame: {err}");
            }
            Err(IngestError::Normalize(err)) => {
                self.stats.normalize_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("dropping frame: {err}");
            }
        }
    }

    fn handle_frame(&self, text: &str) -> Result<(), IngestError> {
        let raw: RawReport = serde_json::from_str(text)?;
        let report = self.normalizer.normalize(&raw)?;
        self.store.upsert(report);
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}
