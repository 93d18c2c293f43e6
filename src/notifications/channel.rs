//! Live notification channel.
//!
//! # Responsibilities
//! - Abstract the push transport behind [`LiveChannel`]
//! - Provide a WebSocket implementation
//! - Supervise the connection: read frames, reconnect with bounded backoff,
//!   stop on shutdown
//!
//! # Data Flow
//! ```text
//! Server ──── text frames ────→ LiveChannel::recv
//!     → supervisor (run_supervisor)
//!     → FrameSink::on_frame (NotificationCenter)
//! ```
//!
//! # Design Decisions
//! - A connection that opens resets the failure count
//! - After `max_attempts` consecutive failures the supervisor gives up
//! - Shutdown interrupts connect, recv and the backoff sleep alike

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::LiveChannelConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connect to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("channel is not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(String),
}

/// A message-oriented push connection.
#[async_trait]
pub trait LiveChannel: Send {
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Next text payload. `Ok(None)` means the peer closed the connection.
    async fn recv(&mut self) -> Result<Option<String>, ChannelError>;

    /// Close the connection if open. Idempotent.
    async fn close(&mut self);
}

/// Receives payloads read by the supervisor.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, payload: &str);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`LiveChannel`] over a WebSocket.
pub struct WebSocketChannel {
    url: String,
    stream: Option<WsStream>,
}

impl WebSocketChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LiveChannel for WebSocketChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::debug!(len = bytes.len(), "Skipping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    self.stream = None;
                    return Ok(None);
                }
                // Ping, pong and raw frames
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(ChannelError::Transport(e.to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error closing live channel");
            }
        }
    }
}

/// Reconnect schedule for the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

impl From<&LiveChannelConfig> for ReconnectPolicy {
    fn from(config: &LiveChannelConfig) -> Self {
        Self {
            base: config.reconnect_base(),
            max: config.reconnect_max(),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl ReconnectPolicy {
    /// Wait before reconnect `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base, self.max, 2.0, 0.0)
    }
}

/// Why the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    Shutdown,
    GaveUp,
}

/// Drive `channel` until shutdown or until reconnects are exhausted.
pub async fn run_supervisor<C, S>(
    mut channel: C,
    sink: S,
    policy: ReconnectPolicy,
    mut shutdown: broadcast::Receiver<()>,
) -> SupervisorExit
where
    C: LiveChannel,
    S: FrameSink,
{
    let mut failures: u32 = 0;

    let exit = 'supervise: loop {
        let connected = tokio::select! {
            _ = shutdown.recv() => break 'supervise SupervisorExit::Shutdown,
            result = channel.connect() => result,
        };

        match connected {
            Ok(()) => {
                tracing::info!("Live channel connected");
                failures = 0;
                loop {
                    let received = tokio::select! {
                        _ = shutdown.recv() => break 'supervise SupervisorExit::Shutdown,
                        result = channel.recv() => result,
                    };
                    match received {
                        Ok(Some(payload)) => sink.on_frame(&payload),
                        Ok(None) => {
                            tracing::info!("Live channel closed by peer");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Live channel read failed");
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Live channel connect failed"),
        }

        failures += 1;
        if failures > policy.max_attempts {
            tracing::error!(attempts = policy.max_attempts, "Live channel reconnects exhausted, giving up");
            break SupervisorExit::GaveUp;
        }

        let delay = policy.delay(failures);
        tracing::info!(attempt = failures, delay_ms = delay.as_millis() as u64, "Reconnecting live channel");
        metrics::record_channel_reconnect();

        tokio::select! {
            _ = shutdown.recv() => break SupervisorExit::Shutdown,
            _ = tokio::time::sleep(delay) => {}
        }
    };

    channel.close().await;
    exit
}
