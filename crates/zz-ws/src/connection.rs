//! WebSocket connection manager.
//!
//! Owns the exchange socket: connects, re-subscribes every configured market,
//! forwards decoded frames and connection transitions to the engine, and
//! reconnects after a fixed delay until shut down.

use crate::error::{WsError, WsResult};
use crate::message::{ExchangeMessage, Inbound};
use crate::ws_write_handle::WsWriteHandle;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zz_core::ChainId;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Market subscription restored on every connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTarget {
    pub chain_id: ChainId,
    pub market_id: String,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay_ms: u64,
    /// Markets subscribed after each connect.
    pub subscriptions: Vec<SubscriptionTarget>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 0, // Infinite
            reconnect_delay_ms: 5000,
            subscriptions: Vec::new(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events delivered to the consumer of the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket is up and subscriptions were sent.
    Connected,
    /// Socket dropped; a reconnect is pending unless shutting down.
    Disconnected,
    Message(Inbound),
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    event_tx: mpsc::Sender<TransportEvent>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Outbound frame sender (for WsWriteHandle).
    outbound_tx: mpsc::Sender<String>,
    /// Outbound frame receiver (consumed by message loop).
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<String>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(config: ConnectionConfig, event_tx: mpsc::Sender<TransportEvent>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            event_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for sending messages.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(self.outbound_tx.clone(), self.state.clone())
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Number of consecutive failed connection attempts.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    ///
    /// Both the message loop and the reconnect delay observe the token.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect to WebSocket and run message loop until shutdown.
    pub async fn connect(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let was_connected = match self.try_connect().await {
                Ok(connected) => {
                    info!("WebSocket connection closed");
                    connected
                }
                Err((connected, e)) => {
                    error!(?e, "WebSocket connection error");
                    connected
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                if was_connected {
                    self.emit(TransportEvent::Disconnected).await;
                }
                return Ok(());
            }

            *self.state.write() = ConnectionState::Reconnecting;
            if was_connected {
                attempt = 0;
                self.emit(TransportEvent::Disconnected).await;
            }

            attempt += 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during reconnect delay, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    /// One connection lifetime. Returns whether the socket ever came up.
    async fn try_connect(&self) -> Result<bool, (bool, WsError)> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None)
                .await
                .map_err(|e| (false, WsError::from(e)))?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        info!("WebSocket connected");

        self.restore_subscriptions(&mut write)
            .await
            .map_err(|e| (true, e))?;
        self.emit(TransportEvent::Connected).await;

        self.message_loop(&mut write, &mut read)
            .await
            .map(|()| true)
            .map_err(|e| (true, e))
    }

    async fn message_loop(
        &self,
        write: &mut WsSink,
        read: &mut futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    ) -> WsResult<()> {
        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text)).await?;
                    }
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str) {
        match Inbound::parse(text) {
            Ok(Inbound::Other(op)) => {
                debug!(%op, "Ignoring unhandled op");
            }
            Ok(inbound) => self.emit(TransportEvent::Message(inbound)).await,
            Err(e) => warn!(error = %e, "Failed to decode exchange frame"),
        }
    }

    async fn restore_subscriptions(&self, write: &mut WsSink) -> WsResult<()> {
        info!(
            count = self.config.subscriptions.len(),
            "Restoring subscriptions"
        );

        for target in &self.config.subscriptions {
            let msg = ExchangeMessage::subscribe_market(target.chain_id, &target.market_id);
            write.send(Message::Text(msg.to_json()?)).await?;
            debug!(market = %target.market_id, "Subscribed");
        }
        Ok(())
    }

    async fn emit(&self, event: TransportEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("Transport event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.reconnect_delay_ms, 5000);
        assert_eq!(config.max_reconnect_attempts, 0);
        assert!(config.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_connect() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = ConnectionManager::new(
            ConnectionConfig {
                url: "ws://127.0.0.1:1".to_string(),
                ..Default::default()
            },
            tx,
        );
        manager.shutdown();
        assert!(manager.connect().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (tx, mut rx) = mpsc::channel(10);
        let manager = ConnectionManager::new(
            ConnectionConfig {
                url: "ws://127.0.0.1:1".to_string(),
                max_reconnect_attempts: 1,
                reconnect_delay_ms: 10,
                ..Default::default()
            },
            tx,
        );
        assert!(matches!(
            manager.connect().await,
            Err(WsError::ConnectionFailed(_))
        ));
        // Never connected, so no transitions were reported.
        assert!(rx.try_recv().is_err());
    }
}
