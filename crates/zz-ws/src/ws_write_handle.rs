//! WebSocket write handle for sending messages.
//!
//! Sends are fire-and-forget: the handle only confirms the frame was queued
//! for the connection task.

use crate::connection::ConnectionState;
use crate::message::ExchangeMessage;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Socket is not connected; the frame was dropped.
    NotConnected,
    /// Channel closed (connection task gone or shutting down).
    ChannelClosed,
    /// Frame could not be serialized.
    Encode(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::Encode(e) => write!(f, "encode failed: {e}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Write handle for sending frames to the exchange.
///
/// Cloneable and reconnect-safe: frames go through a channel drained by
/// whichever socket is currently live.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<String>,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsWriteHandle {
    pub fn new(tx: mpsc::Sender<String>, state: Arc<RwLock<ConnectionState>>) -> Self {
        Self { tx, state }
    }

    /// Serialize and queue an exchange message.
    pub async fn send(&self, msg: &ExchangeMessage) -> Result<(), SendError> {
        let text = msg.to_json().map_err(|e| SendError::Encode(e.to_string()))?;
        self.send_text(text).await?;
        debug!(op = %msg.op, "frame queued");
        Ok(())
    }

    /// Queue a raw text frame.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected`: socket is not connected
    /// - `SendError::ChannelClosed`: connection task is gone
    pub async fn send_text(&self, text: String) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        self.tx
            .send(text)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// True if the socket is connected and the channel is open.
    pub fn is_connected(&self) -> bool {
        let state = *self.state.read();
        state == ConnectionState::Connected && !self.tx.is_closed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle(state: ConnectionState) -> (WsWriteHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(100);
        let state = Arc::new(RwLock::new(state));
        (WsWriteHandle::new(tx, state), rx)
    }

    #[tokio::test]
    async fn test_send_success() {
        let (handle, mut rx) = create_test_handle(ConnectionState::Connected);

        let msg = ExchangeMessage::subscribe_market(1000, "ETH-USDC");
        assert!(handle.send(&msg).await.is_ok());

        let text = rx.recv().await.unwrap();
        assert_eq!(text, r#"{"op":"subscribemarket","args":[1000,"ETH-USDC"]}"#);
    }

    #[tokio::test]
    async fn test_send_not_connected() {
        let (handle, _rx) = create_test_handle(ConnectionState::Reconnecting);

        let result = handle.send_text("test".to_string()).await;
        assert_eq!(result, Err(SendError::NotConnected));
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_send_channel_closed() {
        let (handle, rx) = create_test_handle(ConnectionState::Connected);
        drop(rx);

        // A closed channel reports as not connected before the send is attempted.
        let result = handle.send_text("test".to_string()).await;
        assert_eq!(result, Err(SendError::NotConnected));
    }

    #[tokio::test]
    async fn test_connection_state_is_shared() {
        let (tx, _rx) = mpsc::channel(10);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let handle = WsWriteHandle::new(tx, state.clone());

        assert!(!handle.is_connected());
        *state.write() = ConnectionState::Connected;
        assert!(handle.is_connected());
        assert_eq!(handle.connection_state(), ConnectionState::Connected);
    }
}
