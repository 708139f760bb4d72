use axum::extract::ws::Message;
use serde::Serialize;
use serde_json::value::RawValue;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::jsonrpc::{RpcNotification, RpcResponse};
use crate::subscription::SubscriptionId;

/// The receiving end of the connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("websocket connection closed")]
pub struct ConnectionClosed;

/// The single path through which frames reach a connection's socket.
///
/// Every frame is serialized up front and queued as one complete text message for the writer
/// task, so frames from concurrent listeners never interleave.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Message>,
}

impl FrameSender {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    pub async fn send<T: Serialize + ?Sized>(&self, frame: &T) -> Result<(), ConnectionClosed> {
        let Some(message) = encode(frame) else {
            return Ok(());
        };
        self.tx.send(message).await.map_err(|_| ConnectionClosed)
    }

    /// Queues a frame without waiting for buffer space. The frame is dropped if the buffer is
    /// full.
    pub fn try_send<T: Serialize + ?Sized>(&self, frame: &T) -> Result<(), ConnectionClosed> {
        let Some(message) = encode(frame) else {
            return Ok(());
        };
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Websocket buffer full, dropping frame");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ConnectionClosed),
        }
    }

    pub async fn respond(&self, response: &RpcResponse) -> Result<(), ConnectionClosed> {
        self.send(response).await
    }

    pub async fn notify<T: Serialize>(
        &self,
        method: &'static str,
        subscription: SubscriptionId,
        result: &T,
    ) -> Result<(), ConnectionClosed> {
        self.send(&RpcNotification::new(method, subscription, result))
            .await
    }

    pub fn try_notify<T: Serialize>(
        &self,
        method: &'static str,
        subscription: SubscriptionId,
        result: &T,
    ) -> Result<(), ConnectionClosed> {
        self.try_send(&RpcNotification::new(method, subscription, result))
    }

    /// Writes an already encoded JSON value as is.
    pub async fn send_raw(&self, frame: &RawValue) -> Result<(), ConnectionClosed> {
        self.send(frame).await
    }
}

fn encode<T: Serialize + ?Sized>(frame: &T) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(mut text) => {
            text.push('\n');
            Some(Message::Text(text))
        }
        Err(e) => {
            tracing::warn!(error=%e, "Encoding websocket frame failed");
            None
        }
    }
}
