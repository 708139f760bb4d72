//! Websocket transport of the subscription engine.
//!
//! Each accepted socket is split into a reader, whose frames drive a [Connection], and a single
//! writer task fed through a bounded channel. Everything written to the client, whether replies
//! or notifications from any listener, passes through that channel as complete frames.
//!
//! Connections are only accepted from loopback peers unless
//! [external](crate::context::WebsocketConfig::external) is enabled.

use std::net::SocketAddr;
use std::num::NonZeroUsize;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::context::RpcContext;

pub mod connection;
pub mod sender;

pub use connection::Connection;
pub use sender::{ConnectionClosed, FrameSender};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(context): State<RpcContext>,
) -> Response {
    if !context.config.external && !peer.ip().is_loopback() {
        tracing::debug!(%peer, "Rejecting websocket connection from external peer");
        return http::StatusCode::FORBIDDEN.into_response();
    }

    // Keeps the request span, and so the request id, on everything the connection logs.
    let span = tracing::Span::current();
    ws.max_message_size(context.config.max_message_size)
        .on_failed_upgrade(|error| tracing::debug!(%error, "Websocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, context, peer).instrument(span))
}

async fn handle_socket(socket: WebSocket, context: RpcContext, peer: SocketAddr) {
    tracing::debug!(%peer, "Websocket connection opened");

    let (ws_tx, ws_rx) = split_ws(socket, context.config.socket_buffer_capacity);
    let connection = Connection::new(context, FrameSender::new(ws_tx));
    connection.run(ws_rx).await;
    connection.close().await;

    tracing::debug!(%peer, "Websocket connection closed");
}

/// Splits a websocket into an MPSC sender and receiver.
///
/// The sender feeds the only task which writes to the socket. This separation also allows
/// driving a [Connection] without a real socket.
pub fn split_ws(
    ws: WebSocket,
    capacity: NonZeroUsize,
) -> (
    mpsc::Sender<Message>,
    mpsc::Receiver<Result<Message, axum::Error>>,
) {
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let (sender_tx, mut sender_rx) = mpsc::channel::<Message>(capacity.get());
    tokio::spawn(async move {
        while let Some(message) = sender_rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!(error=%e, "Sending websocket message failed");
                break;
            }
        }
    });

    let (receiver_tx, receiver_rx) = mpsc::channel::<Result<Message, axum::Error>>(capacity.get());
    tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            if receiver_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    (sender_tx, receiver_rx)
}
