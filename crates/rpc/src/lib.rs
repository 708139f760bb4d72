//! Substrate compatible JSON-RPC subscriptions over websocket.
//!
//! A client subscribes to chain events with `*_subscribe*` methods and receives a stream of
//! notifications per subscription until it unsubscribes or disconnects. All other calls are
//! forwarded to a [RpcDispatcher](dispatch::RpcDispatcher).
pub mod context;
pub mod dispatch;
mod error;
pub mod jsonrpc;
mod middleware;
pub mod source;
pub mod subscription;
#[cfg(test)]
mod test_utils;
pub mod types;
pub mod websocket;

use std::net::SocketAddr;

use anyhow::Context;
use context::RpcContext;
pub use error::{SetupError, StopError};
use tokio::task::JoinHandle;
use tower_http::ServiceBuilderExt;

use crate::websocket::websocket_handler;

const DEFAULT_MAX_CONNECTIONS: usize = 1024;

pub struct RpcServer {
    addr: SocketAddr,
    context: RpcContext,
    max_connections: usize,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, context: RpcContext) -> Self {
        Self {
            addr,
            context,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Starts the websocket server.
    pub async fn spawn(
        self,
    ) -> Result<(JoinHandle<anyhow::Result<()>>, SocketAddr), anyhow::Error> {
        use axum::routing::get;

        let listener = match tokio::net::TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                return Err(e).context(format!(
                    "RPC address {} is already in use.

            Hint: This usually means you are already running another instance of wayfarer.
            Hint: If you are looking to run two instances of wayfarer, you must configure them \
                     with different rpc addresses.",
                    self.addr
                ))
            }
        };
        let addr = listener
            .local_addr()
            .context("Getting local address from listener")?;

        let middleware = tower::ServiceBuilder::new()
            // make sure to set request ids before the request reaches `TraceLayer`
            .set_x_request_id(middleware::request_id::RequestIdSource::default())
            .concurrency_limit(self.max_connections)
            .layer(middleware::tracing::trace_layer())
            .propagate_x_request_id();

        let router = axum::Router::new()
            .route("/", get(websocket_handler))
            .with_state(self.context)
            .layer(middleware);

        let server_handle = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(Into::into)
        });

        Ok((server_handle, addr))
    }
}
