#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use wayfarer_rpc::context::RpcContext;
use wayfarer_rpc::dispatch::{HttpDispatcher, MethodNotFoundDispatcher, RpcDispatcher};
use wayfarer_rpc::source::memory::ChainEvents;

mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    let config = config::Config::parse();

    setup_tracing(config.log_output_json);

    info!(version = env!("CARGO_PKG_VERSION"), "🏁 Starting node.");

    let dispatcher: Arc<dyn RpcDispatcher> = match config.http_url {
        Some(url) => {
            info!(%url, "Forwarding unary calls");
            Arc::new(HttpDispatcher::new(url).context("Creating HTTP dispatcher")?)
        }
        None => Arc::new(MethodNotFoundDispatcher),
    };

    let events = Arc::new(ChainEvents::default());
    let context = RpcContext::new(dispatcher)
        .with_chain_events(events.clone())
        .with_config(config.websocket);

    let (rpc_handle, local_addr) = wayfarer_rpc::RpcServer::new(config.rpc_address, context)
        .with_max_connections(config.max_connections.get())
        .spawn()
        .await
        .context("Starting the RPC server")?;

    info!("📡 Websocket RPC server started on: {}", local_addr);

    let producer_handle = match config.dev_block_time {
        Some(block_time) => {
            info!(?block_time, "Producing development blocks");
            wayfarer_lib::devnet::spawn(events, block_time)
        }
        None => tokio::spawn(std::future::pending()),
    };

    tokio::select! {
        result = rpc_handle => {
            match result {
                Ok(Ok(())) => tracing::error!("RPC server process ended unexpectedly"),
                Ok(Err(err)) => tracing::error!(error=%err, "RPC server process ended unexpectedly"),
                Err(err) => tracing::error!(error=%err, "RPC server process ended unexpectedly; failed to join task handle"),
            }
        }
        result = producer_handle => {
            match result {
                Ok(()) => tracing::error!("Block producer ended unexpectedly"),
                Err(err) => tracing::error!(error=%err, "Block producer ended unexpectedly"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}

fn setup_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
