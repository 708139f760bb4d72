use std::net::SocketAddr;
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use wayfarer_rpc::context::WebsocketConfig;

#[derive(Parser)]
#[command(name = "Wayfarer")]
#[command(author = "Wayfarer Developers")]
#[command(version)]
#[command(
    about = "A websocket JSON-RPC subscription server for Substrate compatible chains."
)]
struct Cli {
    #[arg(
        long = "rpc.address",
        long_help = "Websocket JSON-RPC listening address",
        value_name = "IP:PORT",
        default_value = "127.0.0.1:8546",
        env = "WAYFARER_RPC_ADDRESS"
    )]
    rpc_address: SocketAddr,

    #[arg(
        long = "rpc.http-url",
        long_help = r"HTTP endpoint of the JSON-RPC server which handles every call other than subscriptions.

Without it such calls are answered with a 'Method not found' error.",
        value_name = "HTTP(s) URL",
        value_hint = clap::ValueHint::Url,
        env = "WAYFARER_RPC_HTTP_URL"
    )]
    rpc_http_url: Option<Url>,

    #[arg(
        long = "rpc.websocket.external",
        long_help = "Accept websocket connections from non-loopback addresses",
        action = clap::ArgAction::Set,
        default_value = "false",
        env = "WAYFARER_RPC_WEBSOCKET_EXTERNAL"
    )]
    websocket_external: bool,

    #[arg(
        long = "rpc.websocket.buffer-capacity",
        long_help = "The number of outgoing messages queued per websocket connection",
        default_value = "100",
        env = "WAYFARER_RPC_WEBSOCKET_BUFFER_CAPACITY"
    )]
    websocket_buffer_capacity: NonZeroUsize,

    #[arg(
        long = "rpc.websocket.max-message-size",
        long_help = "The maximum size of an incoming websocket message in bytes",
        default_value = "10485760",
        env = "WAYFARER_RPC_WEBSOCKET_MAX_MESSAGE_SIZE"
    )]
    websocket_max_message_size: NonZeroUsize,

    #[arg(
        long = "rpc.subscription.cancel-timeout",
        long_help = "Seconds to wait for a subscription to stop before it is aborted",
        value_name = "SECONDS",
        default_value = "5",
        env = "WAYFARER_RPC_SUBSCRIPTION_CANCEL_TIMEOUT"
    )]
    cancel_timeout: NonZeroU64,

    #[arg(
        long = "rpc.max-connections",
        long_help = "Set the maximum number of connections allowed",
        default_value = "1024",
        env = "WAYFARER_RPC_MAX_CONNECTIONS"
    )]
    max_connections: NonZeroUsize,

    #[arg(
        long = "dev.block-time",
        long_help = r"Produce development blocks at this interval, in seconds.

Blocks include the submitted extrinsics and the previous block is finalised with each new one.",
        value_name = "SECONDS",
        env = "WAYFARER_DEV_BLOCK_TIME"
    )]
    dev_block_time: Option<NonZeroU64>,

    #[arg(
        long = "log-output-json",
        long_help = "Log in JSON format",
        action = clap::ArgAction::Set,
        default_value = "false",
        env = "WAYFARER_LOG_OUTPUT_JSON"
    )]
    log_output_json: bool,
}

pub struct Config {
    pub rpc_address: SocketAddr,
    pub http_url: Option<Url>,
    pub websocket: WebsocketConfig,
    pub max_connections: NonZeroUsize,
    pub dev_block_time: Option<Duration>,
    pub log_output_json: bool,
}

impl Config {
    pub fn parse() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        Config {
            rpc_address: cli.rpc_address,
            http_url: cli.rpc_http_url,
            websocket: WebsocketConfig {
                cancel_timeout: Duration::from_secs(cli.cancel_timeout.get()),
                socket_buffer_capacity: cli.websocket_buffer_capacity,
                max_message_size: cli.websocket_max_message_size.get(),
                external: cli.websocket_external,
            },
            max_connections: cli.max_connections,
            dev_block_time: cli.dev_block_time.map(|x| Duration::from_secs(x.get())),
            log_output_json: cli.log_output_json,
        }
    }
}
