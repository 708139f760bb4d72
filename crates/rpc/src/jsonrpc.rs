//! JSON-RPC 2.0 envelopes used on the websocket, including the subscription extension.
//!
//! Requests are parsed leniently: the `jsonrpc` member may be omitted, and a missing `id` is
//! treated as `null`. Replies always carry `"jsonrpc":"2.0"`.

mod error;
mod request;
mod response;

pub use error::RpcError;
pub use request::{InvalidRequest, RequestError, RequestId, RpcRequest};
pub use response::{RpcNotification, RpcResponse, SubscriptionResult};
