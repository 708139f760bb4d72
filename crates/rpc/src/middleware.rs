//! HTTP layers wrapped around the websocket upgrade route.

pub(crate) mod request_id;
pub(crate) mod tracing;
