use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{
    DefaultOnEos,
    DefaultOnFailure,
    DefaultOnRequest,
    DefaultOnResponse,
    MakeSpan,
    TraceLayer,
};
use tracing::Level;

pub(crate) fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, ConnectionSpan>
{
    TraceLayer::new_for_http()
        .make_span_with(ConnectionSpan)
        .on_failure(DefaultOnFailure::default().level(Level::DEBUG))
        .on_request(DefaultOnRequest::default().level(Level::TRACE))
        .on_response(DefaultOnResponse::default().level(Level::TRACE))
        .on_eos(DefaultOnEos::default().level(Level::TRACE))
}

/// Opens a span per upgrade request carrying the peer address and the request id.
#[derive(Copy, Clone)]
pub(crate) struct ConnectionSpan;

impl<B> MakeSpan<B> for ConnectionSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|x| x.to_str().ok());
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(peer)| *peer);

        tracing::debug_span!(
            "connection",
            uri = %request.uri(),
            peer = peer.map(tracing::field::display),
            request_id,
        )
    }
}
