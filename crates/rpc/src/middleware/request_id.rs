use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tower_http::request_id::{MakeRequestId, RequestId};

/// Numbers incoming upgrade requests so that everything logged for one connection can be
/// correlated through the `x-request-id` header.
#[derive(Clone, Default)]
pub(crate) struct RequestIdSource {
    counter: Arc<AtomicU64>,
}

impl MakeRequestId for RequestIdSource {
    fn make_request_id<B>(&mut self, _: &http::Request<B>) -> Option<RequestId> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(RequestId::new(http::HeaderValue::from(id)))
    }
}
