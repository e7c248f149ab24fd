//! Per-request refresh scope.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument};

use super::messenger::BatchedServerMessenger;
use super::scope::RequestScope;

/// Give each request a [`RequestScope`] and flush it once the handler is done.
///
/// The response waits for the flush; a flush never fails it.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn batch_refresh_requests(
    State(messenger): State<Arc<BatchedServerMessenger>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let scope = Arc::new(RequestScope::new());
    request.extensions_mut().insert(Arc::clone(&scope));

    let response = next.run(request).await;

    if let Some(summary) = messenger.on_request_end(&scope).await {
        debug!(
            servers = summary.servers,
            failures = summary.failures,
            "Request refresh batch flushed"
        );
    }
    response
}
