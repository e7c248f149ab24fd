use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::trace;

use super::filter::RoutableDocumentFilter;

/// Tag each request, and its response, with its [`RequestKind`](super::RequestKind).
pub async fn classify_requests(
    State(filter): State<Arc<RoutableDocumentFilter>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let kind = filter.classify(request.uri().path());
    trace!(path = %request.uri().path(), kind = ?kind, "Classified request");
    request.extensions_mut().insert(kind);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(kind);
    response
}
