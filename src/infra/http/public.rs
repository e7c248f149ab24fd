use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri, header::HOST},
    response::{IntoResponse, Response},
};

use crate::{application::error::HttpError, routing::RequestKind};

use super::HttpState;

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn content_by_id(State(state): State<HttpState>, Path(id): Path<i32>) -> Response {
    match state.documents.by_id(id) {
        Some(node) => Json(node).into_response(),
        None => not_found("infra::http::public::content_by_id", format!("no node {id}")),
    }
}

/// Serve whatever the router did not claim as a published document.
pub async fn document(
    State(state): State<HttpState>,
    kind: Option<Extension<RequestKind>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    const SOURCE: &str = "infra::http::public::document";

    let kind = kind.map(|Extension(kind)| kind).unwrap_or(RequestKind::Document);
    if kind != RequestKind::Document {
        return not_found(SOURCE, format!("{kind:?} request is not served as content"));
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default();

    match state.documents.resolve(host, uri.path()) {
        Ok(Some(node)) => Json(node).into_response(),
        Ok(None) => not_found(SOURCE, format!("no published document at {}", uri.path())),
        Err(err) => err.into_response(),
    }
}

fn not_found(source: &'static str, detail: String) -> Response {
    HttpError::new(source, StatusCode::NOT_FOUND, "Page not found", detail).into_response()
}
