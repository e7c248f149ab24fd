mod middleware;
mod public;
mod refresh;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use cairn_api_types::{BULK_REFRESH_PATH, DISPATCH_PATH};

use crate::{
    application::content::DocumentService,
    messaging::{BatchedServerMessenger, Credentials, RefreshReceiver, batch_refresh_requests},
    routing::{ReservedPathRegistry, RoutableDocumentFilter, classify_requests},
};

pub use middleware::RequestContext;

const HEALTH_PATH: &str = "/_cairn/health";
const CONTENT_BY_ID_PATH: &str = "/_cairn/content/{id}";

#[derive(Clone)]
pub struct HttpState {
    pub documents: Arc<DocumentService>,
    pub messenger: Arc<BatchedServerMessenger>,
    pub receiver: Arc<RefreshReceiver>,
    pub filter: Arc<RoutableDocumentFilter>,
    /// Runtime reserved prefixes, shared with `filter`.
    pub reserved_paths: Arc<ReservedPathRegistry>,
    /// Required on refresh endpoints when set.
    pub credentials: Option<Credentials>,
}

/// Route patterns served by [`build_router`], for the route table.
pub fn app_routes() -> Vec<String> {
    vec![
        format!("/{BULK_REFRESH_PATH}"),
        format!("/{DISPATCH_PATH}"),
        HEALTH_PATH.to_string(),
        CONTENT_BY_ID_PATH.to_string(),
    ]
}

pub fn build_router(state: HttpState) -> Router {
    let refresh_routes = Router::new()
        .route(&format!("/{BULK_REFRESH_PATH}"), post(refresh::bulk_refresh))
        .route(&format!("/{DISPATCH_PATH}"), post(refresh::dispatch))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            refresh::require_peer_credentials,
        ));

    let content_routes = Router::new()
        .route(HEALTH_PATH, get(public::health))
        .route(CONTENT_BY_ID_PATH, get(public::content_by_id))
        .fallback(public::document);

    content_routes
        .merge(refresh_routes)
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state.messenger.clone(),
            batch_refresh_requests,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.filter.clone(),
            classify_requests,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
