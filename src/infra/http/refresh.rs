use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cairn_api_types::{BulkRefreshRequest, BulkRefreshResponse, DispatchRequest};
use subtle::ConstantTimeEq;

use crate::{
    application::error::{AppError, HttpError},
    messaging::{Credentials, RequestScope},
};

use super::HttpState;

const SOURCE: &str = "infra::http::refresh";

/// Reject refresh calls that do not carry the farm's basic-auth credentials.
///
/// Open when no credentials are configured.
pub async fn require_peer_credentials(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected) = state.credentials.as_ref()
        && !presents_credentials(request.headers().get(AUTHORIZATION), expected)
    {
        let mut response = HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "missing or invalid peer credentials",
        )
        .into_response();
        response.headers_mut().insert(
            axum::http::header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"cairn\""),
        );
        return response;
    }

    next.run(request).await
}

fn presents_credentials(header: Option<&HeaderValue>, expected: &Credentials) -> bool {
    let Some(encoded) = header
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
    else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Some((username, password)) = std::str::from_utf8(&decoded)
        .ok()
        .and_then(|pair| pair.split_once(':'))
    else {
        return false;
    };

    let username_ok = username.as_bytes().ct_eq(expected.username.as_bytes());
    let password_ok = password.as_bytes().ct_eq(expected.password.as_bytes());
    bool::from(username_ok & password_ok)
}

/// Apply a batch sent by a peer.
pub async fn bulk_refresh(
    State(state): State<HttpState>,
    Json(request): Json<BulkRefreshRequest>,
) -> Json<BulkRefreshResponse> {
    Json(state.receiver.process(&request))
}

/// Apply an untyped refresh here and queue it for the farm.
pub async fn dispatch(
    State(state): State<HttpState>,
    scope: Option<Extension<Arc<RequestScope>>>,
    Json(request): Json<DispatchRequest>,
) -> Result<StatusCode, AppError> {
    let scope = scope.as_ref().map(|Extension(scope)| scope.as_ref());
    state.messenger.dispatch_untyped(scope, request).await?;
    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "farm".to_string(),
            password: "s3cret".to_string(),
        }
    }

    fn basic(pair: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(pair))).expect("header")
    }

    #[test]
    fn accepts_matching_basic_auth() {
        assert!(presents_credentials(Some(&basic("farm:s3cret")), &credentials()));
    }

    #[test]
    fn rejects_wrong_or_malformed_credentials() {
        let expected = credentials();
        assert!(!presents_credentials(None, &expected));
        assert!(!presents_credentials(Some(&basic("farm:wrong")), &expected));
        assert!(!presents_credentials(Some(&basic("farm")), &expected));
        assert!(!presents_credentials(
            Some(&HeaderValue::from_static("Bearer token")),
            &expected
        ));
        assert!(!presents_credentials(
            Some(&HeaderValue::from_static("Basic !!!")),
            &expected
        ));
    }
}
