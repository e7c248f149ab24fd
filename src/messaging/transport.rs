//! Outbound bulk-refresh calls.

use std::time::Duration;

use async_trait::async_trait;
use cairn_api_types::{BulkRefreshRequest, BulkRefreshResponse};
use reqwest::Client;
use tracing::debug;

use crate::domain::server::ServerAddress;

use super::config::Credentials;
use super::error::TransportError;

/// Delivers one bulk-refresh request to one peer.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn send(
        &self,
        server: &ServerAddress,
        request: &BulkRefreshRequest,
    ) -> Result<BulkRefreshResponse, TransportError>;
}

/// JSON over HTTP with basic auth.
pub struct HttpRefreshTransport {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpRefreshTransport {
    pub fn new(
        call_timeout: Duration,
        credentials: Option<Credentials>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(call_timeout)
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn send(
        &self,
        server: &ServerAddress,
        request: &BulkRefreshRequest,
    ) -> Result<BulkRefreshResponse, TransportError> {
        let endpoint = server.bulk_refresh_endpoint()?;
        debug!(
            server = %server,
            instructions = request.instructions.len(),
            "Sending bulk refresh"
        );

        let mut call = self.client.post(endpoint).json(request);
        if let Some(credentials) = &self.credentials {
            call = call.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response.json::<BulkRefreshResponse>().await?)
    }
}
