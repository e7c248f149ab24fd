//! Batched server-to-server cache refresh.
//!
//! Refresh calls raised while a request is handled are applied to the local
//! process at once and buffered in the request's [`RequestScope`]. When the
//! request ends the buffer is expanded into wire instructions, deduplicated
//! per destination server, and sent to every server concurrently. A failing
//! server is logged and counted; it never fails the others or the request.

use std::sync::Arc;
use std::time::Instant;

use cairn_api_types::{BulkRefreshRequest, DispatchRequest};
use futures::future::join_all;
use metrics::{counter, histogram};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::refresh::{DispatchKind, IdKind, RefreshMessage, RefreshPayload};
use crate::domain::server::ServerAddress;

use super::config::{MessagingConfig, MessagingMode};
use super::error::{MessengerError, TransportError};
use super::identity::LocalIdentity;
use super::instructions::{ServerBatch, plan};
use super::refresher::{RefresherRegistry, apply_payload};
use super::scope::RequestScope;
use super::transport::RefreshTransport;

const METRIC_BATCHES: &str = "cairn_refresh_batches_total";
const METRIC_INSTRUCTIONS: &str = "cairn_refresh_instructions_total";
const METRIC_FAILURES: &str = "cairn_refresh_dispatch_failures_total";
const METRIC_FLUSH_MS: &str = "cairn_refresh_flush_ms";

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Servers a call was issued to.
    pub servers: usize,
    /// Instructions sent, summed over servers.
    pub instructions: usize,
    pub failures: usize,
    /// The batch failed before any server was called.
    pub aborted: bool,
}

pub struct BatchedServerMessenger {
    config: MessagingConfig,
    refreshers: Arc<RefresherRegistry>,
    transport: Arc<dyn RefreshTransport>,
    identity: LocalIdentity,
}

impl BatchedServerMessenger {
    pub fn new(
        config: MessagingConfig,
        refreshers: Arc<RefresherRegistry>,
        transport: Arc<dyn RefreshTransport>,
        identity: LocalIdentity,
    ) -> Self {
        Self {
            config,
            refreshers,
            transport,
            identity,
        }
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    pub fn refreshers(&self) -> &Arc<RefresherRegistry> {
        &self.refreshers
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Buffer a refresh call for `servers` until the request ends.
    pub fn enqueue(
        &self,
        scope: Option<&RequestScope>,
        servers: impl IntoIterator<Item = ServerAddress>,
        refresher_id: Uuid,
        payload: RefreshPayload,
    ) -> Result<(), MessengerError> {
        let scope = scope.ok_or(MessengerError::UnsupportedContext)?;
        let message = RefreshMessage::new(servers, refresher_id, payload);
        debug!(
            refresher_id = %refresher_id,
            kind = ?message.payload.kind(),
            servers = message.servers.len(),
            "Enqueued cache refresh"
        );
        scope.push(message);
        Ok(())
    }

    /// Apply a refresh to this process and queue it for the farm.
    ///
    /// Without distributed calls the refresh stays local. In immediate mode
    /// the farm is called before returning and no scope is needed.
    #[instrument(skip(self, scope, payload), fields(kind = ?payload.kind()))]
    pub async fn apply_local_and_enqueue(
        &self,
        scope: Option<&RequestScope>,
        refresher_id: Uuid,
        payload: RefreshPayload,
    ) -> Result<(), MessengerError> {
        let refresher = self.refreshers.get(refresher_id)?;

        if self.config.requires_distributed_calls() {
            let servers = self.config.servers.iter().cloned();
            match self.config.mode {
                MessagingMode::PerRequest => {
                    self.enqueue(scope, servers, refresher_id, payload.clone())?
                }
                MessagingMode::Immediate => {
                    let message = RefreshMessage::new(servers, refresher_id, payload.clone());
                    self.flush(vec![message]).await;
                }
            }
        }

        apply_payload(refresher.as_ref(), &payload)
    }

    /// Entry point for untyped callers such as the dispatch endpoint.
    pub async fn dispatch_untyped(
        &self,
        scope: Option<&RequestScope>,
        request: DispatchRequest,
    ) -> Result<(), MessengerError> {
        let kind: DispatchKind = request.kind.parse()?;
        let id_kind = request
            .id_type
            .as_deref()
            .map(str::parse::<IdKind>)
            .transpose()?;
        let payload = RefreshPayload::from_untyped(kind, request.ids, id_kind, request.json)?;
        self.apply_local_and_enqueue(scope, request.refresher_id, payload)
            .await
    }

    /// Drain the request's buffer and flush it; `None` when nothing was queued.
    pub async fn on_request_end(&self, scope: &RequestScope) -> Option<FlushSummary> {
        let messages = scope.take();
        if messages.is_empty() {
            return None;
        }
        Some(self.flush(messages).await)
    }

    /// Send `messages` to their servers. Never fails; problems are logged and counted.
    #[instrument(skip_all, fields(messages = messages.len()))]
    pub async fn flush(&self, messages: Vec<RefreshMessage>) -> FlushSummary {
        let started_at = Instant::now();
        let summary = match plan(&messages) {
            Ok(batches) => self.send_batches(batches).await,
            Err(err) => {
                error!(error = %err, "Cache refresh batch could not be dispatched");
                FlushSummary {
                    aborted: true,
                    ..FlushSummary::default()
                }
            }
        };
        histogram!(METRIC_FLUSH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        summary
    }

    async fn send_batches(&self, batches: Vec<ServerBatch>) -> FlushSummary {
        if batches.is_empty() {
            return FlushSummary::default();
        }
        counter!(METRIC_BATCHES).increment(1);

        let origin_identity = self.identity.hash().map(str::to_string);
        let call_timeout = self.config.call_timeout;
        let instructions: usize = batches.iter().map(|batch| batch.instructions.len()).sum();
        counter!(METRIC_INSTRUCTIONS).increment(instructions as u64);

        let calls = batches.into_iter().map(|ServerBatch { server, instructions }| {
            let request = BulkRefreshRequest {
                instructions,
                origin_identity: origin_identity.clone(),
            };
            let transport = Arc::clone(&self.transport);
            async move {
                let result = match timeout(call_timeout, transport.send(&server, &request)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(call_timeout)),
                };
                (server, result)
            }
        });

        let results = join_all(calls).await;
        let servers = results.len();
        let mut failures = 0;
        for (server, result) in results {
            match result {
                Ok(response) => debug!(
                    server = %server,
                    applied = response.applied,
                    failed = response.failed,
                    "Bulk refresh delivered"
                ),
                Err(source) => {
                    failures += 1;
                    let err = MessengerError::Transport { server, source };
                    warn!(error = %err, "Cache refresh dispatch failed");
                }
            }
        }
        if failures > 0 {
            counter!(METRIC_FAILURES).increment(failures as u64);
        }

        info!(servers, instructions, failures, "Flushed cache refresh batch");
        FlushSummary {
            servers,
            instructions,
            failures,
            aborted: false,
        }
    }
}
