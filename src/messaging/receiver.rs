//! Applies bulk-refresh batches received from peers.

use std::collections::HashSet;
use std::sync::Arc;

use cairn_api_types::{BulkRefreshRequest, BulkRefreshResponse, RefreshInstruction};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use super::identity::LocalIdentity;
use super::refresher::{RefresherRegistry, apply_instruction};

const METRIC_RECEIVED: &str = "cairn_refresh_received_total";
const METRIC_SKIPPED: &str = "cairn_refresh_skipped_total";

pub struct RefreshReceiver {
    refreshers: Arc<RefresherRegistry>,
    identity: LocalIdentity,
}

impl RefreshReceiver {
    pub fn new(refreshers: Arc<RefresherRegistry>, identity: LocalIdentity) -> Self {
        Self {
            refreshers,
            identity,
        }
    }

    /// Apply every distinct instruction once.
    ///
    /// A batch sent by this very process was already applied locally and is
    /// skipped. A bad instruction is counted and the rest still run.
    #[instrument(skip_all, fields(instructions = request.instructions.len()))]
    pub fn process(&self, request: &BulkRefreshRequest) -> BulkRefreshResponse {
        counter!(METRIC_RECEIVED).increment(request.instructions.len() as u64);

        if self.identity.is_local(request.origin_identity.as_deref()) {
            counter!(METRIC_SKIPPED).increment(1);
            debug!("Skipping bulk refresh sent by this process");
            return BulkRefreshResponse {
                skipped_as_local: true,
                ..BulkRefreshResponse::default()
            };
        }

        let mut processed: HashSet<&RefreshInstruction> = HashSet::new();
        let mut response = BulkRefreshResponse::default();
        for instruction in &request.instructions {
            if !processed.insert(instruction) {
                response.duplicates += 1;
                continue;
            }
            let outcome = self
                .refreshers
                .get(instruction.refresher_id)
                .and_then(|refresher| apply_instruction(refresher.as_ref(), instruction));
            match outcome {
                Ok(()) => response.applied += 1,
                Err(err) => {
                    response.failed += 1;
                    warn!(
                        refresher_id = %instruction.refresher_id,
                        method = ?instruction.method,
                        error = %err,
                        "Failed to apply refresh instruction"
                    );
                }
            }
        }

        info!(
            applied = response.applied,
            duplicates = response.duplicates,
            failed = response.failed,
            "Applied bulk refresh"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::messaging::refresher::recording::RecordingRefresher;

    const REFRESHER: Uuid = Uuid::from_u128(0xbeef);

    fn receiver(identity: LocalIdentity) -> (RefreshReceiver, Arc<RecordingRefresher>) {
        let refresher = Arc::new(RecordingRefresher::new(REFRESHER));
        let registry = RefresherRegistry::new().with(refresher.clone());
        (RefreshReceiver::new(Arc::new(registry), identity), refresher)
    }

    #[test]
    fn applies_each_distinct_instruction_once() {
        let (receiver, refresher) = receiver(LocalIdentity::anonymous());
        let request = BulkRefreshRequest {
            instructions: vec![
                RefreshInstruction::refresh_by_int(REFRESHER, 4),
                RefreshInstruction::refresh_by_int(REFRESHER, 4),
                RefreshInstruction::remove_by_id(REFRESHER, 5),
            ],
            origin_identity: Some("peer".to_string()),
        };

        let response = receiver.process(&request);
        assert_eq!(response.applied, 2);
        assert_eq!(response.duplicates, 1);
        assert_eq!(refresher.calls(), vec!["int:4", "remove:5"]);
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let (receiver, refresher) = receiver(LocalIdentity::anonymous());
        let request = BulkRefreshRequest {
            instructions: vec![
                RefreshInstruction::refresh_all(Uuid::from_u128(1)),
                RefreshInstruction::refresh_by_json(REFRESHER, "{}".to_string()),
                RefreshInstruction::refresh_all(REFRESHER),
            ],
            origin_identity: None,
        };

        let response = receiver.process(&request);
        assert_eq!(response.failed, 2);
        assert_eq!(response.applied, 1);
        assert_eq!(refresher.calls(), vec!["all"]);
    }

    #[test]
    fn own_batches_are_skipped() {
        let identity = LocalIdentity::from_parts(Some("web-1".into()), "cairn", Uuid::nil());
        let origin = identity.hash().map(str::to_string);
        let (receiver, refresher) = receiver(identity);

        let response = receiver.process(&BulkRefreshRequest {
            instructions: vec![RefreshInstruction::refresh_all(REFRESHER)],
            origin_identity: origin,
        });
        assert!(response.skipped_as_local);
        assert!(refresher.calls().is_empty());
    }
}
