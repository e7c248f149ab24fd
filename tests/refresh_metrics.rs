use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cairn::{
    content::{ContentTree, PUBLISHED_CONTENT_REFRESHER_ID, PublishedContentRefresher, PublishedContentStore},
    domain::{content::PublishedNode, refresh::RefreshPayload, server::ServerAddress},
    infra::telemetry,
    messaging::{
        BatchedServerMessenger, LocalIdentity, MessagingConfig, MessagingMode, RefreshReceiver,
        RefreshTransport, RefresherRegistry, RequestScope, TransportError,
    },
    routing::{RouteCheckCache, RouteRegistry},
};
use cairn_api_types::{BulkRefreshRequest, BulkRefreshResponse, RefreshInstruction};
use metrics_util::debugging::DebuggingRecorder;
use time::OffsetDateTime;
use uuid::Uuid;

struct UnavailableTransport;

#[async_trait]
impl RefreshTransport for UnavailableTransport {
    async fn send(
        &self,
        server: &ServerAddress,
        _request: &BulkRefreshRequest,
    ) -> Result<BulkRefreshResponse, TransportError> {
        if server.to_string().contains("web-2") {
            Err(TransportError::Status(503))
        } else {
            Ok(BulkRefreshResponse::default())
        }
    }
}

fn home() -> PublishedNode {
    PublishedNode {
        id: 1,
        parent_id: -1,
        name: "Home".to_string(),
        url_name: "home".to_string(),
        document_type_alias: "page".to_string(),
        path: "-1,1".to_string(),
        level: 1,
        sort_order: 0,
        create_date: OffsetDateTime::UNIX_EPOCH,
        update_date: OffsetDateTime::UNIX_EPOCH,
        url_alias: None,
        properties: BTreeMap::new(),
    }
}

#[tokio::test]
async fn refresh_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let store = Arc::new(PublishedContentStore::new(
        ContentTree::new(vec![home()]).expect("tree"),
        false,
        NonZeroUsize::new(8).expect("non-zero"),
    ));
    assert!(store.get_by_route("/nowhere/deeper", None).expect("lookup").is_none());

    let refreshers = Arc::new(
        RefresherRegistry::new().with(Arc::new(PublishedContentRefresher::new(store.clone(), None))),
    );
    let identity = LocalIdentity::from_parts(Some("web-0".to_string()), "cairn", Uuid::new_v4());
    let config = MessagingConfig {
        distributed_enabled: true,
        mode: MessagingMode::PerRequest,
        servers: vec![
            "http://web-1/".parse().expect("server"),
            "http://web-2/".parse().expect("server"),
        ],
        credentials: None,
        call_timeout: Duration::from_millis(200),
        application_id: "cairn".to_string(),
    };
    let messenger = BatchedServerMessenger::new(
        config,
        refreshers.clone(),
        Arc::new(UnavailableTransport),
        identity.clone(),
    );

    let scope = RequestScope::new();
    messenger
        .apply_local_and_enqueue(Some(&scope), PUBLISHED_CONTENT_REFRESHER_ID, RefreshPayload::All)
        .await
        .expect("refresh");
    let summary = messenger.on_request_end(&scope).await.expect("flushed");
    assert_eq!(summary.servers, 2);
    assert_eq!(summary.failures, 1);

    let receiver = RefreshReceiver::new(refreshers, identity.clone());
    let response = receiver.process(&BulkRefreshRequest {
        instructions: vec![RefreshInstruction::refresh_all(PUBLISHED_CONTENT_REFRESHER_ID)],
        origin_identity: identity.hash().map(str::to_string),
    });
    assert!(response.skipped_as_local);

    let routes = RouteRegistry::new();
    let checks = RouteCheckCache::new();
    assert!(!checks.check(&routes, "/feeds/latest"));
    routes.register("/feeds/{name}").expect("route");
    assert!(checks.check(&routes, "/feeds/latest"));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "cairn_refresh_batches_total",
        "cairn_refresh_instructions_total",
        "cairn_refresh_dispatch_failures_total",
        "cairn_refresh_flush_ms",
        "cairn_refresh_received_total",
        "cairn_refresh_skipped_total",
        "cairn_route_cache_invalidations_total",
        "cairn_content_lookup_miss_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
