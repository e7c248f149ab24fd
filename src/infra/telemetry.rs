use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "cairn_refresh_batches_total",
            Unit::Count,
            "Total number of refresh batches flushed to the farm."
        );
        describe_counter!(
            "cairn_refresh_instructions_total",
            Unit::Count,
            "Total number of refresh instructions sent, summed over servers."
        );
        describe_counter!(
            "cairn_refresh_dispatch_failures_total",
            Unit::Count,
            "Total number of failed per-server refresh calls."
        );
        describe_counter!(
            "cairn_refresh_received_total",
            Unit::Count,
            "Total number of refresh instructions received from peers."
        );
        describe_counter!(
            "cairn_refresh_skipped_total",
            Unit::Count,
            "Total number of received batches skipped as sent by this process."
        );
        describe_counter!(
            "cairn_route_cache_invalidations_total",
            Unit::Count,
            "Total number of route-check caches dropped after a route count change."
        );
        describe_counter!(
            "cairn_content_lookup_miss_total",
            Unit::Count,
            "Total number of route lookups that matched no published content."
        );
        describe_histogram!(
            "cairn_refresh_flush_ms",
            Unit::Milliseconds,
            "Refresh batch flush latency in milliseconds."
        );
    });
}
