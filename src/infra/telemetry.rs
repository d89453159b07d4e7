use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_COALESCED, METRIC_EVICT, METRIC_HIT, METRIC_INVALIDATE, METRIC_LOAD_FAILURE,
    METRIC_LOAD_MS, METRIC_MISS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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

/// Register descriptions for the cache metrics. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT,
            Unit::Count,
            "Total number of document cache hits."
        );
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Total number of document cache misses that started a load."
        );
        describe_counter!(
            METRIC_COALESCED,
            Unit::Count,
            "Total number of lookups that joined a load already in flight."
        );
        describe_counter!(
            METRIC_EVICT,
            Unit::Count,
            "Total number of document cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_INVALIDATE,
            Unit::Count,
            "Total number of document cache invalidations."
        );
        describe_counter!(
            METRIC_LOAD_FAILURE,
            Unit::Count,
            "Total number of document loads that failed or timed out."
        );
        describe_histogram!(
            METRIC_LOAD_MS,
            Unit::Milliseconds,
            "Document load latency in milliseconds."
        );
    });
}
