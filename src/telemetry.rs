//! Tracing subscriber installation and metric descriptions.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use thiserror::Error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

static METRIC_DESCRIPTIONS: Once = Once::new();

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), TelemetryError> {
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
        .map_err(|err| TelemetryError::Subscriber(err.to_string()))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "ombra_cache_hit_total",
            Unit::Count,
            "Total number of artifact cache hits."
        );
        describe_counter!(
            "ombra_cache_miss_total",
            Unit::Count,
            "Total number of artifact cache misses."
        );
        describe_counter!(
            "ombra_cache_store_failed_total",
            Unit::Count,
            "Total number of swallowed artifact cache store failures."
        );
        describe_counter!(
            "ombra_cache_corrupt_evicted_total",
            Unit::Count,
            "Total number of corrupt cache records deleted during lookup."
        );
        describe_counter!(
            "ombra_cache_invalidate_total",
            Unit::Count,
            "Total number of asset subtree invalidations."
        );
    });
}
