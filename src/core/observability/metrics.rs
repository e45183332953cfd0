use opentelemetry::metrics::Counter;
use opentelemetry::{KeyValue, global};
use std::sync::LazyLock;

static ADS_SERVED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    global::meter(env!("CARGO_PKG_NAME"))
        .u64_counter("ads_served")
        .with_description("Advertisements handed out to consumers")
        .with_unit("1")
        .build()
});

static AD_FETCHES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    global::meter(env!("CARGO_PKG_NAME"))
        .u64_counter("ad_fetches")
        .with_description("Fetch attempts against the advertisement source")
        .with_unit("1")
        .build()
});

/// Records `count` ads served by the named facade operation
pub fn record_served(operation: &'static str, count: usize) {
    if count == 0 {
        return;
    }

    ADS_SERVED.add(count as u64, &[KeyValue::new("operation", operation)]);
}

/// Records one fetch attempt, `outcome` is "ok" or a fetch error label
pub fn record_fetch(outcome: &str, forced: bool, fallback: bool) {
    AD_FETCHES.add(
        1,
        &[
            KeyValue::new("outcome", outcome.to_string()),
            KeyValue::new("forced", forced),
            KeyValue::new("fallback", fallback),
        ],
    );
}
