/// Prometheus counters for the analytics capture pipeline.
///
/// Capture always answers 204, so these counters are the only way to see
/// drops: rejected events, rate-limited sessions, and write failures all
/// land here instead of in the response.
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

pub static CAPTURE_ACCEPTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tellyads_capture_accepted_total",
        "Analytics events accepted and persisted"
    )
    .expect("metric registration")
});

pub static CAPTURE_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tellyads_capture_rejected_total",
        "Analytics events rejected by validation"
    )
    .expect("metric registration")
});

pub static CAPTURE_RATE_LIMITED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tellyads_capture_rate_limited_total",
        "Analytics events dropped by rate limiting"
    )
    .expect("metric registration")
});

pub static CAPTURE_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tellyads_capture_failed_total",
        "Analytics events lost to internal failures"
    )
    .expect("metric registration")
});

/// Render all registered metrics in the Prometheus text format.
pub fn render() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buf) {
        tracing::warn!("metrics encoding failed: {}", err);
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
