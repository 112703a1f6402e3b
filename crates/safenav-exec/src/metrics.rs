//! Metrics/tracing hooks.
//!
//! Compiled to a no-op unless the `tracing` feature is on.

#[cfg(feature = "tracing")]
pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "safenav", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "metric");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn emit_span(_event: &str, _key_values: &[(&str, String)]) { /* no-op */
}
