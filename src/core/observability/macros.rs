/// Creates a root span for an inbound request, sampled at `sample_percent`.
/// Building spans for every ad request is wasted work when almost none
/// of them are exported, so the sampling decision happens before the
/// span exists.
///
/// - If a parent span is active a child span is always created
/// - Otherwise a span is created for `sample_percent` (0.0 to 1.0) of calls
///   and `Span::none()` for the rest
///
/// # Example
/// ```ignore
/// let span = sample_or_attach_root_span!(0.01, "ads_random");
/// handler().instrument(span).await;
/// ```
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = ::tracing::Span::current();

        if !current.is_disabled() || ::rand::random::<f32>() < $sample_percent {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($sample_percent:expr, $span_name:literal, $($fields:tt)*) => {{
        let current = ::tracing::Span::current();

        if !current.is_disabled() || ::rand::random::<f32>() < $sample_percent {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// Creates an INFO child span only when the parent span was sampled.
/// Returns an un-entered span, use `.entered()` or `.instrument()`
///
/// ```ignore
/// let span = child_span_info!("ad_fetch", forced = true, fetched = tracing::field::Empty);
/// span.record("fetched", 5);
/// ```
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
