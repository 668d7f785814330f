use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,identity_bridge=info,actix_web=info,reqwest=warn,moka=warn";

/// JSON logs on stdout. Each line carries the enclosing `request` span, so
/// `trace_id` from `TraceSpan` reaches every event of a request.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(false)
        .with_ansi(false)
        .with_current_span(true)
        .with_span_list(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
