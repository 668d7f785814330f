//! Per-request trace id, carried in task-local storage.
//!
//! `RequestTrace` opens the scope; error rendering reads it so every error
//! body and `x-trace-id` header agree without threading the id by hand.

use std::future::Future;

use tokio::task_local;

const UNKNOWN: &str = "unknown";

task_local! {
    static TRACE_ID: String;
}

/// Trace id of the request being served, or `"unknown"` outside one.
pub fn trace_id() -> String {
    TRACE_ID
        .try_with(Clone::clone)
        .unwrap_or_else(|_| UNKNOWN.to_string())
}

/// Drive `future` with `trace_id` visible to [`trace_id`].
pub async fn with_trace_id<F, R>(trace_id: String, future: F) -> R
where
    F: Future<Output = R>,
{
    TRACE_ID.scope(trace_id, future).await
}
