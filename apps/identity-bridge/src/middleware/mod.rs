pub mod cors;
pub mod identity_bridge;
pub mod request_trace;
pub mod security_headers;
pub mod structured_logger;
pub mod trace_span;

pub use cors::cors_middleware;
pub use identity_bridge::IdentityBridge;
pub use request_trace::{RequestTrace, TraceId};
pub use security_headers::SecurityHeaders;
pub use structured_logger::StructuredLogger;
pub use trace_span::TraceSpan;
