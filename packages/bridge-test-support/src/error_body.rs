//! Assertions for the bridge's error-body contract
//!
//! Every failed request answers with `{error, code, trace_id}`, an
//! `x-trace-id` header equal to the body's `trace_id`, and
//! `WWW-Authenticate: Bearer` on 401. No failure ever carries a token.

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use actix_web::http::StatusCode;
use serde::Deserialize;

/// Local mirror of the bridge's error body.
#[derive(Debug, Deserialize)]
pub struct ErrorBodyLike {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

/// Assert a response is a contract-conforming error and return its body.
pub async fn assert_error_response<B>(
    resp: ServiceResponse<B>,
    expected_status: StatusCode,
    expected_code: &str,
) -> ErrorBodyLike
where
    B: MessageBody,
{
    assert_eq!(resp.status(), expected_status);

    let headers = resp.headers().clone();
    let body = actix_web::test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).expect("error body is UTF-8");

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with("application/json"),
        "error responses are JSON (got {content_type})"
    );

    let parsed: ErrorBodyLike =
        serde_json::from_str(&text).expect("error body matches {error, code, trace_id}");
    assert_eq!(parsed.code, expected_code);
    assert!(!parsed.error.is_empty(), "error message must not be empty");

    let trace_header = headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .expect("x-trace-id header present");
    assert_eq!(parsed.trace_id, trace_header, "body trace_id matches header");

    if expected_status == StatusCode::UNAUTHORIZED {
        let challenge = headers
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .expect("401 carries WWW-Authenticate");
        assert_eq!(challenge, "Bearer");
    } else {
        assert!(headers.get(WWW_AUTHENTICATE).is_none());
    }

    assert!(
        !text.contains("bridgedToken"),
        "error responses never carry a bridged token"
    );

    parsed
}
