//! Response types and helpers for the Admin API.

use crate::rules::{MockRule, RuleRecord, StoreError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::HOST;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::error::Error as StdError;

/// Largest request body the admin API will buffer
pub const MAX_ADMIN_BODY: usize = 1024 * 1024;

/// HATEOAS link
#[derive(Debug, Serialize, Clone)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct MockLinks {
    #[serde(rename = "self")]
    pub self_link: Link,
}

/// A rule with its _links for the response
#[derive(Debug, Serialize)]
pub struct MockResource {
    #[serde(flatten)]
    pub record: RuleRecord,
    #[serde(rename = "_links")]
    pub links: MockLinks,
}

impl MockResource {
    pub fn new(rule: &MockRule, base_url: &str) -> Self {
        Self {
            record: RuleRecord::from(rule),
            links: make_mock_links(base_url, rule.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListMocksResponse {
    pub mocks: Vec<MockResource>,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Base URL for HATEOAS links, taken from the Host header
pub fn get_base_url(headers: &HeaderMap, scheme: &str) -> String {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("{scheme}://{host}"))
        .unwrap_or_else(|| format!("{scheme}://localhost"))
}

pub fn make_mock_links(base_url: &str, id: i64) -> MockLinks {
    MockLinks {
        self_link: Link {
            href: format!("{base_url}/admin/mocks/{id}"),
        },
    }
}

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with headers, degrading to a bare response if the
/// builder rejects them.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    build_response_with_headers(status, std::iter::empty::<(&str, &str)>(), Bytes::new())
}

pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_response(StatusCode::BAD_REQUEST, "bad_request", message)
}

pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "not_found", "Not Found")
}

/// Map a store failure onto its HTTP status and error code
pub fn store_error_response(err: &StoreError) -> Response<Full<Bytes>> {
    let (status, code) = match err {
        StoreError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        StoreError::InvalidRule(_) => (StatusCode::BAD_REQUEST, "invalid_rule"),
        StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
    };
    error_response(status, code, &err.to_string())
}

/// Collect request body into bytes, answering 413 past `MAX_ADMIN_BODY`
pub async fn collect_body<B>(body: B) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, MAX_ADMIN_BODY).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            &format!("Request body exceeds {MAX_ADMIN_BODY} bytes"),
        )),
        Err(e) => Err(bad_request(&format!("Failed to read request body: {e}"))),
    }
}
