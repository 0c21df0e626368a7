use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::str::FromStr;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Concrete outbound response produced by dispatch
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        MockResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Plain-text response with a fixed body
    pub fn text(status: StatusCode, body: &'static str) -> Self {
        let mut response = Self::new(status).body(body);
        response.set_header(CONTENT_TYPE.as_str(), TEXT_PLAIN);
        response
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing any existing header with the same name
    /// (compared case-insensitively). Returns false if the name or value is
    /// not valid in HTTP, leaving the response untouched.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
