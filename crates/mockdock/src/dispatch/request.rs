//! Per-request view of an inbound call on the mock surface.

use crate::config::Protocol;
use crate::rules::RuleKey;
use bytes::{Buf, Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::{HeaderMap, Request};
use std::fmt::Display;
use std::net::SocketAddr;
use tracing::debug;

/// Upper bound on the request body kept for logging
pub const BODY_PREVIEW_LIMIT: usize = 1000;

/// Everything dispatch needs to know about a request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: String,
    pub scheme: Protocol,
    pub query: Option<String>,
    pub client_addr: Option<SocketAddr>,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body_preview: String,
}

impl RequestDescriptor {
    pub fn new(path: &str, method: &str, scheme: Protocol) -> Self {
        Self {
            path: normalize_request_path(path),
            method: method.to_uppercase(),
            scheme,
            query: None,
            client_addr: None,
            content_type: None,
            user_agent: None,
            body_preview: String::new(),
        }
    }

    /// Build a descriptor from a hyper request, reading the body only for
    /// methods that carry one
    pub async fn from_request<B>(
        req: Request<B>,
        scheme: Protocol,
        client_addr: Option<SocketAddr>,
    ) -> Self
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let mut descriptor = Self::new(parts.uri.path(), parts.method.as_str(), scheme);
        descriptor.query = parts.uri.query().map(str::to_string);
        descriptor.client_addr = client_addr;
        descriptor.content_type = header_str(&parts.headers, CONTENT_TYPE.as_str());
        descriptor.user_agent = header_str(&parts.headers, USER_AGENT.as_str());

        if carries_body(&descriptor.method) {
            match read_prefix(body, BODY_PREVIEW_LIMIT).await {
                Ok(bytes) => {
                    descriptor.body_preview = String::from_utf8_lossy(&bytes).into_owned();
                }
                Err(e) => debug!("Failed to read request body: {}", e),
            }
        }

        descriptor
    }

    pub fn key(&self) -> RuleKey {
        RuleKey::new(&self.path, &self.method, self.scheme.as_str())
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Methods whose body is previewed. Expects an uppercased method.
pub fn carries_body(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "PATCH")
}

/// Read at most `limit` bytes of a body, leaving the rest unread
async fn read_prefix<B: Body>(body: B, limit: usize) -> Result<Bytes, B::Error> {
    let mut body = std::pin::pin!(body);
    let mut buf = BytesMut::new();
    while buf.len() < limit {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(mut data) = frame.into_data() {
                    let take = data.remaining().min(limit - buf.len());
                    buf.extend_from_slice(&data.copy_to_bytes(take));
                }
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }
    Ok(buf.freeze())
}

/// Percent-decode a request path and make sure it starts with `/`
pub fn normalize_request_path(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    if decoded.starts_with('/') {
        decoded
    } else {
        format!("/{decoded}")
    }
}
