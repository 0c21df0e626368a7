//! Turns a matched rule into a response.

use super::builder::MockResponse;
use crate::rules::{MockRule, RuleHeaders, DEFAULT_CONTENT_TYPE};
use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;
use std::time::Duration;
use tracing::warn;

/// Wait out the rule's delay, then render its response.
///
/// The delay is a Tokio timer, so only this request is suspended.
pub async fn synthesize(rule: &MockRule) -> MockResponse {
    if rule.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(rule.delay_ms)).await;
    }
    render(rule)
}

/// Build the response for a rule without any delay.
///
/// `Content-Type` comes from the rule first; the custom headers are then
/// applied in order and replace same-named headers, `Content-Type` included.
pub fn render(rule: &MockRule) -> MockResponse {
    let status = StatusCode::from_u16(rule.status_code).unwrap_or_else(|_| {
        warn!(
            rule_id = rule.id,
            status_code = rule.status_code,
            "Rule has an invalid status code, answering 500"
        );
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = MockResponse::new(status).body(rule.body.clone());

    let content_type = if rule.content_type.trim().is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        rule.content_type.as_str()
    };
    if !response.set_header(CONTENT_TYPE.as_str(), content_type) {
        warn!(rule_id = rule.id, content_type, "Ignoring invalid content type");
    }

    for (name, value) in overlay(rule).iter() {
        if !response.set_header(name, value) {
            warn!(rule_id = rule.id, header = name, "Ignoring invalid custom header");
        }
    }

    response
}

/// Decode the custom headers, falling back to none when they are corrupt
fn overlay(rule: &MockRule) -> RuleHeaders {
    rule.headers().unwrap_or_else(|e| {
        warn!(
            rule_id = rule.id,
            path = %rule.path,
            error = %e,
            "Invalid headers for rule, serving without custom headers"
        );
        RuleHeaders::new()
    })
}
