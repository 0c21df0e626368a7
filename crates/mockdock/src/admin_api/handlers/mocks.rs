//! Rule management handlers.

use super::with_store;
use crate::admin_api::types::{
    bad_request, empty_response, json_response, store_error_response, ListMocksResponse,
    MockResource,
};
use crate::metrics;
use crate::rules::{RuleDraft, StoreError};
use crate::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::{info, warn};

fn parse_draft(body: &[u8]) -> Result<RuleDraft, Response<Full<Bytes>>> {
    serde_json::from_slice(body).map_err(|e| bad_request(&format!("Invalid mock JSON: {e}")))
}

/// GET /admin/mocks
pub async fn handle_list(state: &AppState, base_url: &str) -> Response<Full<Bytes>> {
    match with_store(&state.store, |store| store.list_all()).await {
        Ok(rules) => json_response(
            StatusCode::OK,
            &ListMocksResponse {
                mocks: rules
                    .iter()
                    .map(|rule| MockResource::new(rule, base_url))
                    .collect(),
            },
        ),
        Err(e) => store_error_response(&e),
    }
}

/// POST /admin/mocks
pub async fn handle_create(state: &AppState, body: Bytes, base_url: &str) -> Response<Full<Bytes>> {
    let draft = match parse_draft(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let result = with_store(&state.store, move |store| {
        let id = store.insert(draft)?;
        store.get(id)
    })
    .await;
    metrics::record_mutation("create", result.is_ok());

    match result {
        Ok(rule) => {
            info!(rule_id = rule.id, "Created mock {} {}", rule.method, rule.path);
            json_response(StatusCode::CREATED, &MockResource::new(&rule, base_url))
        }
        Err(e) => {
            warn!("Rejected mock: {}", e);
            store_error_response(&e)
        }
    }
}

/// GET /admin/mocks/:id
pub async fn handle_get(state: &AppState, id: i64, base_url: &str) -> Response<Full<Bytes>> {
    match with_store(&state.store, move |store| store.get(id)).await {
        Ok(rule) => json_response(StatusCode::OK, &MockResource::new(&rule, base_url)),
        Err(e) => store_error_response(&e),
    }
}

/// PUT /admin/mocks/:id - replace every field but the id
pub async fn handle_update(
    state: &AppState,
    id: i64,
    body: Bytes,
    base_url: &str,
) -> Response<Full<Bytes>> {
    let draft = match parse_draft(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let result = with_store(&state.store, move |store| {
        store.update(id, draft)?;
        store.get(id)
    })
    .await;
    metrics::record_mutation("update", result.is_ok());

    match result {
        Ok(rule) => {
            info!(rule_id = id, "Updated mock {} {}", rule.method, rule.path);
            json_response(StatusCode::OK, &MockResource::new(&rule, base_url))
        }
        Err(e) => store_error_response(&e),
    }
}

/// DELETE /admin/mocks/:id - succeeds whether or not the rule existed
pub async fn handle_delete(state: &AppState, id: i64) -> Response<Full<Bytes>> {
    let result = with_store(&state.store, move |store| store.delete(id)).await;
    match result {
        Ok(()) => {
            metrics::record_mutation("delete", true);
            info!(rule_id = id, "Deleted mock");
            empty_response(StatusCode::NO_CONTENT)
        }
        Err(StoreError::NotFound(_)) => empty_response(StatusCode::NO_CONTENT),
        Err(e) => {
            metrics::record_mutation("delete", false);
            store_error_response(&e)
        }
    }
}
