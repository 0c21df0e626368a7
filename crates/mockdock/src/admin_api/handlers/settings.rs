//! Listener settings handlers.

use crate::admin_api::types::{bad_request, error_response, json_response};
use crate::config::{ConfigError, ConfigOverrides, ServerConfig};
use crate::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
struct SettingsResponse {
    #[serde(flatten)]
    config: ServerConfig,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    restart_required: bool,
}

/// GET /admin/settings
pub fn handle_get(state: &AppState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &SettingsResponse {
            config: state.settings.current(),
            restart_required: false,
        },
    )
}

/// PUT|POST /admin/settings - persisted now, applied on next start
pub async fn handle_update(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    let overrides: ConfigOverrides = match serde_json::from_slice(&body) {
        Ok(o) => o,
        Err(e) => return bad_request(&format!("Invalid settings JSON: {e}")),
    };

    let settings = Arc::clone(&state.settings);
    let result = tokio::task::spawn_blocking(move || settings.update(overrides)).await;

    match result {
        Ok(Ok(config)) => json_response(
            StatusCode::OK,
            &SettingsResponse {
                config,
                restart_required: true,
            },
        ),
        Ok(Err(ConfigError::Invalid(message))) => bad_request(&message),
        Ok(Err(e)) => {
            warn!("Failed to save settings: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "settings_error", &e.to_string())
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "settings_error",
            &format!("settings task failed: {e}"),
        ),
    }
}
