//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{mocks, settings, system};
use crate::admin_api::types::{collect_body, get_base_url, not_found};
use crate::config::Protocol;
use crate::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::error::Error as StdError;
use tracing::debug;

/// Parsed admin route
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AdminRoute {
    /// GET /admin
    Root,
    /// GET/POST /admin/mocks
    Mocks,
    /// GET/PUT/DELETE /admin/mocks/:id
    MockById(i64),
    /// GET/PUT/POST /admin/settings
    Settings,
    /// GET /health
    Health,
    /// GET /metrics
    Metrics,
}

impl AdminRoute {
    pub(crate) fn parse(path: &str) -> Option<Self> {
        match path {
            "/health" => return Some(AdminRoute::Health),
            "/metrics" => return Some(AdminRoute::Metrics),
            _ => {}
        }

        let rest = path.strip_prefix("/admin")?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        match segments.as_slice() {
            [] => Some(AdminRoute::Root),
            ["mocks"] => Some(AdminRoute::Mocks),
            ["mocks", id] => id.parse().ok().map(AdminRoute::MockById),
            ["settings"] => Some(AdminRoute::Settings),
            _ => None,
        }
    }
}

/// Main admin request router
pub async fn route_request<B>(
    req: Request<B>,
    state: &AppState,
    scheme: Protocol,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let base_url = get_base_url(req.headers(), scheme.as_str());

    debug!("Admin API: {} {}", method, path);

    let Some(route) = AdminRoute::parse(&path) else {
        return not_found();
    };

    let body = if matches!(method, Method::POST | Method::PUT) {
        match collect_body(req.into_body()).await {
            Ok(b) => b,
            Err(resp) => return resp,
        }
    } else {
        Bytes::new()
    };

    match (&method, route) {
        (&Method::GET, AdminRoute::Root) => system::handle_root(&base_url),
        (&Method::GET, AdminRoute::Health) => system::handle_health(),
        (&Method::GET, AdminRoute::Metrics) => system::handle_metrics(),

        (&Method::GET, AdminRoute::Mocks) => mocks::handle_list(state, &base_url).await,
        (&Method::POST, AdminRoute::Mocks) => mocks::handle_create(state, body, &base_url).await,

        (&Method::GET, AdminRoute::MockById(id)) => mocks::handle_get(state, id, &base_url).await,
        (&Method::PUT, AdminRoute::MockById(id)) => {
            mocks::handle_update(state, id, body, &base_url).await
        }
        (&Method::DELETE, AdminRoute::MockById(id)) => mocks::handle_delete(state, id).await,

        (&Method::GET, AdminRoute::Settings) => settings::handle_get(state),
        (&Method::PUT | &Method::POST, AdminRoute::Settings) => {
            settings::handle_update(state, body).await
        }

        _ => not_found(),
    }
}
