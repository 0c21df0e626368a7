use super::request::RequestDescriptor;
use crate::matcher::{match_request, MatchOutcome, MissReason};
use crate::metrics;
use crate::response::{synthesize, MockResponse};
use crate::rules::{RuleKey, RuleStore};
use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Reserved prefix of the administrative surface
pub const ADMIN_PREFIX: &str = "/admin";

/// Body of the 404 returned when no rule matches
pub const MISS_BODY: &str = "Mock not configured";

const LOG_TARGET: &str = "mockdock::dispatch";

/// True for `/admin` itself and anything below it, but not `/administrator`
pub fn is_admin_path(path: &str) -> bool {
    match path.strip_prefix(ADMIN_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// How a request was disposed of
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Served { rule_id: i64 },
    Missed(MissReason),
    AdminBlocked,
}

impl Disposition {
    /// Label used for the dispatch counter
    pub fn outcome(&self) -> &'static str {
        match self {
            Disposition::Served { .. } => "hit",
            Disposition::Missed(reason) => reason.code(),
            Disposition::AdminBlocked => "admin_blocked",
        }
    }
}

#[derive(Debug)]
pub struct Dispatched {
    pub disposition: Disposition,
    pub response: MockResponse,
}

/// Single entry point for every request on the mock surface.
///
/// Holds no rule state: each request re-reads the store, so admin edits
/// apply to the very next request.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn RuleStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    pub async fn handle(&self, descriptor: RequestDescriptor) -> MockResponse {
        self.dispatch(&descriptor).await.response
    }

    pub async fn dispatch(&self, desc: &RequestDescriptor) -> Dispatched {
        if is_admin_path(&desc.path) {
            info!(target: LOG_TARGET, method = %desc.method, path = %desc.path, "admin path blocked");
            return self.finish(
                desc,
                Disposition::AdminBlocked,
                MockResponse::text(StatusCode::NOT_FOUND, "Not Found"),
            );
        }

        info!(
            target: LOG_TARGET,
            method = %desc.method,
            path = %desc.path,
            scheme = %desc.scheme,
            query = desc.query.as_deref().unwrap_or(""),
            client = ?desc.client_addr,
            content_type = desc.content_type.as_deref().unwrap_or(""),
            user_agent = desc.user_agent.as_deref().unwrap_or(""),
            body_preview_len = desc.body_preview.len(),
            "request"
        );

        match self.resolve(desc.key()).await {
            MatchOutcome::Hit(rule) => {
                let response = synthesize(&rule).await;
                if rule.delay_ms > 0 {
                    metrics::record_delay(&desc.method, rule.delay_ms);
                }
                info!(
                    target: LOG_TARGET,
                    rule_id = rule.id,
                    status = response.status().as_u16(),
                    content_type = response.header(CONTENT_TYPE.as_str()).unwrap_or(""),
                    header_count = rule.headers().map(|h| h.len()).unwrap_or(0),
                    body_len = response.body_bytes().len(),
                    delay_ms = rule.delay_ms,
                    "response"
                );
                self.finish(desc, Disposition::Served { rule_id: rule.id }, response)
            }
            MatchOutcome::Miss(reason) => {
                info!(
                    target: LOG_TARGET,
                    method = %desc.method,
                    path = %desc.path,
                    scheme = %desc.scheme,
                    reason = reason.code(),
                    "miss: {}",
                    reason.description()
                );
                self.finish(
                    desc,
                    Disposition::Missed(reason),
                    MockResponse::text(StatusCode::NOT_FOUND, MISS_BODY),
                )
            }
        }
    }

    /// Run the matcher off the async workers, since store backends block
    pub async fn resolve(&self, key: RuleKey) -> MatchOutcome {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || match_request(store.as_ref(), &key)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(target: LOG_TARGET, "Rule lookup task failed: {}", e);
                MatchOutcome::Miss(MissReason::OtherUnmatched)
            }
        }
    }

    fn finish(
        &self,
        desc: &RequestDescriptor,
        disposition: Disposition,
        response: MockResponse,
    ) -> Dispatched {
        metrics::record_dispatch(&desc.method, disposition.outcome());
        Dispatched {
            disposition,
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryRuleStore;
    use crate::config::Protocol;
    use crate::rules::RuleDraft;
    use std::time::{Duration, Instant};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(InMemoryRuleStore::new()))
    }

    fn foo_rule() -> RuleDraft {
        RuleDraft {
            status_code: 201,
            content_type: "application/json".into(),
            headers: [("X-A", "1")].into_iter().collect(),
            body: r#"{"ok":true}"#.into(),
            ..RuleDraft::new("/foo", "GET")
        }
    }

    #[test]
    fn test_is_admin_path() {
        assert!(is_admin_path("/admin"));
        assert!(is_admin_path("/admin/"));
        assert!(is_admin_path("/admin/mocks/1"));
        assert!(!is_admin_path("/administrator"));
        assert!(!is_admin_path("/api/admin"));
    }

    #[tokio::test]
    async fn test_encoded_rule_path_matches_request() {
        let dispatcher = dispatcher();
        dispatcher
            .store()
            .insert(RuleDraft::new("/a%20b", "GET"))
            .unwrap();

        let hit = dispatcher
            .dispatch(&RequestDescriptor::new("/a%20b", "GET", Protocol::Http))
            .await;
        assert!(matches!(hit.disposition, Disposition::Served { .. }));
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let dispatcher = dispatcher();
        dispatcher.store().insert(foo_rule()).unwrap();

        let hit = dispatcher
            .dispatch(&RequestDescriptor::new("/foo", "GET", Protocol::Http))
            .await;
        assert!(matches!(hit.disposition, Disposition::Served { .. }));
        assert_eq!(hit.response.status(), StatusCode::CREATED);
        assert_eq!(hit.response.header("x-a"), Some("1"));
        assert_eq!(hit.response.header("content-type"), Some("application/json"));
        assert_eq!(hit.response.body_bytes().as_ref(), br#"{"ok":true}"#);

        let cases = [
            ("/foo", "GET", Protocol::Https, MissReason::SchemeMismatch),
            ("/foo", "POST", Protocol::Http, MissReason::MethodNotConfigured),
            ("/bar", "GET", Protocol::Http, MissReason::PathNotConfigured),
        ];
        for (path, method, scheme, reason) in cases {
            let miss = dispatcher
                .dispatch(&RequestDescriptor::new(path, method, scheme))
                .await;
            assert_eq!(miss.disposition, Disposition::Missed(reason));
            assert_eq!(miss.response.status(), StatusCode::NOT_FOUND);
            assert_eq!(miss.response.body_bytes().as_ref(), MISS_BODY.as_bytes());
            assert_eq!(miss.response.headers().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_edits_apply_to_next_request() {
        let dispatcher = dispatcher();
        let id = dispatcher.store().insert(foo_rule()).unwrap();
        let request = RequestDescriptor::new("/foo", "GET", Protocol::Http);

        dispatcher
            .store()
            .update(
                id,
                RuleDraft {
                    enabled: false,
                    ..foo_rule()
                },
            )
            .unwrap();
        let outcome = dispatcher.dispatch(&request).await;
        assert_eq!(
            outcome.disposition,
            Disposition::Missed(MissReason::RuleDisabled)
        );
    }

    #[tokio::test]
    async fn test_admin_prefix_is_never_dispatched() {
        let dispatcher = dispatcher();
        dispatcher
            .store()
            .insert(RuleDraft::new("/admin/mocks", "GET"))
            .unwrap();

        let blocked = dispatcher
            .dispatch(&RequestDescriptor::new("/admin/mocks", "GET", Protocol::Http))
            .await;
        assert_eq!(blocked.disposition, Disposition::AdminBlocked);
        assert_eq!(blocked.response.status(), StatusCode::NOT_FOUND);
        assert_eq!(blocked.response.body_bytes().as_ref(), b"Not Found");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delay_does_not_block_other_requests() {
        let dispatcher = dispatcher();
        dispatcher
            .store()
            .insert(RuleDraft {
                delay_ms: 50,
                ..RuleDraft::new("/slow", "GET")
            })
            .unwrap();
        dispatcher
            .store()
            .insert(RuleDraft::new("/fast", "GET"))
            .unwrap();

        let started = Instant::now();
        let slow = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .handle(RequestDescriptor::new("/slow", "GET", Protocol::Http))
                    .await;
                Instant::now()
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let fast = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .handle(RequestDescriptor::new("/fast", "GET", Protocol::Http))
                    .await;
                Instant::now()
            })
        };

        let fast_done = fast.await.unwrap();
        let slow_done = slow.await.unwrap();
        assert!(fast_done < slow_done);
        assert!(slow_done.duration_since(started) >= Duration::from_millis(50));
    }
}
