//! Mockdock: an HTTP mock server.
//!
//! Rules map `(path, method, scheme)` to canned responses. The admin API
//! edits them, the mock listener serves them, and every miss is logged with
//! the reason it did not match.

// ===== Rules and storage =====
pub mod backends;
pub mod export;
pub mod rules;

// ===== Request pipeline =====
pub mod dispatch;
pub mod matcher;
pub mod response;

// ===== Surfaces and runtime =====
pub mod admin_api;
pub mod config;
pub mod metrics;
pub mod server;
pub mod state;

pub use dispatch::{Dispatcher, RequestDescriptor};
pub use rules::{MockRule, RuleDraft, RuleStore, StoreError};
pub use state::AppState;
