//! Request pipeline for the mock surface.
//!
//! Resolves each request against the rule store, renders the matched rule
//! or a fixed 404, and logs the request, response and miss diagnosis as
//! structured events.

mod dispatcher;
mod request;

pub use dispatcher::{
    is_admin_path, Dispatched, Dispatcher, Disposition, ADMIN_PREFIX, MISS_BODY,
};
pub use request::{carries_body, normalize_request_path, RequestDescriptor, BODY_PREVIEW_LIMIT};
