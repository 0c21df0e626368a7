//! Admin REST API for rule and settings management.
//!
//! Everything lives under `/admin`:
//! - Creating, updating, deleting, and listing mock rules
//! - Reading and saving listener settings
//!
//! `/health` and `/metrics` are served alongside.

mod handlers;
mod router;
mod types;

pub use handlers::system::handle_health;
pub use router::route_request;
pub use types::{ErrorDetail, ErrorResponse};
