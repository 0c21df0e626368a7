//! RuleStore backends.
//!
//! - `sqlite`: durable store used by default
//! - `inmemory`: process-local store for tests and throwaway instances

mod inmemory;
mod sqlite;

pub use inmemory::InMemoryRuleStore;
pub use sqlite::SqliteRuleStore;
