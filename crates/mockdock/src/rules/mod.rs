//! Mock rules and the storage contract behind them.
//!
//! - `types`: rule, draft, key and header mapping types plus store errors
//! - `store`: the `RuleStore` trait and the exporting decorator

mod store;
mod types;

pub use store::{ExportingStore, RuleStore};
pub use types::{
    MalformedDataError, MockRule, RuleDraft, RuleHeaders, RuleKey, RuleRecord, StoreError,
    DEFAULT_CONTENT_TYPE, DEFAULT_METHOD, DEFAULT_SCHEME, DEFAULT_STATUS_CODE,
};
