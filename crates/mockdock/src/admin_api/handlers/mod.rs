pub mod mocks;
pub mod settings;
pub mod system;

use crate::rules::{RuleStore, StoreError};
use std::sync::Arc;

/// Run a store call on the blocking pool
pub(crate) async fn with_store<T, F>(store: &Arc<dyn RuleStore>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&dyn RuleStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .unwrap_or_else(|e| Err(StoreError::Backend(format!("store task failed: {e}"))))
}
