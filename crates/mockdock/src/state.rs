//! Shared handles passed to both listener surfaces.

use crate::config::SettingsStore;
use crate::dispatch::Dispatcher;
use crate::rules::RuleStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RuleStore>,
    pub dispatcher: Dispatcher,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn RuleStore>, settings: SettingsStore) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&store)),
            store,
            settings: Arc::new(settings),
        }
    }
}
