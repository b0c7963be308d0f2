//! Application state and shared types.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::services::client::Upstream;
use crate::services::user_agent::UaBlockList;

/// Application state shared across all request handlers.
///
/// Everything here is read-only once the server starts.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub upstream: Arc<dyn Upstream>,
    pub block_list: Arc<UaBlockList>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, upstream: Arc<dyn Upstream>) -> Self {
        let block_list = UaBlockList::new(&settings.agents.block);
        Self {
            settings: Arc::new(settings),
            upstream,
            block_list: Arc::new(block_list),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
