pub mod api;
pub mod config;
pub mod error;
pub mod provider;
pub mod shaper;
pub mod tiktok;

use std::sync::Arc;
use provider::VideoProvider;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn VideoProvider>,
}
