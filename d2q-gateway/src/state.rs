use std::sync::Arc;

use d2q_store::Store;

use crate::error::{ApiError, ApiResult};
use crate::providers::Provider;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// File-backed repositories
    pub store: Store,
    /// LLM client; absent when no API key was configured
    provider: Option<Arc<dyn Provider>>,
}

impl AppState {
    pub fn new(store: Store, provider: Option<Arc<dyn Provider>>) -> Self {
        Self { store, provider }
    }

    /// The LLM client, or a 502 for routes that need one.
    pub fn provider(&self) -> ApiResult<Arc<dyn Provider>> {
        self.provider.clone().ok_or(ApiError::ProviderUnavailable)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }
}
