pub mod error;
pub mod providers;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use providers::provider::{
    ChatMessage, Provider, ProviderError, ProviderResponse, ProviderUsage, ResponseFormat,
    UploadedFile, extract_text,
};
pub use state::AppState;
