//! OpenAI-compatible provider implementation used for DashScope, OpenAI and
//! self-hosted endpoints.

pub mod client;

pub use client::OpenAiCompatibleClient;
