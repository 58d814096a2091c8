//! Business logic that needs the LLM provider.

pub mod extraction;
pub mod generation;
