//! mockprep-providers: scorer backends.
//!
//! Implements the `Scorer` trait for Anthropic, OpenAI, and Ollama, plus an
//! offline mock, and loads the `mockprep.toml` configuration that selects
//! between them.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{
    create_scorer, load_config, load_config_from, EngineSection, MockprepConfig, ProviderConfig,
};
pub use mockprep_core::error::ProviderError;
