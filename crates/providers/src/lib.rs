//! LLM provider implementations for RagRelay.
//!
//! All providers implement the `ragrelay_core::Provider` trait.
//! The router maps agent model identifiers onto a configured provider.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
