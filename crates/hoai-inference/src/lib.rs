//! # hoai-inference
//!
//! AI search backend for the HOAI Planer Pro wiki.
//!
//! This crate provides:
//! - Ollama chat implementation of [`AiSearchBackend`] (default)
//! - Normalization of model output into `{title, content, sources}`
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//!
//! # Example
//!
//! ```rust,no_run
//! use hoai_inference::OllamaSearchBackend;
//! use hoai_core::AiSearchBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaSearchBackend::from_env();
//!     let answer = backend.search("Was regelt §34 HOAI?").await.unwrap();
//!     println!("{}", answer.title);
//! }
//! ```

pub mod normalize;

#[cfg(feature = "ollama")]
pub mod ollama;

// Re-export core types
pub use hoai_core::*;

pub use normalize::{normalize_response, strip_code_fence, strip_thinking};

#[cfg(feature = "ollama")]
pub use ollama::OllamaSearchBackend;
