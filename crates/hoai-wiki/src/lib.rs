//! # hoai-wiki
//!
//! Category/article tree, view-state machine and mutation orchestration for
//! the HOAI Planer Pro wiki.
//!
//! This crate provides:
//! - [`QueryCache`]: keyed cache with single-flight loads and invalidation
//! - [`mutations`]: ordered, non-compensating multi-step writes across the
//!   object store and the metadata store
//! - [`WikiController`]: the list/view/edit/create state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use hoai_wiki::{WikiContext, WikiController};
//!
//! let ctx = WikiContext::new(categories, articles, store, ai, cache, errors)
//!     .with_user(CurrentUser::new("u1", "Anna Planer"));
//! let mut wiki = WikiController::new(ctx, None);
//! wiki.refresh().await;
//! for (category, articles) in wiki.tree() {
//!     println!("{} ({})", category.name, articles.len());
//! }
//! ```

pub mod cache;
pub mod controller;
pub mod mutations;

#[cfg(test)]
mod mock;

// Re-export core types
pub use hoai_core::*;

pub use cache::{CacheStats, QueryCache, QueryState};
pub use controller::{
    AiSearchState, DataState, Outcome, ViewMode, WikiContext, WikiController,
};
pub use mutations::{ArticleDraft, MutationStep, StepFailure};
