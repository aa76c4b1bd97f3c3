//! Core traits for the wiki's remote collaborators.
//!
//! These traits define the interfaces that concrete gateway implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// METADATA REPOSITORY TRAITS
// =============================================================================

/// Repository for the `wiki_categories` collection.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// List all categories, ordered by name.
    async fn list(&self) -> Result<Vec<Category>>;

    /// Insert a new category and return it.
    async fn insert(&self, name: &str) -> Result<Category>;
}

/// Repository for the `wiki_articles` collection.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// List all articles, ordered by title.
    async fn list(&self) -> Result<Vec<Article>>;

    /// Fetch a single article.
    async fn fetch(&self, id: i64) -> Result<Article>;

    /// Insert a new article. Fails with `CategoryNotFound` when
    /// `category_id` does not reference an existing category.
    async fn insert(&self, article: NewArticle) -> Result<Article>;

    /// Apply a partial update to an article.
    async fn update(&self, id: i64, update: ArticleUpdate) -> Result<()>;

    /// Delete an article row. Attachments are not touched.
    async fn delete(&self, id: i64) -> Result<()>;
}

// =============================================================================
// OBJECT STORAGE TRAITS
// =============================================================================

/// Object store for the `wiki_attachments` bucket, keyed by string path.
///
/// There is no referential integrity between stored objects and article
/// rows; callers own that bookkeeping.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object at `path`.
    async fn upload(&self, path: &str, data: &[u8], content_type: Option<&str>) -> Result<()>;

    /// Read an object.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove several objects in one call. Missing objects are ignored.
    async fn remove(&self, paths: &[String]) -> Result<()>;

    /// Resolve the public URL of an object.
    fn public_url(&self, path: &str) -> String;
}

// =============================================================================
// AI SEARCH TRAITS
// =============================================================================

/// Free-text search answered by a generative model.
#[async_trait]
pub trait AiSearchBackend: Send + Sync {
    /// Answer `query`, returning a normalized result with citations.
    async fn search(&self, query: &str) -> Result<AiSearchResult>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
