//! # hoai-db
//!
//! Gateway layer for the HOAI Planer Pro wiki.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for `wiki_categories` and `wiki_articles`
//! - A filesystem object store for the `wiki_attachments` bucket
//!
//! ## Example
//!
//! ```rust,ignore
//! use hoai_db::{ArticleRepository, Database, PoolConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect_with_config("postgres://localhost/hoai", PoolConfig::new()).await?;
//!     let articles = db.articles.list().await?;
//!     println!("{} articles", articles.len());
//!     Ok(())
//! }
//! ```
pub mod articles;
pub mod categories;
pub mod object_store;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use hoai_core::*;

pub use articles::PgArticleRepository;
pub use categories::PgCategoryRepository;
pub use object_store::FilesystemObjectStore;
pub use pool::{create_lazy_pool, create_pool_with_config, PoolConfig};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Category repository.
    pub categories: PgCategoryRepository,
    /// Article repository.
    pub articles: PgArticleRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            categories: PgCategoryRepository::new(pool.clone()),
            articles: PgArticleRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Create without connecting; the first query opens a connection.
    pub fn connect_lazy(url: &str, config: PoolConfig) -> Result<Self> {
        Ok(Self::new(create_lazy_pool(url, config)?))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
