//! Category repository implementation.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, instrument};

use hoai_core::{Category, CategoryRepository, Error, Result};

/// PostgreSQL implementation of CategoryRepository over `wiki_categories`.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn category_from_row(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    #[instrument(skip(self), fields(subsystem = "db", component = "categories", op = "list"))]
    async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM wiki_categories ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(result_count = rows.len(), "Categories loaded");
        Ok(rows.iter().map(category_from_row).collect())
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "categories", op = "insert"))]
    async fn insert(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("category name must not be empty".into()));
        }

        let row = sqlx::query("INSERT INTO wiki_categories (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(category_from_row(&row))
    }
}
