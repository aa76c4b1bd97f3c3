//! Article repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, instrument};

use hoai_core::{Article, ArticleRepository, ArticleUpdate, Error, NewArticle, Result};

const ARTICLE_COLUMNS: &str = "id, title, content, category_id, author_id, author_name, \
                               created_at, last_modified, attachments";

/// PostgreSQL implementation of ArticleRepository over `wiki_articles`.
#[derive(Clone)]
pub struct PgArticleRepository {
    pool: Pool<Postgres>,
}

impl PgArticleRepository {
    /// Create a new PgArticleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn article_from_row(row: &PgRow) -> Article {
    Article {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category_id: row.get("category_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        created_at: row.get("created_at"),
        last_modified: row.get("last_modified"),
        attachments: row.get("attachments"),
    }
}

/// Map a foreign-key violation on `category_id` to `CategoryNotFound`.
fn map_category_fk(err: sqlx::Error, category_id: i64) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return Error::CategoryNotFound(category_id);
        }
    }
    Error::Database(err)
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    #[instrument(skip(self), fields(subsystem = "db", component = "articles", op = "list"))]
    async fn list(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM wiki_articles ORDER BY title, id",
            ARTICLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(result_count = rows.len(), "Articles loaded");
        Ok(rows.iter().map(article_from_row).collect())
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "articles", op = "fetch"))]
    async fn fetch(&self, id: i64) -> Result<Article> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM wiki_articles WHERE id = $1",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ArticleNotFound(id))?;

        Ok(article_from_row(&row))
    }

    #[instrument(skip(self, article), fields(subsystem = "db", component = "articles", op = "insert", category_id = article.category_id))]
    async fn insert(&self, article: NewArticle) -> Result<Article> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO wiki_articles
                 (title, content, category_id, author_id, author_name,
                  created_at, last_modified, attachments)
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
             RETURNING {}",
            ARTICLE_COLUMNS
        ))
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.category_id)
        .bind(&article.author_id)
        .bind(&article.author_name)
        .bind(now)
        .bind(&article.attachments)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_category_fk(e, article.category_id))?;

        Ok(article_from_row(&row))
    }

    #[instrument(skip(self, update), fields(subsystem = "db", component = "articles", op = "update", article_id = id))]
    async fn update(&self, id: i64, update: ArticleUpdate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wiki_articles SET
                 title = COALESCE($2, title),
                 content = COALESCE($3, content),
                 category_id = COALESCE($4, category_id),
                 attachments = COALESCE($5::text[], attachments),
                 last_modified = COALESCE($6, last_modified)
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(update.category_id)
        .bind(update.attachments.as_deref())
        .bind(update.last_modified)
        .execute(&self.pool)
        .await
        .map_err(|e| map_category_fk(e, update.category_id.unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(Error::ArticleNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "articles", op = "delete", article_id = id))]
    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM wiki_articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ArticleNotFound(id));
        }
        Ok(())
    }
}
