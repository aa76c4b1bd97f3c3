//! Multi-step writes across the object store and the metadata store.
//!
//! Each operation is an ordered list of fallible steps. There is no
//! compensation: when a step fails, earlier steps stay committed and the
//! affected object paths are reported in [`StepFailure::committed`]. Nothing
//! is retried.

use std::fmt;

use chrono::Utc;
use tracing::{debug, info, warn};

use hoai_core::{
    new_attachment_path, Article, ArticleRepository, ArticleUpdate, Category, CategoryRepository,
    CurrentUser, Error, NewArticle, ObjectStore, PendingFile,
};

/// The step of a mutation that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStep {
    UploadAttachment { filename: String },
    RemoveAttachments,
    InsertArticle,
    UpdateArticle,
    DeleteArticle,
    InsertCategory,
}

impl fmt::Display for MutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationStep::UploadAttachment { filename } => write!(f, "upload of {}", filename),
            MutationStep::RemoveAttachments => f.write_str("attachment removal"),
            MutationStep::InsertArticle => f.write_str("article insert"),
            MutationStep::UpdateArticle => f.write_str("article update"),
            MutationStep::DeleteArticle => f.write_str("article delete"),
            MutationStep::InsertCategory => f.write_str("category insert"),
        }
    }
}

/// A failed mutation step plus the object paths already changed before it.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct StepFailure {
    pub step: MutationStep,
    /// Uploaded-but-unreferenced or removed-but-still-listed paths.
    pub committed: Vec<String>,
    #[source]
    pub source: Error,
}

impl StepFailure {
    fn new(step: MutationStep, committed: Vec<String>, source: Error) -> Self {
        warn!(
            subsystem = "wiki",
            component = "mutations",
            step = %step,
            committed = committed.len(),
            error = %source,
            "Mutation step failed"
        );
        Self {
            step,
            committed,
            source,
        }
    }

    /// Human-readable detail line for the error log.
    pub fn details(&self) -> String {
        if self.committed.is_empty() {
            format!("step: {}", self.step)
        } else {
            format!(
                "step: {}; committed paths: {}",
                self.step,
                self.committed.join(", ")
            )
        }
    }
}

/// Title, content and category of an article being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub category_id: i64,
}

/// Upload `files` one at a time under fresh paths owned by `author_id`.
///
/// `committed` is extended with each stored path so a later failure can
/// report everything already written.
async fn upload_all(
    store: &dyn ObjectStore,
    author_id: &str,
    files: &[PendingFile],
    committed: &mut Vec<String>,
) -> Result<Vec<String>, StepFailure> {
    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        let path = new_attachment_path(author_id, &file.name);
        if let Err(e) = store
            .upload(&path, &file.data, file.content_type.as_deref())
            .await
        {
            return Err(StepFailure::new(
                MutationStep::UploadAttachment {
                    filename: file.name.clone(),
                },
                committed.clone(),
                e,
            ));
        }
        debug!(storage_path = %path, size = file.size(), "Attachment uploaded");
        committed.push(path.clone());
        uploaded.push(path);
    }
    Ok(uploaded)
}

/// Upload `files`, then insert the article referencing them.
pub async fn create_article(
    store: &dyn ObjectStore,
    articles: &dyn ArticleRepository,
    user: &CurrentUser,
    draft: ArticleDraft,
    files: &[PendingFile],
) -> Result<Article, StepFailure> {
    let mut committed = Vec::new();
    let attachments = upload_all(store, &user.id, files, &mut committed).await?;

    let article = articles
        .insert(NewArticle {
            title: draft.title,
            content: draft.content,
            category_id: draft.category_id,
            author_id: user.id.clone(),
            author_name: user.name.clone(),
            attachments,
        })
        .await
        .map_err(|e| StepFailure::new(MutationStep::InsertArticle, committed, e))?;

    info!(
        subsystem = "wiki",
        component = "mutations",
        op = "create_article",
        article_id = article.id,
        category_id = article.category_id,
        object_count = article.attachments.len(),
        "Article created"
    );
    Ok(article)
}

/// Remove staged attachments, upload new ones, then write the metadata.
///
/// The final attachment list is `existing - remove + uploaded`, keeping the
/// original order. `changes` only needs its metadata fields set; the
/// attachment list and `last_modified` are always filled in here. Returns
/// the article as written.
pub async fn update_article(
    store: &dyn ObjectStore,
    articles: &dyn ArticleRepository,
    user: &CurrentUser,
    existing: &Article,
    changes: ArticleUpdate,
    files: &[PendingFile],
    remove: &[String],
) -> Result<Article, StepFailure> {
    let mut committed = Vec::new();

    if !remove.is_empty() {
        store
            .remove(remove)
            .await
            .map_err(|e| StepFailure::new(MutationStep::RemoveAttachments, Vec::new(), e))?;
        committed.extend(remove.iter().cloned());
    }

    let uploaded = upload_all(store, &user.id, files, &mut committed).await?;

    let mut attachments: Vec<String> = existing
        .attachments
        .iter()
        .filter(|path| !remove.contains(*path))
        .cloned()
        .collect();
    attachments.extend(uploaded);

    let update = ArticleUpdate {
        attachments: Some(attachments),
        last_modified: Some(Utc::now()),
        ..changes
    };
    articles
        .update(existing.id, update.clone())
        .await
        .map_err(|e| StepFailure::new(MutationStep::UpdateArticle, committed, e))?;

    let mut written = existing.clone();
    update.apply_to(&mut written);
    info!(
        subsystem = "wiki",
        component = "mutations",
        op = "update_article",
        article_id = written.id,
        removed = remove.len(),
        object_count = written.attachments.len(),
        "Article updated"
    );
    Ok(written)
}

/// Remove every attachment of `article` in one call, then delete its row.
pub async fn delete_article(
    store: &dyn ObjectStore,
    articles: &dyn ArticleRepository,
    article: &Article,
) -> Result<(), StepFailure> {
    if !article.attachments.is_empty() {
        store
            .remove(&article.attachments)
            .await
            .map_err(|e| StepFailure::new(MutationStep::RemoveAttachments, Vec::new(), e))?;
    }

    articles.delete(article.id).await.map_err(|e| {
        StepFailure::new(
            MutationStep::DeleteArticle,
            article.attachments.clone(),
            e,
        )
    })?;

    info!(
        subsystem = "wiki",
        component = "mutations",
        op = "delete_article",
        article_id = article.id,
        object_count = article.attachments.len(),
        "Article deleted"
    );
    Ok(())
}

/// Insert a category. The name is trimmed first.
pub async fn create_category(
    categories: &dyn CategoryRepository,
    name: &str,
) -> Result<Category, StepFailure> {
    let category = categories
        .insert(name.trim())
        .await
        .map_err(|e| StepFailure::new(MutationStep::InsertCategory, Vec::new(), e))?;

    info!(
        subsystem = "wiki",
        component = "mutations",
        op = "create_category",
        category_id = category.id,
        "Category created"
    );
    Ok(category)
}
