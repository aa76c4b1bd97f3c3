//! Data model for the wiki: categories, articles, attachments and the
//! session user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CATEGORY & ARTICLE
// =============================================================================

/// A wiki category. Owns zero or more articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A wiki article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    /// Rich text (HTML) body.
    pub content: String,
    pub category_id: i64,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Object-store paths, in upload order. Authoritative list of the
    /// article's attachments.
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Insert payload for a new article.
///
/// `created_at` and `last_modified` are stamped by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Partial update for an existing article. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ArticleUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category_id.is_none()
            && self.attachments.is_none()
            && self.last_modified.is_none()
    }

    /// Apply this update to an article in place.
    pub fn apply_to(&self, article: &mut Article) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        if let Some(content) = &self.content {
            article.content = content.clone();
        }
        if let Some(category_id) = self.category_id {
            article.category_id = category_id;
        }
        if let Some(attachments) = &self.attachments {
            article.attachments = attachments.clone();
        }
        if let Some(last_modified) = self.last_modified {
            article.last_modified = last_modified;
        }
    }
}

/// Combined categories + articles dataset, cached under the `"wiki"` query key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiData {
    pub categories: Vec<Category>,
    pub articles: Vec<Article>,
}

impl WikiData {
    pub fn article(&self, id: i64) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Articles belonging to `category_id`, in dataset order.
    pub fn articles_in(&self, category_id: i64) -> impl Iterator<Item = &Article> {
        self.articles
            .iter()
            .filter(move |a| a.category_id == category_id)
    }

    pub fn has_articles(&self, category_id: i64) -> bool {
        self.articles.iter().any(|a| a.category_id == category_id)
    }
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// A file selected for upload but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Original filename as chosen by the user.
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Display projection of one stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentView {
    pub path: String,
    pub display_name: String,
    pub public_url: String,
}

// =============================================================================
// SESSION
// =============================================================================

/// The authenticated user, as supplied by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// AI SEARCH
// =============================================================================

/// A citation returned alongside an AI search answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSource {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// Normalized AI search answer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSearchResult {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<AiSource>,
}
