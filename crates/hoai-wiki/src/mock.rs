//! In-memory gateway doubles for controller tests.
//!
//! One [`MockBackend`] plays every remote collaborator (both repositories,
//! the object store and the AI backend) so tests can assert on a single,
//! ordered call log.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use hoai_core::{
    AiSearchBackend, AiSearchResult, Article, ArticleRepository, ArticleUpdate, Category,
    CategoryRepository, CurrentUser, Error, ErrorLog, NewArticle, ObjectStore, Result, WikiData,
};

use crate::cache::QueryCache;
use crate::controller::{WikiContext, WikiController};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListCategories,
    ListArticles,
    FetchArticle(i64),
    InsertCategory(String),
    InsertArticle(NewArticle),
    UpdateArticle(i64, ArticleUpdate),
    DeleteArticle(i64),
    Upload(String),
    Remove(Vec<String>),
    AiSearch(String),
}

impl Call {
    /// Calls that change remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::ListCategories | Call::ListArticles | Call::FetchArticle(_) | Call::AiSearch(_)
        )
    }
}

#[derive(Default)]
struct MockState {
    categories: Vec<Category>,
    articles: Vec<Article>,
    objects: BTreeMap<String, Vec<u8>>,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
    fail_upload_number: Option<usize>,
    uploads: usize,
    ai_answer: Option<AiSearchResult>,
}

impl MockState {
    fn next_id(&self) -> i64 {
        let max_category = self.categories.iter().map(|c| c.id).max().unwrap_or(0);
        let max_article = self.articles.iter().map(|a| a.id).max().unwrap_or(0);
        max_category.max(max_article) + 1
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.contains(op) {
            Err(Error::Request(format!("{} unavailable", op)))
        } else {
            Ok(())
        }
    }
}

/// Shared in-memory backend. Clones share state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Seed a category without recording a call.
    pub fn seed_category(&self, id: i64, name: &str) -> Category {
        let category = Category {
            id,
            name: name.to_string(),
        };
        self.lock().categories.push(category.clone());
        category
    }

    /// Seed an article (and its attachment objects) without recording a call.
    pub fn seed_article(
        &self,
        id: i64,
        category_id: i64,
        title: &str,
        attachments: &[&str],
    ) -> Article {
        let now = Utc::now();
        let article = Article {
            id,
            title: title.to_string(),
            content: format!("<p>{}</p>", title),
            category_id,
            author_id: "author-1".to_string(),
            author_name: "Anna Planer".to_string(),
            created_at: now,
            last_modified: now,
            attachments: attachments.iter().map(|p| p.to_string()).collect(),
        };
        let mut state = self.lock();
        for path in attachments {
            state.objects.insert(path.to_string(), b"seed".to_vec());
        }
        state.articles.push(article.clone());
        article
    }

    /// Make every call of `op` fail (`"upload"`, `"remove"`, `"insert_article"`,
    /// `"update_article"`, `"delete_article"`, `"insert_category"`, `"list"`,
    /// `"ai_search"`).
    pub fn fail(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    /// Make only the `n`-th upload (1-based) fail.
    pub fn fail_upload_number(&self, n: usize) {
        self.lock().fail_upload_number = Some(n);
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.fail_upload_number = None;
    }

    pub fn set_ai_answer(&self, answer: AiSearchResult) {
        self.lock().ai_answer = Some(answer);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn object_paths(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn stored_article(&self, id: i64) -> Option<Article> {
        self.lock().articles.iter().find(|a| a.id == id).cloned()
    }

    pub fn article_count(&self) -> usize {
        self.lock().articles.len()
    }

    /// Context wired to this backend with a fresh cache and error log.
    pub fn context(&self, user: Option<CurrentUser>) -> WikiContext {
        let handle = Arc::new(self.clone());
        let ctx = WikiContext::new(
            handle.clone(),
            handle.clone(),
            handle.clone(),
            handle,
            QueryCache::<WikiData>::with_default_staleness(),
            ErrorLog::new(),
        );
        match user {
            Some(user) => ctx.with_user(user),
            None => ctx,
        }
    }

    /// Controller for `test_user()`, already refreshed.
    pub async fn controller(&self) -> WikiController {
        let mut wiki = WikiController::new(self.context(Some(test_user())), None);
        wiki.refresh().await.unwrap();
        wiki
    }
}

pub fn test_user() -> CurrentUser {
    CurrentUser::new("user-42", "Bernd Bauleiter")
}

#[async_trait]
impl CategoryRepository for MockBackend {
    async fn list(&self) -> Result<Vec<Category>> {
        let mut state = self.lock();
        state.calls.push(Call::ListCategories);
        state.check("list")?;
        Ok(state.categories.clone())
    }

    async fn insert(&self, name: &str) -> Result<Category> {
        let mut state = self.lock();
        state.calls.push(Call::InsertCategory(name.to_string()));
        state.check("insert_category")?;
        let category = Category {
            id: state.next_id(),
            name: name.to_string(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }
}

#[async_trait]
impl ArticleRepository for MockBackend {
    async fn list(&self) -> Result<Vec<Article>> {
        let mut state = self.lock();
        state.calls.push(Call::ListArticles);
        state.check("list")?;
        Ok(state.articles.clone())
    }

    async fn fetch(&self, id: i64) -> Result<Article> {
        let mut state = self.lock();
        state.calls.push(Call::FetchArticle(id));
        state
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(Error::ArticleNotFound(id))
    }

    async fn insert(&self, article: NewArticle) -> Result<Article> {
        let mut state = self.lock();
        state.calls.push(Call::InsertArticle(article.clone()));
        state.check("insert_article")?;
        if !state.categories.iter().any(|c| c.id == article.category_id) {
            return Err(Error::CategoryNotFound(article.category_id));
        }
        let now = Utc::now();
        let stored = Article {
            id: state.next_id(),
            title: article.title,
            content: article.content,
            category_id: article.category_id,
            author_id: article.author_id,
            author_name: article.author_name,
            created_at: now,
            last_modified: now,
            attachments: article.attachments,
        };
        state.articles.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, update: ArticleUpdate) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::UpdateArticle(id, update.clone()));
        state.check("update_article")?;
        if let Some(category_id) = update.category_id {
            if !state.categories.iter().any(|c| c.id == category_id) {
                return Err(Error::CategoryNotFound(category_id));
            }
        }
        let article = state
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(Error::ArticleNotFound(id))?;
        update.apply_to(article);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteArticle(id));
        state.check("delete_article")?;
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        if state.articles.len() == before {
            return Err(Error::ArticleNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MockBackend {
    async fn upload(&self, path: &str, data: &[u8], _content_type: Option<&str>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Upload(path.to_string()));
        state.uploads += 1;
        state.check("upload")?;
        if state.fail_upload_number == Some(state.uploads) {
            return Err(Error::Storage("quota exceeded".to_string()));
        }
        if state.objects.contains_key(path) {
            return Err(Error::Storage(format!("object already exists: {}", path)));
        }
        state.objects.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.lock()
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {}", path)))
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Remove(paths.to_vec()));
        state.check("remove")?;
        for path in paths {
            state.objects.remove(path);
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://files.test/wiki_attachments/{}", path)
    }
}

#[async_trait]
impl AiSearchBackend for MockBackend {
    async fn search(&self, query: &str) -> Result<AiSearchResult> {
        let mut state = self.lock();
        state.calls.push(Call::AiSearch(query.to_string()));
        if state.failing.contains("ai_search") {
            return Err(Error::Inference("Ollama returned 503: overloaded".to_string()));
        }
        Ok(state.ai_answer.clone().unwrap_or_else(|| AiSearchResult {
            title: query.to_string(),
            content: "Keine Antwort.".to_string(),
            sources: Vec::new(),
        }))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
