//! Wiki view-state controller.
//!
//! Owns the list/view/edit/create state machine, the edit buffers, the
//! category open/closed set and the AI search state. Remote effects go
//! through the gateway handles in [`WikiContext`]; every successful mutation
//! invalidates the `"wiki"` query instead of patching cached data.
//!
//! ```text
//!            select_article            begin_edit
//!   List ─────────────────────▶ View ─────────────▶ Edit
//!    ▲  ◀──────── cancel ──────  ▲ ◀── cancel/save ──┘
//!    │                           │
//!    └──── cancel/save ─── Create ◀── begin_create (from any mode)
//! ```
//!
//! Mutating operations take `&mut self`, so one controller never has two
//! saves or deletes in flight.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use hoai_core::defaults::{
    MSG_AI_SEARCH_FAILED, MSG_CREATE_CATEGORY_FAILED, MSG_DELETE_ARTICLE_FAILED,
    MSG_SAVE_ARTICLE_FAILED, WIKI_QUERY_KEY,
};
use hoai_core::{
    attachment_display_name, AiSearchBackend, AiSearchResult, Article, ArticleRepository,
    ArticleUpdate, AttachmentView, Category, CategoryRepository, CurrentUser, ErrorLog,
    ObjectStore, PendingFile, Result, WikiData,
};

use crate::cache::QueryCache;
use crate::mutations::{self, ArticleDraft, StepFailure};

/// Gateway handles and shared state a controller is built from.
#[derive(Clone)]
pub struct WikiContext {
    pub categories: Arc<dyn CategoryRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub store: Arc<dyn ObjectStore>,
    pub ai: Arc<dyn AiSearchBackend>,
    pub cache: QueryCache<WikiData>,
    pub errors: ErrorLog,
    /// Session user. `None` means read-only.
    pub user: Option<CurrentUser>,
}

impl WikiContext {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        articles: Arc<dyn ArticleRepository>,
        store: Arc<dyn ObjectStore>,
        ai: Arc<dyn AiSearchBackend>,
        cache: QueryCache<WikiData>,
        errors: ErrorLog,
    ) -> Self {
        Self {
            categories,
            articles,
            store,
            ai,
            cache,
            errors,
            user: None,
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.user = Some(user);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    View,
    Edit,
    Create,
}

/// Result of a user-triggered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Preconditions not met; nothing was sent and nothing was reported.
    Refused,
    Completed,
    /// A gateway call failed; one entry was added to the error log.
    Failed,
}

impl Outcome {
    pub fn is_completed(self) -> bool {
        self == Outcome::Completed
    }
}

/// Resolved shape of the `"wiki"` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataState {
    pub categories: Vec<Category>,
    pub articles: Vec<Article>,
    pub is_loading: bool,
    pub is_error: bool,
}

/// Transient AI search state, kept apart from the article tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSearchState {
    pub query: String,
    pub is_loading: bool,
    pub result: Option<AiSearchResult>,
    pub error: Option<String>,
}

pub struct WikiController {
    ctx: WikiContext,
    data: WikiData,

    view_mode: ViewMode,
    selected_category_id: Option<i64>,
    selected_article: Option<Article>,

    edited_title: String,
    edited_content: String,
    edited_category_id: Option<i64>,
    files_to_upload: Vec<PendingFile>,
    attachments_to_remove: Vec<String>,

    open_categories: BTreeSet<i64>,
    open_initialized: bool,
    pending_link: Option<i64>,

    is_creating_category: bool,
    new_category_name: String,

    ai: AiSearchState,
}

/// Load every category and article. Both lists are fetched concurrently;
/// either failure fails the load.
async fn load_wiki(
    categories: Arc<dyn CategoryRepository>,
    articles: Arc<dyn ArticleRepository>,
) -> Result<WikiData> {
    let start = Instant::now();
    let (categories, articles) = futures::try_join!(categories.list(), articles.list())?;
    info!(
        subsystem = "wiki",
        component = "controller",
        op = "load",
        category_count = categories.len(),
        article_count = articles.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Wiki data loaded"
    );
    Ok(WikiData {
        categories,
        articles,
    })
}

impl WikiController {
    /// Create a controller in `List` mode. `selected_article_id` is a deep
    /// link applied once the article shows up in loaded data.
    pub fn new(ctx: WikiContext, selected_article_id: Option<i64>) -> Self {
        Self {
            ctx,
            data: WikiData::default(),
            view_mode: ViewMode::List,
            selected_category_id: None,
            selected_article: None,
            edited_title: String::new(),
            edited_content: String::new(),
            edited_category_id: None,
            files_to_upload: Vec::new(),
            attachments_to_remove: Vec::new(),
            open_categories: BTreeSet::new(),
            open_initialized: false,
            pending_link: selected_article_id,
            is_creating_category: false,
            new_category_name: String::new(),
            ai: AiSearchState::default(),
        }
    }

    // =========================================================================
    // DATA
    // =========================================================================

    /// Resolve the `"wiki"` query and reconcile view state with it.
    pub async fn refresh(&mut self) -> Result<()> {
        let categories = self.ctx.categories.clone();
        let articles = self.ctx.articles.clone();
        let data = self
            .ctx
            .cache
            .fetch(WIKI_QUERY_KEY, || load_wiki(categories, articles))
            .await?;
        self.data = data;
        self.reconcile();
        Ok(())
    }

    fn reconcile(&mut self) {
        if self.selected_category_id.is_none() {
            self.selected_category_id = self.data.categories.first().map(|c| c.id);
        }

        if !self.open_initialized && !self.data.categories.is_empty() {
            self.open_categories = self
                .data
                .categories
                .iter()
                .filter(|c| self.data.has_articles(c.id))
                .map(|c| c.id)
                .collect();
            self.open_initialized = true;
        }

        if let Some(selected_id) = self.selected_article.as_ref().map(|a| a.id) {
            match self.data.article(selected_id) {
                Some(fresh) => self.selected_article = Some(fresh.clone()),
                None if self.view_mode == ViewMode::View => {
                    self.selected_article = None;
                    self.view_mode = ViewMode::List;
                }
                None => {}
            }
        }

        if let Some(id) = self.pending_link {
            if let Some(article) = self.data.article(id).cloned() {
                self.pending_link = None;
                debug!(subsystem = "wiki", article_id = id, "Deep link resolved");
                self.open_categories.insert(article.category_id);
                self.show_article(article);
            }
        }
    }

    /// Follow a link to `article_id`: select it in `View` mode and open its
    /// category. Applied on the next refresh if the article is not loaded yet.
    pub fn follow_link(&mut self, article_id: i64) {
        self.pending_link = Some(article_id);
        self.reconcile();
    }

    /// Categories and articles from the query cache, with load flags.
    pub fn data_state(&self) -> DataState {
        let state = self.ctx.cache.state(WIKI_QUERY_KEY);
        let data = state.data.unwrap_or_default();
        DataState {
            categories: data.categories,
            articles: data.articles,
            is_loading: state.is_loading,
            is_error: state.is_error,
        }
    }

    pub fn data(&self) -> &WikiData {
        &self.data
    }

    /// Every category id mapped to its articles (empty for empty categories).
    pub fn articles_by_category(&self) -> BTreeMap<i64, Vec<&Article>> {
        self.data
            .categories
            .iter()
            .map(|c| (c.id, self.data.articles_in(c.id).collect()))
            .collect()
    }

    /// Categories in gateway order, each with its articles.
    pub fn tree(&self) -> Vec<(&Category, Vec<&Article>)> {
        self.data
            .categories
            .iter()
            .map(|c| (c, self.data.articles_in(c.id).collect()))
            .collect()
    }

    pub fn attachment_views(&self, article: &Article) -> Vec<AttachmentView> {
        article
            .attachments
            .iter()
            .map(|path| AttachmentView {
                path: path.clone(),
                display_name: attachment_display_name(path).to_string(),
                public_url: self.ctx.store.public_url(path),
            })
            .collect()
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    fn reset_buffers(&mut self) {
        self.edited_title.clear();
        self.edited_content.clear();
        self.edited_category_id = None;
        self.files_to_upload.clear();
        self.attachments_to_remove.clear();
    }

    fn show_article(&mut self, article: Article) {
        self.reset_buffers();
        self.selected_article = Some(article);
        self.view_mode = ViewMode::View;
    }

    /// Select an article and show it. Returns false for unknown ids.
    pub fn select_article(&mut self, article_id: i64) -> bool {
        match self.data.article(article_id).cloned() {
            Some(article) => {
                self.show_article(article);
                true
            }
            None => false,
        }
    }

    /// Choose the category new articles default to.
    pub fn select_category(&mut self, category_id: i64) -> bool {
        if self.data.category(category_id).is_none() {
            return false;
        }
        self.selected_category_id = Some(category_id);
        true
    }

    /// Open or close one category. Returns the new open state.
    pub fn toggle_category(&mut self, category_id: i64) -> bool {
        if self.open_categories.remove(&category_id) {
            false
        } else {
            self.open_categories.insert(category_id);
            true
        }
    }

    /// Load the selected article into the edit buffers.
    pub fn begin_edit(&mut self) -> bool {
        let Some(article) = &self.selected_article else {
            return false;
        };
        self.edited_title = article.title.clone();
        self.edited_content = article.content.clone();
        self.edited_category_id = Some(article.category_id);
        self.files_to_upload.clear();
        self.attachments_to_remove.clear();
        self.view_mode = ViewMode::Edit;
        true
    }

    /// Start a new article in the currently selected category.
    pub fn begin_create(&mut self) {
        self.selected_article = None;
        self.reset_buffers();
        self.edited_category_id = self.selected_category_id;
        self.view_mode = ViewMode::Create;
    }

    /// Discard the buffers and step back: `Edit` returns to the article,
    /// `View` and `Create` return to `List`.
    pub fn cancel(&mut self) {
        self.reset_buffers();
        if self.view_mode == ViewMode::Edit && self.selected_article.is_some() {
            self.view_mode = ViewMode::View;
        } else {
            self.selected_article = None;
            self.view_mode = ViewMode::List;
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.edited_title = title.into();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.edited_content = content.into();
    }

    pub fn set_category(&mut self, category_id: Option<i64>) {
        self.edited_category_id = category_id;
    }

    pub fn queue_file(&mut self, file: PendingFile) {
        self.files_to_upload.push(file);
    }

    /// Drop a queued file before it is uploaded.
    pub fn unqueue_file(&mut self, index: usize) -> Option<PendingFile> {
        (index < self.files_to_upload.len()).then(|| self.files_to_upload.remove(index))
    }

    /// Stage one of the selected article's attachments for removal on save.
    pub fn mark_for_removal(&mut self, path: &str) -> bool {
        let Some(article) = &self.selected_article else {
            return false;
        };
        if self.view_mode != ViewMode::Edit
            || !article.attachments.iter().any(|p| p == path)
            || self.attachments_to_remove.iter().any(|p| p == path)
        {
            return false;
        }
        self.attachments_to_remove.push(path.to_string());
        true
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    pub fn can_edit(&self) -> bool {
        self.ctx.user.is_some()
    }

    fn report(&self, prefix: &str, failure: &StepFailure) -> Outcome {
        self.ctx.errors.add(
            format!("{}: {}", prefix, failure.source),
            Some(failure.details()),
        );
        Outcome::Failed
    }

    async fn invalidate(&self) {
        self.ctx.cache.invalidate(WIKI_QUERY_KEY).await;
    }

    /// Latest known copy of an article, preferring resolved data over the
    /// selection snapshot.
    fn current(&self, article: &Article) -> Article {
        self.data
            .article(article.id)
            .cloned()
            .unwrap_or_else(|| article.clone())
    }

    /// Save the edit buffers: update in `Edit`, insert in `Create`.
    ///
    /// Refused without a user, without a category, or outside those modes.
    /// On failure the mode and buffers are kept for a retry.
    pub async fn save(&mut self) -> Outcome {
        let Some(user) = self.ctx.user.clone() else {
            return Outcome::Refused;
        };
        let Some(category_id) = self.edited_category_id else {
            return Outcome::Refused;
        };

        match (self.view_mode, self.selected_article.clone()) {
            (ViewMode::Edit, Some(selected)) => {
                let existing = self.current(&selected);
                let changes = ArticleUpdate {
                    title: Some(self.edited_title.clone()),
                    content: Some(self.edited_content.clone()),
                    category_id: Some(category_id),
                    ..Default::default()
                };
                let result = mutations::update_article(
                    self.ctx.store.as_ref(),
                    self.ctx.articles.as_ref(),
                    &user,
                    &existing,
                    changes,
                    &self.files_to_upload,
                    &self.attachments_to_remove,
                )
                .await;
                match result {
                    Ok(written) => {
                        self.invalidate().await;
                        self.show_article(written);
                        Outcome::Completed
                    }
                    Err(failure) => self.report(MSG_SAVE_ARTICLE_FAILED, &failure),
                }
            }
            (ViewMode::Create, _) => {
                let draft = ArticleDraft {
                    title: self.edited_title.clone(),
                    content: self.edited_content.clone(),
                    category_id,
                };
                let result = mutations::create_article(
                    self.ctx.store.as_ref(),
                    self.ctx.articles.as_ref(),
                    &user,
                    draft,
                    &self.files_to_upload,
                )
                .await;
                match result {
                    Ok(article) => {
                        self.invalidate().await;
                        self.reset_buffers();
                        self.view_mode = ViewMode::List;
                        info!(
                            subsystem = "wiki",
                            component = "controller",
                            article_id = article.id,
                            "Article saved"
                        );
                        Outcome::Completed
                    }
                    Err(failure) => self.report(MSG_SAVE_ARTICLE_FAILED, &failure),
                }
            }
            _ => Outcome::Refused,
        }
    }

    /// Delete the selected article and all its attachments.
    pub async fn delete_selected(&mut self) -> Outcome {
        if !self.can_edit() {
            return Outcome::Refused;
        }
        let Some(selected) = self.selected_article.clone() else {
            return Outcome::Refused;
        };
        let article = self.current(&selected);

        match mutations::delete_article(
            self.ctx.store.as_ref(),
            self.ctx.articles.as_ref(),
            &article,
        )
        .await
        {
            Ok(()) => {
                self.invalidate().await;
                self.selected_article = None;
                self.reset_buffers();
                self.view_mode = ViewMode::List;
                Outcome::Completed
            }
            Err(failure) => self.report(MSG_DELETE_ARTICLE_FAILED, &failure),
        }
    }

    /// Remove one attachment of the selected article without entering `Edit`.
    pub async fn delete_attachment(&mut self, path: &str) -> Outcome {
        let Some(user) = self.ctx.user.clone() else {
            return Outcome::Refused;
        };
        let Some(selected) = self.selected_article.clone() else {
            return Outcome::Refused;
        };
        let existing = self.current(&selected);
        if !existing.attachments.iter().any(|p| p == path) {
            return Outcome::Refused;
        }

        let remove = [path.to_string()];
        match mutations::update_article(
            self.ctx.store.as_ref(),
            self.ctx.articles.as_ref(),
            &user,
            &existing,
            ArticleUpdate::default(),
            &[],
            &remove,
        )
        .await
        {
            Ok(written) => {
                self.invalidate().await;
                self.show_article(written);
                Outcome::Completed
            }
            Err(failure) => self.report(MSG_SAVE_ARTICLE_FAILED, &failure),
        }
    }

    pub fn begin_create_category(&mut self) {
        self.is_creating_category = true;
        self.new_category_name.clear();
    }

    pub fn set_new_category_name(&mut self, name: impl Into<String>) {
        self.new_category_name = name.into();
    }

    pub fn cancel_create_category(&mut self) {
        self.is_creating_category = false;
        self.new_category_name.clear();
    }

    /// Insert the category named in the form buffer. Blank names are refused.
    pub async fn create_category(&mut self) -> Outcome {
        if !self.can_edit() || self.new_category_name.trim().is_empty() {
            return Outcome::Refused;
        }

        match mutations::create_category(self.ctx.categories.as_ref(), &self.new_category_name)
            .await
        {
            Ok(_) => {
                self.invalidate().await;
                self.cancel_create_category();
                Outcome::Completed
            }
            Err(failure) => self.report(MSG_CREATE_CATEGORY_FAILED, &failure),
        }
    }

    // =========================================================================
    // AI SEARCH
    // =========================================================================

    /// Ask the AI backend. Failures land in [`AiSearchState::error`] only.
    pub async fn ai_search(&mut self, query: &str) -> Outcome {
        let query = query.trim();
        if query.is_empty() {
            return Outcome::Refused;
        }

        self.ai = AiSearchState {
            query: query.to_string(),
            is_loading: true,
            result: None,
            error: None,
        };

        let outcome = match self.ctx.ai.search(query).await {
            Ok(result) => {
                debug!(
                    subsystem = "wiki",
                    component = "ai_search",
                    model = self.ctx.ai.model_name(),
                    result_count = result.sources.len(),
                    "AI search answered"
                );
                self.ai.result = Some(result);
                Outcome::Completed
            }
            Err(e) => {
                self.ai.error = Some(format!("{}: {}", MSG_AI_SEARCH_FAILED, e));
                Outcome::Failed
            }
        };
        self.ai.is_loading = false;
        outcome
    }

    pub fn clear_ai_search(&mut self) {
        self.ai = AiSearchState::default();
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.selected_article.as_ref()
    }

    pub fn selected_category_id(&self) -> Option<i64> {
        self.selected_category_id
    }

    pub fn edited_title(&self) -> &str {
        &self.edited_title
    }

    pub fn edited_content(&self) -> &str {
        &self.edited_content
    }

    pub fn edited_category_id(&self) -> Option<i64> {
        self.edited_category_id
    }

    pub fn files_to_upload(&self) -> &[PendingFile] {
        &self.files_to_upload
    }

    pub fn attachments_to_remove(&self) -> &[String] {
        &self.attachments_to_remove
    }

    pub fn is_open(&self, category_id: i64) -> bool {
        self.open_categories.contains(&category_id)
    }

    pub fn open_categories(&self) -> &BTreeSet<i64> {
        &self.open_categories
    }

    pub fn is_creating_category(&self) -> bool {
        self.is_creating_category
    }

    pub fn new_category_name(&self) -> &str {
        &self.new_category_name
    }

    pub fn ai_state(&self) -> &AiSearchState {
        &self.ai
    }

    pub fn cache(&self) -> &QueryCache<WikiData> {
        &self.ctx.cache
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.ctx.errors
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.ctx.user.as_ref()
    }
}
