//! Command handlers.
//!
//! Each handler builds a [`WikiController`] over the configured gateways and
//! drives it the way an interactive session would: refresh, select, edit,
//! save. Failures the controller records on the error log are printed to
//! stderr and turn into a non-zero exit.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::json;
use tracing::{debug, info};

use hoai_core::{Article, Category, ErrorLog, PendingFile};
use hoai_db::{Database, FilesystemObjectStore, PoolConfig};
use hoai_inference::OllamaSearchBackend;
use hoai_wiki::{Outcome, QueryCache, WikiContext, WikiController};

use crate::config::AppConfig;
use crate::Commands;

const READ_ONLY_HINT: &str = "read-only session: set HOAI_USER_ID to make changes";

pub async fn run(command: Commands, json_output: bool, config: &AppConfig) -> anyhow::Result<()> {
    let store = FilesystemObjectStore::new(&config.storage_path, &config.public_base_url);

    match command {
        Commands::Migrate => {
            let db = connect(config).await?;
            db.migrate().await.context("running migrations")?;
            info!(subsystem = "db", op = "migrate", "Migrations applied");
            println!("Migrations applied");
            Ok(())
        }

        Commands::Tree { expand } => {
            let db = connect(config).await?;
            let wiki = open(context(&db, store, config), None).await?;
            if json_output {
                print_json(wiki.data())?;
            } else {
                let tree = wiki.tree();
                for line in tree_lines(&tree, |id| expand || wiki.is_open(id)) {
                    println!("{}", line);
                }
            }
            Ok(())
        }

        Commands::Show { id } => {
            let db = connect(config).await?;
            let wiki = open(context(&db, store, config), Some(id)).await?;
            let article = selected(&wiki, id)?;
            let attachments = wiki.attachment_views(article);
            if json_output {
                print_json(&json!({ "article": article, "attachments": attachments }))?;
            } else {
                let category = wiki
                    .data()
                    .category(article.category_id)
                    .map(|c| c.name.as_str())
                    .unwrap_or("-");
                println!("{}", article.title);
                println!(
                    "Kategorie: {} | Autor: {} | Geändert: {}",
                    category,
                    article.author_name,
                    article.last_modified.format("%d.%m.%Y %H:%M")
                );
                println!();
                println!("{}", article.content);
                if !attachments.is_empty() {
                    println!();
                    println!("Anhänge:");
                    for view in attachments {
                        println!("  {}  {}", view.display_name, view.public_url);
                    }
                }
            }
            Ok(())
        }

        Commands::CreateCategory { name } => {
            let db = connect(config).await?;
            let mut wiki = open(context(&db, store, config), None).await?;
            require_user(&wiki)?;
            wiki.begin_create_category();
            wiki.set_new_category_name(name);
            let outcome = wiki.create_category().await;
            finish(&wiki, outcome, "category name must not be blank")?;
            println!("Category created");
            Ok(())
        }

        Commands::CreateArticle {
            category,
            title,
            content,
            files,
        } => {
            let db = connect(config).await?;
            if !files.is_empty() {
                validate_store(&store).await?;
            }
            let mut wiki = open(context(&db, store, config), None).await?;
            require_user(&wiki)?;
            if !wiki.select_category(category) {
                bail!("unknown category {}", category);
            }
            wiki.begin_create();
            wiki.set_title(title);
            wiki.set_content(content.unwrap_or_default());
            for path in &files {
                wiki.queue_file(pending_file(path).await?);
            }
            let outcome = wiki.save().await;
            finish(&wiki, outcome, "article could not be saved")?;
            println!("Article created with {} attachment(s)", files.len());
            Ok(())
        }

        Commands::Edit {
            id,
            title,
            content,
            category,
            add_files,
            remove_attachments,
        } => {
            let db = connect(config).await?;
            if !add_files.is_empty() {
                validate_store(&store).await?;
            }
            let mut wiki = open(context(&db, store, config), Some(id)).await?;
            require_user(&wiki)?;
            selected(&wiki, id)?;
            wiki.begin_edit();
            if let Some(title) = title {
                wiki.set_title(title);
            }
            if let Some(content) = content {
                wiki.set_content(content);
            }
            if let Some(category) = category {
                if wiki.data().category(category).is_none() {
                    bail!("unknown category {}", category);
                }
                wiki.set_category(Some(category));
            }
            for path in &add_files {
                wiki.queue_file(pending_file(path).await?);
            }
            for path in &remove_attachments {
                if !wiki.mark_for_removal(path) {
                    bail!("{} is not an attachment of article {}", path, id);
                }
            }
            let outcome = wiki.save().await;
            finish(&wiki, outcome, "article could not be saved")?;
            println!("Article {} saved", id);
            Ok(())
        }

        Commands::Delete { id } => {
            let db = connect(config).await?;
            let mut wiki = open(context(&db, store, config), Some(id)).await?;
            require_user(&wiki)?;
            selected(&wiki, id)?;
            let outcome = wiki.delete_selected().await;
            finish(&wiki, outcome, "article could not be deleted")?;
            println!("Article {} deleted", id);
            Ok(())
        }

        Commands::DeleteAttachment { id, path } => {
            let db = connect(config).await?;
            let mut wiki = open(context(&db, store, config), Some(id)).await?;
            require_user(&wiki)?;
            selected(&wiki, id)?;
            let outcome = wiki.delete_attachment(&path).await;
            finish(
                &wiki,
                outcome,
                &format!("{} is not an attachment of article {}", path, id),
            )?;
            println!("Attachment removed from article {}", id);
            Ok(())
        }

        Commands::Ask { query } => {
            // AI search never reads the wiki tables.
            let db = Database::connect_lazy(&config.database_url, pool_config(config))?;
            let mut wiki = WikiController::new(context(&db, store, config), None);
            match wiki.ai_search(&query).await {
                Outcome::Refused => bail!("query must not be blank"),
                Outcome::Failed => {
                    let message = wiki.ai_state().error.clone().unwrap_or_default();
                    bail!("{}", message)
                }
                Outcome::Completed => {
                    let result = wiki
                        .ai_state()
                        .result
                        .as_ref()
                        .ok_or_else(|| anyhow!("AI search returned no result"))?;
                    if json_output {
                        print_json(result)?;
                    } else {
                        println!("{}", result.title);
                        println!();
                        println!("{}", result.content);
                        if !result.sources.is_empty() {
                            println!();
                            println!("Quellen:");
                            for source in &result.sources {
                                println!("  {}  {}", source.title, source.uri);
                            }
                        }
                    }
                    Ok(())
                }
            }
        }
    }
}

fn pool_config(config: &AppConfig) -> PoolConfig {
    PoolConfig::new().max_connections(config.max_connections)
}

async fn connect(config: &AppConfig) -> anyhow::Result<Database> {
    Database::connect_with_config(&config.database_url, pool_config(config))
        .await
        .context("connecting to database")
}

fn context(db: &Database, store: FilesystemObjectStore, config: &AppConfig) -> WikiContext {
    let ai = OllamaSearchBackend::with_timeout(
        config.ollama_base.clone(),
        config.gen_model.clone(),
        config.search_timeout_secs,
    );
    let ctx = WikiContext::new(
        Arc::new(db.categories.clone()),
        Arc::new(db.articles.clone()),
        Arc::new(store),
        Arc::new(ai),
        QueryCache::new(config.cache_stale_after),
        ErrorLog::new(),
    );
    match &config.user {
        Some(user) => ctx.with_user(user.clone()),
        None => ctx,
    }
}

async fn open(ctx: WikiContext, deep_link: Option<i64>) -> anyhow::Result<WikiController> {
    let mut wiki = WikiController::new(ctx, deep_link);
    wiki.refresh().await.context("loading wiki")?;
    Ok(wiki)
}

async fn validate_store(store: &FilesystemObjectStore) -> anyhow::Result<()> {
    store
        .validate()
        .await
        .map_err(|e| anyhow!("object store not writable: {}", e))
}

fn require_user(wiki: &WikiController) -> anyhow::Result<()> {
    if wiki.can_edit() {
        Ok(())
    } else {
        bail!(READ_ONLY_HINT)
    }
}

fn selected(wiki: &WikiController, id: i64) -> anyhow::Result<&Article> {
    wiki.selected_article()
        .filter(|a| a.id == id)
        .ok_or_else(|| anyhow!("article {} not found", id))
}

/// Map a mutation outcome to the process result, printing logged errors.
fn finish(wiki: &WikiController, outcome: Outcome, refused: &str) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed => Ok(()),
        Outcome::Refused => bail!("{}", refused),
        Outcome::Failed => {
            let entries = wiki.errors().entries();
            for entry in &entries {
                eprintln!("{}", entry.message);
                if let Some(details) = &entry.details {
                    eprintln!("  {}", details);
                }
            }
            bail!("{} error(s) reported", entries.len())
        }
    }
}

/// Read a local file into an upload buffer named after its file name.
async fn pending_file(path: &Path) -> anyhow::Result<PendingFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    debug!(file = %name, size = data.len(), "Queued attachment");
    Ok(PendingFile::new(name, data))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Text rendering of the category tree. Closed categories show their header
/// only.
fn tree_lines(
    tree: &[(&Category, Vec<&Article>)],
    is_open: impl Fn(i64) -> bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (category, articles) in tree {
        let open = is_open(category.id);
        lines.push(format!(
            "{} {} ({})",
            if open { "▾" } else { "▸" },
            category.name,
            articles.len()
        ));
        if open {
            for article in articles {
                lines.push(format!("    #{:<5} {}", article.id, article.title));
            }
        }
    }
    lines
}
