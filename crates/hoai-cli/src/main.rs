//! HOAI Planer Pro wiki command-line tool.
//!
//! Browse the category tree, read and edit articles with file attachments,
//! and ask the AI assistant. Configuration comes from the environment (see
//! [`config::AppConfig`]); a `.env` file in the working directory is loaded
//! first.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "hoai-wiki")]
#[command(author, version, about = "HOAI Planer Pro wiki: categories, articles, attachments and AI search")]
#[command(propagate_version = true)]
struct Cli {
    /// Print JSON instead of text (tree, show, ask)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List categories with their articles
    Tree {
        /// Show articles of collapsed categories too
        #[arg(short, long)]
        expand: bool,
    },

    /// Show one article with its attachments
    Show {
        /// Article id
        id: i64,
    },

    /// Create a category
    CreateCategory {
        /// Category name (surrounding whitespace is trimmed)
        name: String,
    },

    /// Create an article, uploading the given files as attachments
    CreateArticle {
        /// Target category id
        #[arg(short, long)]
        category: i64,

        /// Article title
        #[arg(short, long)]
        title: String,

        /// Article body (HTML)
        #[arg(long)]
        content: Option<String>,

        /// File to attach (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },

    /// Edit an article's fields and attachments
    Edit {
        /// Article id
        id: i64,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New body (HTML)
        #[arg(long)]
        content: Option<String>,

        /// Move to another category
        #[arg(short, long)]
        category: Option<i64>,

        /// File to attach (repeatable)
        #[arg(long = "add-file")]
        add_files: Vec<PathBuf>,

        /// Stored attachment path to remove (repeatable)
        #[arg(long = "remove-attachment")]
        remove_attachments: Vec<String>,
    },

    /// Delete an article and all its attachments
    Delete {
        /// Article id
        id: i64,
    },

    /// Remove a single attachment from an article
    DeleteAttachment {
        /// Article id
        id: i64,

        /// Stored attachment path (as printed by `show --json`)
        path: String,
    },

    /// Ask the AI assistant a question
    Ask {
        /// Question text
        query: String,
    },

    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init();
    let config = AppConfig::from_env();

    match commands::run(cli.command, cli.json, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_article_with_files() {
        let cli = Cli::try_parse_from([
            "hoai-wiki",
            "create-article",
            "--category",
            "3",
            "--title",
            "Brandschutz",
            "--file",
            "a.pdf",
            "-f",
            "b.dwg",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateArticle {
                category,
                title,
                content,
                files,
            } => {
                assert_eq!(category, 3);
                assert_eq!(title, "Brandschutz");
                assert!(content.is_none());
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.dwg")]);
            }
            _ => panic!("expected create-article"),
        }
    }

    #[test]
    fn test_parse_edit_with_removals() {
        let cli = Cli::try_parse_from([
            "hoai-wiki",
            "--json",
            "edit",
            "7",
            "--remove-attachment",
            "wiki/u1/x-a.pdf",
            "--add-file",
            "neu.pdf",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Edit {
                id,
                title,
                add_files,
                remove_attachments,
                ..
            } => {
                assert_eq!(id, 7);
                assert!(title.is_none());
                assert_eq!(add_files, vec![PathBuf::from("neu.pdf")]);
                assert_eq!(remove_attachments, vec!["wiki/u1/x-a.pdf".to_string()]);
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn test_create_article_requires_title() {
        assert!(Cli::try_parse_from(["hoai-wiki", "create-article", "--category", "1"]).is_err());
    }
}
