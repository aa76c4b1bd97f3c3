//! Centralized default constants for the HOAI wiki.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and the CLI reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// GATEWAY
// =============================================================================

/// Relational collection holding categories.
pub const CATEGORY_TABLE: &str = "wiki_categories";

/// Relational collection holding articles.
pub const ARTICLE_TABLE: &str = "wiki_articles";

/// Object-store bucket holding article attachments.
pub const ATTACHMENT_BUCKET: &str = "wiki_attachments";

/// First path segment of every attachment key.
pub const ATTACHMENT_PREFIX: &str = "wiki";

/// Default database URL when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "postgres://localhost/hoai";

/// Default root directory of the filesystem object store.
pub const STORAGE_PATH: &str = "/var/lib/hoai/storage";

/// Default base URL under which stored objects are served.
pub const PUBLIC_BASE_URL: &str = "http://localhost:8080/storage/v1/object/public";

/// File-name limit of common filesystems, in bytes.
pub const FS_NAME_MAX: usize = 255;

/// Longest sanitized filename, in bytes. Leaves room for the `<uuid>-`
/// prefix of the stored name and the store's `.<name>.tmp` temp file.
pub const MAX_FILENAME_LEN: usize = FS_NAME_MAX - 37 - 5;

// =============================================================================
// QUERY CACHE
// =============================================================================

/// Query key of the combined categories + articles dataset.
pub const WIKI_QUERY_KEY: &str = "wiki";

/// Age after which a cached dataset is refetched on next read (seconds).
pub const CACHE_STALE_SECS: u64 = 300;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for AI search requests in seconds.
pub const SEARCH_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// USER-FACING MESSAGES
// =============================================================================

/// Prefix of the error entry appended when saving an article fails.
pub const MSG_SAVE_ARTICLE_FAILED: &str = "Speichern des Wiki-Artikels fehlgeschlagen";

/// Prefix of the error entry appended when deleting an article fails.
pub const MSG_DELETE_ARTICLE_FAILED: &str = "Löschen des Wiki-Artikels fehlgeschlagen";

/// Prefix of the error entry appended when creating a category fails.
pub const MSG_CREATE_CATEGORY_FAILED: &str = "Fehler beim Erstellen der Kategorie";

/// Prefix of the inline AI search error.
pub const MSG_AI_SEARCH_FAILED: &str = "KI-Suche fehlgeschlagen";
