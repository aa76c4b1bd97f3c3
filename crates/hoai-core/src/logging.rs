//! Structured logging field name constants for the HOAI wiki.
//!
//! All crates use these names for structured logging fields so that log
//! aggregation can query by the same field across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Failed user operation, orphaned objects, recoverable issues |
//! | INFO  | Lifecycle events (startup, migrations), mutation completions |
//! | DEBUG | Decision points, cache hits/misses, view-mode transitions |
//! | TRACE | Per-item iteration (single uploads, rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "wiki", "cache", "db", "storage", "inference", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "controller", "mutations", "pool", "filesystem", "ollama"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_article", "update_article", "invalidate", "search"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Article id being operated on.
pub const ARTICLE_ID: &str = "article_id";

/// Category id being operated on.
pub const CATEGORY_ID: &str = "category_id";

/// Object-store path.
pub const STORAGE_PATH: &str = "storage_path";

/// Query cache key.
pub const QUERY_KEY: &str = "query_key";

/// Current user id.
pub const USER_ID: &str = "user_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or items returned.
pub const RESULT_COUNT: &str = "result_count";

/// Number of objects touched by a storage call.
pub const OBJECT_COUNT: &str = "object_count";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Name of the mutation step that failed.
pub const STEP: &str = "step";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
